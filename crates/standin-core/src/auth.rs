//! Authorisation tokens and capabilities
//!
//! Privileged operations (replacing a standin's storage, invoking past the
//! forwarding strategy, instantiating without construction) take an
//! [`Authorisation`]. Tokens can only be minted by an [`Authority`], which
//! plays the part of the trusted core; holding a `&Authorisation` is the proof
//! of entitlement, so there is no null token to check on the common path.
//!
//! There is exactly one authority per process. [`Authority::install`] hands
//! it out once, to whoever bootstraps the runtime; every later install is
//! refused, so code outside that bootstrap has no way to mint a token.
//!
//! A token carries zero or more capabilities. A capability-less token is
//! still a valid token: it namespaces privileged entry points away from a
//! referent's own methods. Every capability accessor fails closed.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use standin_sdk::{ErasedInstance, ReferentClass, StandinError, StandinResult};

use crate::config::AuthorityConfig;

/// Allocates an unpopulated instance of a class
pub type Instantiator =
    Arc<dyn Fn(&'static ReferentClass) -> StandinResult<ErasedInstance> + Send + Sync>;

/// Duplicates an instance of a class regardless of call-site visibility
pub type Cloner = Arc<
    dyn Fn(&'static ReferentClass, &(dyn Any + Send + Sync)) -> StandinResult<ErasedInstance>
        + Send
        + Sync,
>;

/// The kinds of capability a token may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// Instantiate a type without running its constructor
    Instantiate,
    /// Invoke the normally inaccessible clone operation
    Clone,
}

impl CapabilityKind {
    /// Every capability kind
    pub const ALL: [CapabilityKind; 2] = [CapabilityKind::Instantiate, CapabilityKind::Clone];

    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            CapabilityKind::Instantiate => "instantiate",
            CapabilityKind::Clone => "clone",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A granted capability: a plain function value
#[derive(Clone)]
pub enum Capability {
    /// See [`CapabilityKind::Instantiate`]
    Instantiate(Instantiator),
    /// See [`CapabilityKind::Clone`]
    Clone(Cloner),
}

impl Capability {
    /// Kind of this capability
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Instantiate(_) => CapabilityKind::Instantiate,
            Capability::Clone(_) => CapabilityKind::Clone,
        }
    }

    /// Instantiation through the class's blank factory
    pub fn standard_instantiate() -> Self {
        Capability::Instantiate(Arc::new(
            |class: &'static ReferentClass| -> StandinResult<ErasedInstance> {
                Ok(class.raw_blank())
            },
        ))
    }

    /// Cloning through the class's duplicator
    pub fn standard_clone() -> Self {
        Capability::Clone(Arc::new(
            |class: &'static ReferentClass,
             value: &(dyn Any + Send + Sync)|
             -> StandinResult<ErasedInstance> {
                class.raw_duplicate(value).ok_or_else(|| {
                    StandinError::UnsupportedOperation(format!(
                        "{} instances cannot be duplicated",
                        class.name()
                    ))
                })
            },
        ))
    }

    fn standard(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Instantiate => Self::standard_instantiate(),
            CapabilityKind::Clone => Self::standard_clone(),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability::{:?}", self.kind())
    }
}

/// Identity of a token
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AuthorisationId(u64);

static NEXT_AUTHORISATION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_AUTHORITY_ID: AtomicU64 = AtomicU64::new(1);

impl AuthorisationId {
    fn next() -> Self {
        AuthorisationId(NEXT_AUTHORISATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Grants {
    instantiate: Option<Instantiator>,
    clone: Option<Cloner>,
}

impl Grants {
    fn set(&mut self, capability: Capability) {
        match capability {
            Capability::Instantiate(f) => self.instantiate = Some(f),
            Capability::Clone(f) => self.clone = Some(f),
        }
    }

    fn clear(&mut self, kind: CapabilityKind) {
        match kind {
            CapabilityKind::Instantiate => self.instantiate = None,
            CapabilityKind::Clone => self.clone = None,
        }
    }

    fn has(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Instantiate => self.instantiate.is_some(),
            CapabilityKind::Clone => self.clone.is_some(),
        }
    }
}

/// Unforgeable token proving entitlement to privileged operations
pub struct Authorisation {
    id: AuthorisationId,
    issuer: u64,
    grants: RwLock<Grants>,
}

impl Authorisation {
    /// Fail closed if no token was supplied
    pub fn verify(auth: Option<&Authorisation>) -> StandinResult<&Authorisation> {
        auth.ok_or_else(|| {
            tracing::warn!("privileged operation attempted without authorisation");
            StandinError::Security("no authorisation supplied".to_string())
        })
    }

    /// Token identity
    pub fn id(&self) -> AuthorisationId {
        self.id
    }

    /// Whether the capability is currently granted
    pub fn has(&self, kind: CapabilityKind) -> bool {
        self.grants.read().has(kind)
    }

    fn denied(&self, kind: CapabilityKind) -> StandinError {
        tracing::warn!(
            authorisation = self.id.as_u64(),
            capability = kind.name(),
            "capability not granted"
        );
        StandinError::MissingCapability(kind.name())
    }

    /// The instantiation capability
    pub fn instantiator(&self) -> StandinResult<Instantiator> {
        self.grants
            .read()
            .instantiate
            .clone()
            .ok_or_else(|| self.denied(CapabilityKind::Instantiate))
    }

    /// The clone capability
    pub fn cloner(&self) -> StandinResult<Cloner> {
        self.grants
            .read()
            .clone
            .clone()
            .ok_or_else(|| self.denied(CapabilityKind::Clone))
    }

    /// Allocate an unpopulated `T` without running its constructor path
    pub fn instantiate<T: Any>(&self, class: &'static ReferentClass) -> StandinResult<T> {
        let instantiator = self.instantiator()?;
        let erased = instantiator(class)?;
        erased.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            StandinError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                got: class.name().to_string(),
            }
        })
    }

    /// Duplicate `value` through the clone capability
    pub fn clone_referent<T: Any + Send + Sync>(
        &self,
        class: &'static ReferentClass,
        value: &T,
    ) -> StandinResult<T> {
        let cloner = self.cloner()?;
        let erased = cloner(class, value as &(dyn Any + Send + Sync))?;
        erased.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            StandinError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                got: class.name().to_string(),
            }
        })
    }
}

impl fmt::Debug for Authorisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grants = self.grants.read();
        let granted: Vec<&str> = CapabilityKind::ALL
            .iter()
            .filter(|k| grants.has(**k))
            .map(|k| k.name())
            .collect();
        f.debug_struct("Authorisation")
            .field("id", &self.id.0)
            .field("capabilities", &granted)
            .finish()
    }
}

/// The trusted core: mints tokens and decides which capabilities they carry
#[derive(Debug)]
pub struct Authority {
    id: u64,
    config: AuthorityConfig,
}

static TRUSTED: OnceCell<Authority> = OnceCell::new();

impl Authority {
    /// Install the process-wide authority and hand it to the caller.
    ///
    /// Succeeds once per process. The returned reference is the only route
    /// to minting tokens, so the caller should keep it inside the trusted
    /// core rather than publishing it.
    pub fn install(config: AuthorityConfig) -> StandinResult<&'static Authority> {
        let mut fresh = false;
        let authority = TRUSTED.get_or_init(|| {
            fresh = true;
            Self::new(config)
        });
        if !fresh {
            return Err(StandinError::IllegalState(
                "trusted authority already installed".to_string(),
            ));
        }
        tracing::info!(
            authority = authority.id,
            grant_instantiate = authority.config.grant_instantiate,
            grant_clone = authority.config.grant_clone,
            "trusted authority installed"
        );
        Ok(authority)
    }

    /// Whether the process authority has been installed
    pub fn is_installed() -> bool {
        TRUSTED.get().is_some()
    }

    pub(crate) fn new(config: AuthorityConfig) -> Self {
        Self {
            id: NEXT_AUTHORITY_ID.fetch_add(1, Ordering::Relaxed),
            config,
        }
    }

    /// Mint a token carrying the configured default capabilities
    pub fn mint(&self) -> Arc<Authorisation> {
        let auth = self.mint_bare();
        {
            let mut grants = auth.grants.write();
            if self.config.grant_instantiate {
                grants.set(Capability::standard(CapabilityKind::Instantiate));
            }
            if self.config.grant_clone {
                grants.set(Capability::standard(CapabilityKind::Clone));
            }
        }
        tracing::debug!(authorisation = auth.id.as_u64(), "authorisation minted");
        auth
    }

    /// Mint a token with no capabilities
    pub fn mint_bare(&self) -> Arc<Authorisation> {
        Arc::new(Authorisation {
            id: AuthorisationId::next(),
            issuer: self.id,
            grants: RwLock::new(Grants::default()),
        })
    }

    fn check_issuer(&self, auth: &Authorisation) -> StandinResult<()> {
        if auth.issuer == self.id {
            Ok(())
        } else {
            Err(StandinError::Security(format!(
                "authorisation {} was issued by another authority",
                auth.id.as_u64()
            )))
        }
    }

    /// Grant (or replace) a capability on a token this authority issued
    pub fn grant(&self, auth: &Authorisation, capability: Capability) -> StandinResult<()> {
        self.check_issuer(auth)?;
        tracing::debug!(
            authorisation = auth.id.as_u64(),
            capability = capability.kind().name(),
            "capability granted"
        );
        auth.grants.write().set(capability);
        Ok(())
    }

    /// Withdraw a capability from a token this authority issued
    pub fn revoke(&self, auth: &Authorisation, kind: CapabilityKind) -> StandinResult<()> {
        self.check_issuer(auth)?;
        tracing::debug!(
            authorisation = auth.id.as_u64(),
            capability = kind.name(),
            "capability revoked"
        );
        auth.grants.write().clear(kind);
        Ok(())
    }
}
