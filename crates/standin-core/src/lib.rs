//! Standin Core Runtime
//!
//! This crate provides the trusted side of location-transparent references:
//! - Authorisation tokens and the capabilities they carry
//! - Method-code derivation and two-level dispatch tables
//! - Storage strategies and the standin contract
//! - Inline and indirect standin implementations
//! - The compare-and-swap migration protocol
//! - Configuration (standin.toml)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod migration;
pub mod referent;
pub mod standin;
pub mod storage;
pub mod target;

pub use auth::{Authorisation, AuthorisationId, Authority, Capability, CapabilityKind};
pub use config::{AuthorityConfig, ConfigError, DispatchConfig, MigrationConfig, StandinConfig};
pub use dispatch::{MethodDescriptor, MethodTable, MethodTableBuilder, Visibility};
pub use migration::{
    LoopbackHost, MigrationDestination, MigrationReceipt, Migrator, Reservation,
};
pub use referent::{description_of, Referent};
pub use standin::{IndirectStandin, InlineStandin, Standin};
pub use storage::{StandinStorage, StorageKind};
pub use target::{LocalTarget, StandinTarget};

pub use standin_sdk::{
    Description, DescriptionCodec, InvocableTarget, InvokeResult, MethodCode, ReferentClass,
    Signature, StandinError, StandinResult, Value,
};
