//! Method code derivation
//!
//! `code = sha256(name + descriptor)[..8] ^ mix(class salt ^ process seed)`.
//! Codes are computed once when a table is built; the call path only ever
//! compares integers.

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use standin_sdk::{MethodCode, Signature, StandinError, StandinResult};

/// Seed used when no seed was installed before the first table was built
pub const DEFAULT_CODE_SEED: u64 = 0;

static PROCESS_SEED: OnceCell<u64> = OnceCell::new();

/// Fix the process-wide code seed.
///
/// The seed can be installed once. Re-installing the same seed is a no-op;
/// a different seed after codes were derived is an illegal state, because
/// tables already built would disagree with tables built afterwards.
pub fn install_code_seed(seed: u64) -> StandinResult<()> {
    let installed = *PROCESS_SEED.get_or_init(|| seed);
    if installed == seed {
        tracing::debug!(seed = format_args!("{:#x}", seed), "method code seed installed");
        Ok(())
    } else {
        Err(StandinError::IllegalState(format!(
            "method code seed already fixed to {:#x}, cannot switch to {:#x}",
            installed, seed
        )))
    }
}

/// The seed in effect for this process
pub fn code_seed() -> u64 {
    *PROCESS_SEED.get_or_init(|| DEFAULT_CODE_SEED)
}

/// splitmix64 finaliser
#[inline]
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Derive the code of `name` with `signature` under `salt`.
///
/// The declaring type does not participate: an override shares the code of
/// the method it overrides as long as both tables use the same salt.
pub fn method_code(name: &str, signature: &Signature, salt: u64) -> MethodCode {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(signature.descriptor().as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    MethodCode::new(u64::from_le_bytes(head) ^ mix(salt))
}
