//! Method-code dispatch
//!
//! - [`hash`]: deriving 64-bit codes from names and erased signatures
//! - [`table`]: the per-type two-level lookup structure

pub mod hash;
pub mod table;

pub use hash::{code_seed, install_code_seed, method_code, DEFAULT_CODE_SEED};
pub use table::{MethodDescriptor, MethodEntry, MethodFn, MethodTable, MethodTableBuilder, Visibility};
