//! Standin SDK - the surface shared by standins and their collaborators
//!
//! This crate provides the minimal types and traits a transport, a codec or a
//! generated standin needs without depending on the trusted core:
//!
//! - [`Value`] boxed arguments and the [`FromValue`] / [`IntoValue`] conversions
//! - [`MethodCode`] and erased [`Signature`]s
//! - [`ReferentClass`] runtime type descriptors
//! - [`InvocableTarget`], the "invoke by code" capability object
//! - [`Description`] snapshots and the [`DescriptionCodec`] collaborator
//! - [`StandinError`], the shared failure taxonomy

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod code;
pub mod convert;
pub mod description;
pub mod error;
pub mod target;
pub mod value;

pub use class::{ErasedInstance, ReferentClass};
pub use code::{ErasedType, MethodCode, Signature};
pub use convert::{arg, FromValue, IntoValue};
pub use description::{Description, DescriptionCodec, JsonCodec};
pub use error::{FailureCategory, InvokeResult, StandinError, StandinResult};
pub use target::InvocableTarget;
pub use value::{ObjectRef, Value};
