//! Type registry for refbridge.
//!
//! [`TypeRegistry`] records, for every exposed type:
//!
//! - its [`OwnershipPolicy`](refbridge_core::OwnershipPolicy), fixed at first registration
//! - its bases, kept in an inheritance graph
//! - how to turn an erased [`Handle`](refbridge_core::Handle) back into a typed holder
//! - any implicit constructors from primitive host values
//!
//! The registry is filled once and then sealed; see the [`registry`] module
//! docs for the storage model.

mod entry;
pub mod registry;

pub use entry::{ConvertFn, ImplicitConversion, TypeEntry, TypeFlags, WrapFn};
pub use registry::{Checkpoint, TypeRegistry};
