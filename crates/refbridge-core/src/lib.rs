//! Core ownership bridge for refbridge.
//!
//! This crate holds the pieces that decide when a native object dies:
//!
//! - [`RefCount`] and [`Ref<T>`]: intrusive counting, the count lives in the object
//! - [`Shared<T>`]: external counting, a control block found by object address
//! - [`Handle`]: the type-erased reference a host runtime stores
//! - [`Upcast`] / [`impl_upcast!`]: derived-to-base handle conversion
//! - [`Dynamic`], [`FromDynamic`], [`IntoDynamic`]: host values and conversions
//! - [`TypeHash`]: deterministic identity for registered names
//!
//! Registration of policies and types lives in `refbridge-registry`; the
//! facade crate `refbridge` ties both together.

mod convert;
mod dynamic;
pub mod error;
mod handle;
mod holder;
mod intrusive;
mod native;
mod policy;
mod primitive;
mod ref_count;
mod shared;
mod type_hash;
mod upcast;

pub use convert::{FromDynamic, IntoDynamic};
pub use dynamic::Dynamic;
pub use error::{BridgeError, ConversionError, HandleError, NativeError, RegistrationError};
pub use handle::Handle;
pub use holder::{ConstructHolder, Holder};
pub use intrusive::Ref;
pub use native::{Native, NativeType, RefCounted};
pub use policy::OwnershipPolicy;
pub use primitive::{Primitive, PrimitiveKind};
pub use ref_count::RefCount;
pub use shared::Shared;
pub use type_hash::{TypeHash, hash_constants};
pub use upcast::Upcast;
