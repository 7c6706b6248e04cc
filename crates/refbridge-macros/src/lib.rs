//! refbridge Proc Macros
//!
//! This crate provides `#[derive(Native)]`, which implements the identity and
//! ownership traits a native type needs before it can be registered.
//!
//! # Example
//!
//! ```ignore
//! use refbridge::Native;
//! use refbridge_core::RefCount;
//!
//! #[derive(Native)]
//! #[refbridge(name = "MyObject", upcast(dyn Object))]
//! pub struct MyObject {
//!     value: i32,
//!     #[refbridge(ref_count)]
//!     refs: RefCount,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_native;

/// Derive `NativeType` and the matching `Upcast` impls for a struct.
///
/// Generated code refers to `::refbridge_core`, which must be a dependency of
/// the calling crate.
///
/// # Attributes
///
/// - `#[refbridge(name = "...")]` - Registered type name (default: struct name)
/// - `#[refbridge(intrusive)]` - Counted through an embedded `RefCount`
/// - `#[refbridge(external)]` - Counted through a shared control block (default)
/// - `#[refbridge(upcast(dyn Trait, ...))]` - Extra bases the type can be viewed as
///
/// # Field Attributes
///
/// - `#[refbridge(ref_count)]` - The embedded `RefCount`; implies `intrusive`
///
/// # Generated Items
///
/// - `NativeType` with the registered name
/// - `RefCounted` for intrusive types
/// - `Upcast<dyn Native>`, plus `Upcast<dyn RefCounted>` for intrusive types,
///   plus one `Upcast` per `upcast(...)` entry
#[proc_macro_derive(Native, attributes(refbridge))]
pub fn derive_native(input: TokenStream) -> TokenStream {
    derive_native::derive_native_impl(input)
}
