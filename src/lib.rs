//! Expose natively owned Rust objects to a host runtime.
//!
//! Every registered type is counted under one of two ownership policies:
//!
//! - **Intrusive** ([`Ref<T>`]): the object embeds an atomic [`RefCount`];
//!   the host's handle bumps it directly.
//! - **External** ([`Shared<T>`]): a control block found by object address;
//!   wrapping the same pointer twice yields one shared owner.
//!
//! Either way the object is destroyed exactly once, after the last native or
//! host reference is gone, and always through its most-derived `Drop`.
//!
//! # Architecture
//!
//! ```text
//! Module (declarations) -> Context::install() -> TypeRegistry + NativeFn table
//!                                              |
//! host: Context::call(name, Vec<Dynamic>) -> CallContext -> native fn
//! ```
//!
//! # Example
//!
//! ```
//! use refbridge::prelude::*;
//!
//! trait Object: RefCounted {
//!     fn value(&self) -> i32;
//! }
//!
//! #[derive(Native)]
//! #[refbridge(name = "MyObject", upcast(dyn Object))]
//! struct MyObject {
//!     value: i32,
//!     #[refbridge(ref_count)]
//!     refs: RefCount,
//! }
//!
//! impl Object for MyObject {
//!     fn value(&self) -> i32 {
//!         self.value
//!     }
//! }
//!
//! impl_upcast!(dyn Object => dyn RefCounted, dyn Native);
//!
//! let mut module = Module::new();
//! module.register_base::<Ref<dyn Object>>("Object").build().unwrap();
//! module
//!     .register_type::<Ref<MyObject>>()
//!     .base::<Ref<dyn Object>>()
//!     .implicitly_convertible::<i32>(|value| Ok(MyObject { value, refs: RefCount::new() }))
//!     .build()
//!     .unwrap();
//! module
//!     .function("get_value", |ctx: &mut CallContext| {
//!         let value = ctx.arg_object::<MyObject>(0)?.value();
//!         ctx.set_return(value);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut ctx = Context::new();
//! ctx.install(module).unwrap();
//! ctx.seal();
//!
//! // 7 is promoted to a MyObject for the call and released afterwards
//! assert_eq!(ctx.call("get_value", vec![Dynamic::Int(7)]).unwrap(), Dynamic::Int(7));
//! ```

mod call_context;
mod class_builder;
mod context;
mod module;
mod native_fn;

pub use call_context::CallContext;
pub use class_builder::ClassBuilder;
pub use context::{Context, ContextError};
pub use module::Module;
pub use native_fn::{NativeCallable, NativeFn};

pub use refbridge_core::{
    BridgeError, ConstructHolder, ConversionError, Dynamic, FromDynamic, Handle, HandleError,
    Holder, IntoDynamic, Native, NativeError, NativeType, OwnershipPolicy, Primitive,
    PrimitiveKind, Ref, RefCount, RefCounted, RegistrationError, Shared, TypeHash, Upcast,
    impl_upcast,
};
pub use refbridge_registry::{TypeEntry, TypeFlags, TypeRegistry};

#[cfg(feature = "macros")]
pub use refbridge_macros::Native;

pub mod prelude {
    pub use crate::{
        CallContext, Context, Dynamic, Handle, Holder, Module, Native, NativeError, NativeType,
        OwnershipPolicy, Ref, RefCount, RefCounted, Shared, Upcast, impl_upcast,
    };
}
