//! ClassBuilder for registering native types with a [`Module`].
//!
//! ClassBuilder provides a fluent API for registering a native type together
//! with its ownership policy, its bases, its constructor and its implicit
//! conversions. [`ClassBuilder::build`] records the type in the module; the
//! registry sees it when the module is [installed](crate::Context::install).
//!
//! # Example
//!
//! ```ignore
//! // Abstract base, intrusively counted
//! module.register_base::<Ref<dyn Object>>("Object").build()?;
//!
//! // Concrete type, same policy as its base
//! module
//!     .register_type::<Ref<MyObject>>()
//!     .base::<Ref<dyn Object>>()
//!     .constructor(|ctx| Ok(MyObject::new(ctx.arg(0)?)))
//!     .implicitly_convertible::<i32>(|value| Ok(MyObject::new(value)))
//!     .build()?;
//!
//! // Externally counted type
//! module.register_type::<Shared<MyObject2>>().build()?;
//! ```

use std::fmt;

use refbridge_core::{
    ConstructHolder, Holder, NativeError, NativeType, Primitive, RegistrationError, TypeHash,
    Upcast,
};
use refbridge_registry::TypeRegistry;

use crate::module::{DeferredFn, RegisterFn, TypeRegistration};
use crate::{CallContext, Module, NativeFn};

/// Builder for registering native types.
///
/// Created by [`Module::register_type`] or [`Module::register_base`].
///
/// # Type Parameters
///
/// - `'m`: Lifetime of the mutable borrow of the Module
/// - `H`: The holder values of this type travel in (`Ref<T>` or `Shared<T>`)
pub struct ClassBuilder<'m, H: Holder> {
    /// Module the type is registered into
    module: &'m mut Module,
    /// Registered name
    name: String,
    /// Registers the type itself
    register: RegisterFn,
    /// Bases and conversions, applied after the type exists
    deferred: Vec<DeferredFn>,
    /// Host-side constructor
    constructor: Option<NativeFn>,
    _holder: std::marker::PhantomData<fn() -> H>,
}

impl<'m, H: Holder> ClassBuilder<'m, H> {
    pub(crate) fn new(module: &'m mut Module, name: String, register: RegisterFn) -> Self {
        Self {
            module,
            name,
            register,
            deferred: Vec::new(),
            constructor: None,
            _holder: std::marker::PhantomData,
        }
    }

    /// Declare a base reached through this holder, such as one trait object
    /// extending another.
    ///
    /// Every concrete type that can be passed as `H` can then also be passed
    /// as `B`, including types registered after this one. Both types must
    /// already be registered (or be registered earlier in this builder chain)
    /// under the same policy.
    pub fn extends<B: Holder>(mut self) -> Self
    where
        H::Target: Upcast<B::Target>,
    {
        self.deferred.push(Box::new(|registry: &mut TypeRegistry, derived: TypeHash| {
            registry.add_holder_base::<H, B>(derived)
        }));
        self
    }

    /// Record the type and everything declared on the builder in the module.
    ///
    /// Returns the hash the type will be registered under.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicateType`] if the module already declares a
    /// type with this name.
    pub fn build(self) -> Result<TypeHash, RegistrationError> {
        let hash = TypeHash::from_name(&self.name);
        self.module.add_type(TypeRegistration {
            name: self.name,
            hash,
            register: self.register,
            deferred: self.deferred,
            constructor: self.constructor,
        })?;
        Ok(hash)
    }
}

impl<'m, H: ConstructHolder> ClassBuilder<'m, H> {
    /// Declare a base the type can be passed as.
    ///
    /// Values of this type become extractable as `B` holders and viewable as
    /// `&B::Target`.
    pub fn base<B: Holder>(mut self) -> Self
    where
        H::Value: Upcast<B::Target>,
    {
        self.deferred.push(Box::new(|registry: &mut TypeRegistry, derived: TypeHash| {
            registry.add_base::<H::Value, B>(derived)
        }));
        self
    }

    /// Set the host-side constructor.
    ///
    /// The new object is returned to the host under this type's policy.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallContext) -> Result<H::Value, NativeError> + Send + Sync + 'static,
    {
        let id = TypeHash::from_constructor(<H::Value as NativeType>::type_hash(), &[]);
        let name = format!("{}::new", self.name);
        let construct = move |ctx: &mut CallContext| -> Result<(), NativeError> {
            let value = f(ctx)?;
            ctx.set_return_holder(H::construct(value));
            Ok(())
        };
        self.constructor = Some(NativeFn::new(id, name, construct));
        self
    }

    /// Allow a primitive of type `P` to be passed where this type is
    /// expected; `ctor` builds the object from it.
    ///
    /// An `Err` from `ctor` rejects the argument with its message.
    pub fn implicitly_convertible<P: Primitive>(
        mut self,
        ctor: impl Fn(P) -> Result<H::Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.deferred.push(Box::new(move |registry: &mut TypeRegistry, _: TypeHash| {
            registry.add_implicit_conversion::<P, H, _>(ctor)
        }));
        self
    }
}

impl<H: Holder> fmt::Debug for ClassBuilder<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("policy", &H::POLICY)
            .field("deferred", &self.deferred.len())
            .field("constructor", &self.constructor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use refbridge_core::{
        Dynamic, Native, OwnershipPolicy, Ref, RefCount, RefCounted, Shared, impl_upcast,
    };

    trait Shape: RefCounted {
        fn sides(&self) -> u32;
    }

    trait Polygon: Shape {}

    struct Square {
        refs: RefCount,
    }

    impl NativeType for Square {
        fn type_name() -> &'static str {
            "Square"
        }
    }

    impl RefCounted for Square {
        fn ref_count(&self) -> &RefCount {
            &self.refs
        }
    }

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    impl Polygon for Square {}

    struct Label(String);

    impl NativeType for Label {
        fn type_name() -> &'static str {
            "Label"
        }
    }

    impl_upcast!(Square => dyn Polygon, dyn Shape, dyn RefCounted, dyn Native);
    impl_upcast!(dyn Shape => dyn RefCounted, dyn Native);
    impl_upcast!(dyn Polygon => dyn Shape, dyn RefCounted, dyn Native);
    impl_upcast!(Label => dyn Native);

    fn square() -> Square {
        Square {
            refs: RefCount::new(),
        }
    }

    fn install(module: Module) -> Result<Context, crate::ContextError> {
        let mut ctx = Context::new();
        ctx.install(module)?;
        Ok(ctx)
    }

    #[test]
    fn class_builder_intrusive_with_base() {
        let mut module = Module::new();
        module.register_base::<Ref<dyn Shape>>("Shape").build().unwrap();
        module
            .register_type::<Ref<Square>>()
            .base::<Ref<dyn Shape>>()
            .constructor(|_ctx| Ok(square()))
            .build()
            .unwrap();
        let ctx = install(module).unwrap();

        let registry = ctx.registry();
        let shape = TypeHash::from_name("Shape");
        let sq = TypeHash::from_name("Square");
        assert!(registry.is_derived_from(sq, shape));
        assert!(registry.get(shape).unwrap().is_abstract());
        assert_eq!(registry.policy_of(sq), Some(OwnershipPolicy::Intrusive));

        let handle = ctx.construct("Square", vec![]).unwrap();
        let base: Ref<dyn Shape> = registry.extract(&handle).unwrap();
        assert_eq!(base.sides(), 4);
        assert_eq!(handle.use_count(), 2);
    }

    #[test]
    fn class_builder_external_with_conversion() {
        let mut module = Module::new();
        module
            .register_type::<Shared<Label>>()
            .implicitly_convertible::<String>(|text| {
                if text.is_empty() {
                    Err("empty label".to_string())
                } else {
                    Ok(Label(text))
                }
            })
            .build()
            .unwrap();
        let ctx = install(module).unwrap();

        let handle = ctx.convert("Label", &Dynamic::String("hi".into())).unwrap();
        assert_eq!(handle.policy(), Some(OwnershipPolicy::External));
        assert_eq!(handle.downcast_ref::<Label>().unwrap().0, "hi");

        assert!(matches!(
            ctx.convert("Label", &Dynamic::String(String::new())),
            Err(NativeError::Conversion(
                refbridge_core::ConversionError::Rejected { .. }
            ))
        ));
    }

    #[test]
    fn class_builder_extends_trait_base() {
        let mut module = Module::new();
        module.register_base::<Ref<dyn Shape>>("Shape").build().unwrap();
        module
            .register_base::<Ref<dyn Polygon>>("Polygon")
            .extends::<Ref<dyn Shape>>()
            .build()
            .unwrap();
        module
            .register_type::<Ref<Square>>()
            .base::<Ref<dyn Polygon>>()
            .constructor(|_ctx| Ok(square()))
            .build()
            .unwrap();
        let ctx = install(module).unwrap();

        let registry = ctx.registry();
        assert_eq!(
            registry.bases_of(TypeHash::from_name("Polygon")),
            vec![TypeHash::from_name("Shape")]
        );
        assert!(registry.is_derived_from(
            TypeHash::from_name("Square"),
            TypeHash::from_name("Shape")
        ));

        // Square only names Polygon, but reaches Shape through it
        let handle = ctx.construct("Square", vec![]).unwrap();
        let shape: Ref<dyn Shape> = registry.extract(&handle).unwrap();
        assert_eq!(shape.sides(), 4);
        assert_eq!(handle.use_count(), 2);
        let viewed = registry.cast_ref::<dyn Shape>(handle.get().unwrap()).unwrap();
        assert_eq!(viewed.sides(), 4);
        drop(shape);
        assert_eq!(handle.use_count(), 1);
    }

    #[test]
    fn class_builder_unknown_base() {
        let mut module = Module::new();
        module
            .register_type::<Ref<Square>>()
            .base::<Ref<dyn Shape>>()
            .build()
            .unwrap();

        assert!(matches!(
            install(module),
            Err(crate::ContextError::Registration(
                RegistrationError::UnknownBase { .. }
            ))
        ));
    }

    #[test]
    fn class_builder_policy_mismatch() {
        let mut module = Module::new();
        module.register_base::<Shared<dyn Native>>("Any").build().unwrap();
        module
            .register_type::<Ref<Square>>()
            .base::<Shared<dyn Native>>()
            .build()
            .unwrap();

        assert!(matches!(
            install(module),
            Err(crate::ContextError::Registration(
                RegistrationError::PolicyMismatch { .. }
            ))
        ));
    }

    #[test]
    fn class_builder_debug() {
        let mut module = Module::new();
        let builder = module.register_type::<Shared<Label>>();
        let debug = format!("{builder:?}");
        assert!(debug.contains("Label"));
        assert!(debug.contains("External"));
    }
}
