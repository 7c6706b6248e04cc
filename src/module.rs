//! Native registration module.
//!
//! A [`Module`] collects type and function declarations. Nothing is checked
//! against other modules until the module is installed into a
//! [`Context`](crate::Context), which applies it to the context's
//! [`TypeRegistry`].
//!
//! ```text
//! Module (declarations) -> Context::install() -> TypeRegistry + function table
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut module = Module::new();
//! module.register_base::<Ref<dyn Object>>("Object").build()?;
//! module.register_type::<Ref<MyObject>>().base::<Ref<dyn Object>>().build()?;
//! module.function("print_object", |ctx: &mut CallContext| {
//!     let obj: &dyn Object = ctx.arg_object(0)?;
//!     println!("{}", obj.describe());
//!     Ok(())
//! })?;
//! ```

use std::fmt;

use refbridge_core::{
    ConstructHolder, Holder, NativeError, NativeType, RegistrationError, TypeHash,
};
use refbridge_registry::TypeRegistry;

use crate::{CallContext, ClassBuilder, NativeFn};

/// Registers one type in a registry.
pub(crate) type RegisterFn = fn(&mut TypeRegistry, &str) -> Result<TypeHash, RegistrationError>;

/// A registration step applied after the type itself exists.
pub(crate) type DeferredFn =
    Box<dyn FnOnce(&mut TypeRegistry, TypeHash) -> Result<(), RegistrationError>>;

/// One type declared through a [`ClassBuilder`].
pub(crate) struct TypeRegistration {
    pub(crate) name: String,
    pub(crate) hash: TypeHash,
    pub(crate) register: RegisterFn,
    pub(crate) deferred: Vec<DeferredFn>,
    pub(crate) constructor: Option<NativeFn>,
}

impl TypeRegistration {
    /// Apply to the registry, returning the constructor to install.
    pub(crate) fn apply(
        self,
        registry: &mut TypeRegistry,
    ) -> Result<Option<NativeFn>, RegistrationError> {
        let hash = (self.register)(registry, &self.name)?;
        for step in self.deferred {
            step(registry, hash)?;
        }
        Ok(self.constructor)
    }
}

/// A set of native types and functions to expose to the host.
#[derive(Default)]
pub struct Module {
    types: Vec<TypeRegistration>,
    functions: Vec<NativeFn>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a concrete type, exposed through holder `H`.
    ///
    /// The registered name is the value type's
    /// [`NativeType::type_name`]; the ownership policy is the holder's.
    pub fn register_type<H: ConstructHolder>(&mut self) -> ClassBuilder<'_, H> {
        let name = <H::Value as NativeType>::type_name().to_string();
        ClassBuilder::new(self, name, |registry, _| registry.register_type::<H>())
    }

    /// Declare an abstract base, exposed through a trait-object holder such as
    /// `Ref<dyn Object>`.
    pub fn register_base<H: Holder>(&mut self, name: &str) -> ClassBuilder<'_, H> {
        ClassBuilder::new(self, name.to_string(), |registry, name| {
            registry.register_abstract::<H>(name)
        })
    }

    /// Register a native function.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicateFunction`] if the module already has a
    /// function with this name.
    pub fn function<F>(&mut self, name: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut CallContext) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        let id = TypeHash::from_function(name, &[]);
        if self.functions.iter().any(|existing| existing.id == id) {
            return Err(RegistrationError::DuplicateFunction(name.to_string()));
        }
        self.functions.push(NativeFn::new(id, name, f));
        Ok(())
    }

    pub(crate) fn add_type(&mut self, ty: TypeRegistration) -> Result<(), RegistrationError> {
        if self.types.iter().any(|existing| existing.hash == ty.hash) {
            return Err(RegistrationError::DuplicateType(ty.name));
        }
        self.types.push(ty);
        Ok(())
    }

    /// Number of declared types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of declared functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Names of the declared types, in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|ty| ty.name.as_str())
    }

    pub(crate) fn into_parts(self) -> (Vec<TypeRegistration>, Vec<NativeFn>) {
        (self.types, self.functions)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("types", &self.type_names().collect::<Vec<_>>())
            .field("functions", &self.functions)
            .finish()
    }
}
