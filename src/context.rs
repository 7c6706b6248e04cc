//! Host-facing context.
//!
//! A `Context` owns the type registry and the native function table built
//! from installed modules, and is the entry point a host runtime calls into.
//!
//! # Example
//!
//! ```ignore
//! use refbridge::{Context, Dynamic, Module};
//!
//! let mut ctx = Context::new();
//! ctx.install(my_module)?;
//! ctx.seal();
//!
//! let obj = ctx.construct("MyObject", vec![Dynamic::Int(5)])?;
//! ctx.call("print_object", vec![Dynamic::from(obj)])?;
//! ```

use rustc_hash::FxHashMap;
use thiserror::Error;

use refbridge_core::{BridgeError, Dynamic, Handle, NativeError, RegistrationError, TypeHash};
use refbridge_registry::TypeRegistry;

use crate::{CallContext, Module, NativeFn};

/// Registry plus native functions, shared by every call from the host.
///
/// # Thread Safety
///
/// Installation takes `&mut self`; once sealed, a `Context` is only read and
/// can be shared across threads (for example in an `Arc`). Calls from several
/// threads may pass handles to the same objects; counts are atomic.
#[derive(Default)]
pub struct Context {
    registry: TypeRegistry,
    functions: FxHashMap<TypeHash, NativeFn>,
    constructors: FxHashMap<TypeHash, NativeFn>,
    module_count: usize,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a module into the context.
    ///
    /// Types are registered in declaration order, so a base must be declared
    /// before the types deriving from it.
    ///
    /// # Errors
    ///
    /// - [`ContextError::AlreadySealed`] after [`seal`](Self::seal).
    /// - [`ContextError::Registration`] for the first failing declaration.
    ///
    /// A module installs completely or not at all: on failure the context is
    /// left as it was.
    pub fn install(&mut self, module: Module) -> Result<(), ContextError> {
        if self.is_sealed() {
            return Err(ContextError::AlreadySealed);
        }

        let (types, functions) = module.into_parts();
        if let Some(function) = functions
            .iter()
            .find(|function| self.functions.contains_key(&function.id))
        {
            return Err(RegistrationError::DuplicateFunction(function.name().to_string()).into());
        }

        let checkpoint = self.registry.checkpoint();
        let mut constructors = Vec::new();
        for ty in types {
            let hash = ty.hash;
            match ty.apply(&mut self.registry) {
                Ok(Some(constructor)) => constructors.push((hash, constructor)),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("module rejected: {err}");
                    self.registry.rollback(checkpoint);
                    return Err(err.into());
                }
            }
        }

        self.constructors.extend(constructors);
        for function in functions {
            log::debug!("registered function '{}'", function.name());
            self.functions.insert(function.id, function);
        }

        self.module_count += 1;
        Ok(())
    }

    /// Seal the context. No more modules can be installed.
    ///
    /// Calling `seal()` multiple times is safe - subsequent calls are no-ops.
    pub fn seal(&mut self) {
        self.registry.seal();
    }

    /// Check if the context has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.registry.is_sealed()
    }

    /// The type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Get the total number of installed modules.
    pub fn module_count(&self) -> usize {
        self.module_count
    }

    /// Get the number of native functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Call a native function by name.
    ///
    /// The arguments are dropped when the call returns, so any holders the
    /// host passed are released then.
    ///
    /// # Errors
    ///
    /// - [`NativeError::UnknownFunction`] if no function has this name.
    /// - Whatever the function reports.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, name: &str, args: Vec<Dynamic>) -> Result<Dynamic, NativeError> {
        let function = self
            .functions
            .get(&TypeHash::from_function(name, &[]))
            .ok_or_else(|| NativeError::UnknownFunction(name.to_string()))?;
        log::trace!("calling '{name}' with {} arguments", args.len());
        self.invoke(function, args)
    }

    /// Construct an object through its registered constructor.
    ///
    /// # Errors
    ///
    /// - [`NativeError::UnknownType`] if the type is not registered.
    /// - [`NativeError::NoConstructor`] if it has no constructor.
    /// - Whatever the constructor reports.
    pub fn construct(&self, type_name: &str, args: Vec<Dynamic>) -> Result<Handle, NativeError> {
        let entry = self
            .registry
            .get_by_name(type_name)
            .ok_or_else(|| NativeError::UnknownType(type_name.to_string()))?;
        let constructor = self
            .constructors
            .get(&entry.hash())
            .ok_or_else(|| NativeError::NoConstructor(type_name.to_string()))?;

        match self.invoke(constructor, args)? {
            Dynamic::Object(handle) => Ok(handle),
            other => Err(NativeError::other(format!(
                "constructor of '{type_name}' returned {}",
                other.type_name()
            ))),
        }
    }

    /// Build an object from a primitive through the type's implicit
    /// constructor.
    ///
    /// # Errors
    ///
    /// - [`NativeError::UnknownType`] if the type is not registered.
    /// - [`NativeError::Conversion`] if no implicit constructor accepts the
    ///   value, or it fails.
    pub fn convert(&self, type_name: &str, value: &Dynamic) -> Result<Handle, NativeError> {
        let entry = self
            .registry
            .get_by_name(type_name)
            .ok_or_else(|| NativeError::UnknownType(type_name.to_string()))?;
        Ok(self.registry.convert_from_primitive(entry.hash(), value)?)
    }

    /// Wrap a raw pointer under the registered policy of `type_name`.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::wrap`].
    ///
    /// # Safety
    ///
    /// Same contract as [`TypeRegistry::wrap`].
    pub unsafe fn wrap(&self, type_name: &str, ptr: *mut ()) -> Result<Handle, BridgeError> {
        // SAFETY: forwarded to the caller.
        unsafe { self.registry.wrap(TypeHash::from_name(type_name), ptr) }
    }

    fn invoke(&self, function: &NativeFn, mut args: Vec<Dynamic>) -> Result<Dynamic, NativeError> {
        let mut ret = Dynamic::Void;
        let mut ctx = CallContext::new(&mut args, &mut ret, &self.registry);
        function.call(&mut ctx)?;
        Ok(ret)
    }
}

/// Errors that can occur during context operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Context is already sealed - cannot install modules
    #[error("context is already sealed - cannot install modules after seal()")]
    AlreadySealed,

    /// A declaration in the module was rejected
    #[error("failed to install module: {0}")]
    Registration(#[from] RegistrationError),
}
