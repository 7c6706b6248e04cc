//! Call context bridging host values and native Rust functions.

use std::fmt;

use refbridge_core::{
    ConversionError, Dynamic, FromDynamic, Handle, HandleError, Holder, IntoDynamic, NativeError,
    TypeHash,
};
use refbridge_registry::TypeRegistry;

/// Context for native function calls.
///
/// This bridges the host and Rust, providing access to function arguments
/// and the ability to set return values.
///
/// ## Object Arguments
///
/// Object parameters can be received under four conventions:
///
/// | parameter | access | count during the call |
/// |---|---|---|
/// | `&U` | [`arg_object`](Self::arg_object) | unchanged |
/// | `H` (by value) | [`arg_holder`](Self::arg_holder) | +1 |
/// | `&H` | `&ctx.arg_holder(i)?` | +1 for the temporary |
/// | `Option<&H>` | [`arg_holder_opt`](Self::arg_holder_opt) | +1 for the temporary |
///
/// Before extraction, a primitive argument is promoted through the target
/// type's implicit constructor when one is registered.
///
/// ```ignore
/// let obj: Ref<MyObject> = ctx.arg_holder(0)?;
/// let base: &dyn Object = ctx.arg_object(1)?;
/// ```
///
/// ## Return Values
///
/// ```ignore
/// ctx.set_return(42i32);
/// ctx.set_return_holder(Ref::new(MyObject::new(1)));
/// ```
pub struct CallContext<'c> {
    /// Argument slots
    args: &'c mut [Dynamic],
    /// Return value slot
    return_slot: &'c mut Dynamic,
    /// Type registry for casts and implicit conversions
    registry: &'c TypeRegistry,
}

impl<'c> CallContext<'c> {
    /// Create a new call context.
    pub fn new(
        args: &'c mut [Dynamic],
        return_slot: &'c mut Dynamic,
        registry: &'c TypeRegistry,
    ) -> Self {
        Self {
            args,
            return_slot,
            registry,
        }
    }

    /// Get the number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// The registry the call runs against.
    pub fn registry(&self) -> &'c TypeRegistry {
        self.registry
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.arg_count(),
            })
    }

    /// Get a mutable reference to an argument slot.
    pub fn arg_slot_mut(&mut self, index: usize) -> Result<&mut Dynamic, NativeError> {
        let count = self.arg_count();
        self.args
            .get_mut(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })
    }

    /// Get a typed argument value.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let x: i32 = ctx.arg(0)?;
    /// let flag: bool = ctx.arg(1)?;
    /// ```
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    /// Get the handle in an object argument slot, without promotion.
    ///
    /// `Null` reports [`HandleError::Empty`].
    pub fn arg_handle(&self, index: usize) -> Result<&Handle, NativeError> {
        match self.arg_slot(index)? {
            Dynamic::Object(handle) => Ok(handle),
            Dynamic::Null => Err(HandleError::Empty.into()),
            other => Err(ConversionError::TypeMismatch {
                expected: "object",
                actual: other.type_name(),
            }
            .into()),
        }
    }

    /// Take a new owner of an object argument as holder `H`.
    ///
    /// The returned holder counts as one more owner until it is dropped.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn arg_holder<H: Holder>(&mut self, index: usize) -> Result<H, NativeError> {
        let target = self.registry.type_hash_of::<H::Target>();
        self.promote(index, target)?;
        let handle = self.arg_handle(index)?;
        Ok(self.registry.extract::<H>(handle)?)
    }

    /// Like [`arg_holder`](Self::arg_holder), with `Null` mapping to `None`.
    pub fn arg_holder_opt<H: Holder>(&mut self, index: usize) -> Result<Option<H>, NativeError> {
        if self.arg_slot(index)?.is_null() {
            return Ok(None);
        }
        self.arg_holder(index).map(Some)
    }

    /// Borrow an object argument as `U` without touching its count.
    ///
    /// A promoted primitive is stored back into the slot, so the object lives
    /// until the call returns.
    pub fn arg_object<U: ?Sized + 'static>(&mut self, index: usize) -> Result<&U, NativeError> {
        let target = self.registry.type_hash_of::<U>();
        self.promote(index, target)?;
        self.arg_ref(index)
    }

    /// Borrow an object argument as `U`, without promotion.
    ///
    /// Unlike [`arg_object`](Self::arg_object) this takes `&self`, so several
    /// arguments can be borrowed at once.
    pub fn arg_ref<U: ?Sized + 'static>(&self, index: usize) -> Result<&U, NativeError> {
        let object = self.arg_handle(index)?.get()?;
        Ok(self.registry.cast_ref::<U>(object)?)
    }

    /// Replace a primitive argument with an object built by `target`'s
    /// implicit constructor. Other slots are left alone.
    fn promote(&mut self, index: usize, target: Option<TypeHash>) -> Result<(), NativeError> {
        let registry = self.registry;
        let slot = self.arg_slot_mut(index)?;
        let (Some(target), Some(kind)) = (target, slot.primitive_kind()) else {
            return Ok(());
        };
        let handle = registry.convert_from_primitive(target, slot)?;
        log::trace!("promoted {kind} argument {index} to '{target}'");
        *slot = Dynamic::Object(handle);
        Ok(())
    }

    /// Set a typed return value.
    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        *self.return_slot = value.into_dynamic();
    }

    /// Return an object, handing the holder's ownership to the caller.
    pub fn set_return_holder<H: Holder>(&mut self, holder: H) {
        *self.return_slot = Dynamic::from(holder.into_handle());
    }

    /// Return an object known only by raw pointer, wrapped under `H`'s
    /// ownership policy.
    ///
    /// # Errors
    ///
    /// [`HandleError::Null`] for a null pointer.
    ///
    /// # Safety
    ///
    /// Same contract as [`Holder::from_raw`].
    pub unsafe fn set_return_raw<H: Holder>(
        &mut self,
        ptr: *mut H::Target,
    ) -> Result<(), NativeError> {
        // SAFETY: forwarded to the caller.
        let holder = unsafe { H::from_raw(ptr) }?;
        self.set_return_holder(holder);
        Ok(())
    }

    /// Set the return value from a raw slot.
    pub fn set_return_slot(&mut self, slot: Dynamic) {
        *self.return_slot = slot;
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arg_count", &self.arg_count())
            .field("return_slot", &self.return_slot)
            .finish()
    }
}
