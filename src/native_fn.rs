//! Native function storage and callable trait.

use std::fmt;
use std::sync::Arc;

use refbridge_core::{NativeError, TypeHash};

use crate::CallContext;

/// Type-erased native function.
///
/// This wraps any callable that implements [`NativeCallable`], allowing
/// functions of different signatures to be stored uniformly. The callable is
/// shared through an `Arc`, so clones are cheap.
#[derive(Clone)]
pub struct NativeFn {
    /// Function identity, derived from the registered name.
    pub id: TypeHash,
    name: Arc<str>,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Create a new NativeFn from a callable.
    pub fn new<F>(id: TypeHash, name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id,
            name: name.into(),
            inner: Arc::new(f),
        }
    }

    /// The name the function was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call this native function with the given context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a [`CallContext`] that provides access to
/// arguments and allows setting the return value.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        (self)(ctx)
    }
}
