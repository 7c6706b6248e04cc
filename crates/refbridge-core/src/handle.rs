//! Host-held, type-erased handles.
//!
//! A [`Handle`] is what the host runtime stores in its value slots. It owns one
//! reference to a native object under the object's ownership policy, or is
//! empty. Copying a handle adds an owner and dropping it removes one, so the
//! host never needs to know which flavor of counting sits underneath.

use std::fmt;

use crate::{HandleError, Native, NativeType, OwnershipPolicy, Ref, RefCounted, Shared, Upcast};

#[derive(Clone, Default)]
enum Inner {
    #[default]
    Empty,
    Intrusive(Ref<dyn RefCounted>),
    External(Shared<dyn Native>),
}

/// A host-side reference to a native object.
///
/// # Example
///
/// ```
/// use refbridge_core::{impl_upcast, Handle, Native, NativeType, OwnershipPolicy, Shared};
///
/// struct MyObject2(i32);
///
/// impl NativeType for MyObject2 {
///     fn type_name() -> &'static str {
///         "MyObject2"
///     }
/// }
///
/// impl_upcast!(MyObject2 => dyn Native);
///
/// let handle = Handle::from_shared(Shared::new(MyObject2(2)));
/// assert_eq!(handle.policy(), Some(OwnershipPolicy::External));
///
/// let copy = handle.clone();
/// assert_eq!(copy.use_count(), 2);
/// assert_eq!(copy.downcast_ref::<MyObject2>().unwrap().0, 2);
///
/// drop(handle);
/// assert_eq!(copy.use_count(), 1);
/// assert!(Handle::empty().get().is_err());
/// ```
#[derive(Clone, Default)]
pub struct Handle {
    inner: Inner,
}

impl Handle {
    /// A handle bound to nothing.
    pub const fn empty() -> Self {
        Self { inner: Inner::Empty }
    }

    /// Erase an intrusive handle.
    pub fn from_ref<T>(handle: Ref<T>) -> Self
    where
        T: ?Sized + RefCounted + Upcast<dyn RefCounted>,
    {
        Self {
            inner: Inner::Intrusive(Ref::upcast(handle)),
        }
    }

    /// Erase an external handle.
    pub fn from_shared<T>(handle: Shared<T>) -> Self
    where
        T: ?Sized + Native + Upcast<dyn Native>,
    {
        Self {
            inner: Inner::External(Shared::upcast(handle)),
        }
    }

    /// Policy of the object behind this handle, `None` when empty.
    pub fn policy(&self) -> Option<OwnershipPolicy> {
        match &self.inner {
            Inner::Empty => None,
            Inner::Intrusive(_) => Some(OwnershipPolicy::Intrusive),
            Inner::External(_) => Some(OwnershipPolicy::External),
        }
    }

    /// Whether the handle is bound to nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self.inner, Inner::Empty)
    }

    /// Borrow the object.
    ///
    /// # Errors
    ///
    /// [`HandleError::Empty`] if the handle is empty.
    pub fn get(&self) -> Result<&dyn Native, HandleError> {
        match &self.inner {
            Inner::Empty => Err(HandleError::Empty),
            Inner::Intrusive(handle) => Ok(&**handle),
            Inner::External(handle) => Ok(&**handle),
        }
    }

    /// The object address. Does not change any count.
    ///
    /// # Errors
    ///
    /// [`HandleError::Empty`] if the handle is empty.
    pub fn as_ptr(&self) -> Result<*const (), HandleError> {
        match &self.inner {
            Inner::Empty => Err(HandleError::Empty),
            Inner::Intrusive(handle) => Ok(Ref::as_ptr(handle).cast_const().cast::<()>()),
            Inner::External(handle) => Ok(Shared::as_ptr(handle).cast_const().cast::<()>()),
        }
    }

    /// Borrow the object as its concrete type.
    ///
    /// # Errors
    ///
    /// - [`HandleError::Empty`] if the handle is empty.
    /// - [`HandleError::TypeMismatch`] if the object is not a `T`.
    pub fn downcast_ref<T: NativeType>(&self) -> Result<&T, HandleError> {
        let object = self.get()?;
        object
            .downcast_ref::<T>()
            .ok_or_else(|| HandleError::TypeMismatch {
                expected: T::type_name().to_string(),
                actual: object.native_type_name().to_string(),
            })
    }

    /// Registered name of the object's concrete type.
    pub fn type_name(&self) -> Option<&'static str> {
        self.get().ok().map(|object| object.native_type_name())
    }

    /// Number of owners of the object, 0 when empty.
    pub fn use_count(&self) -> usize {
        match &self.inner {
            Inner::Empty => 0,
            Inner::Intrusive(handle) => Ref::count(handle) as usize,
            Inner::External(handle) => Shared::use_count(handle),
        }
    }

    /// Whether both handles refer to the same object (or are both empty).
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        match (&self.inner, &other.inner) {
            (Inner::Empty, Inner::Empty) => true,
            (Inner::Intrusive(a), Inner::Intrusive(b)) => Ref::ptr_eq(a, b),
            (Inner::External(a), Inner::External(b)) => Shared::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Borrow the intrusive handle.
    ///
    /// # Errors
    ///
    /// [`HandleError::Empty`] or [`HandleError::WrongPolicy`].
    pub fn as_intrusive(&self) -> Result<&Ref<dyn RefCounted>, HandleError> {
        match &self.inner {
            Inner::Intrusive(handle) => Ok(handle),
            Inner::Empty => Err(HandleError::Empty),
            Inner::External(_) => Err(HandleError::WrongPolicy {
                expected: OwnershipPolicy::Intrusive,
                actual: OwnershipPolicy::External,
            }),
        }
    }

    /// Borrow the external handle.
    ///
    /// # Errors
    ///
    /// [`HandleError::Empty`] or [`HandleError::WrongPolicy`].
    pub fn as_external(&self) -> Result<&Shared<dyn Native>, HandleError> {
        match &self.inner {
            Inner::External(handle) => Ok(handle),
            Inner::Empty => Err(HandleError::Empty),
            Inner::Intrusive(_) => Err(HandleError::WrongPolicy {
                expected: OwnershipPolicy::External,
                actual: OwnershipPolicy::Intrusive,
            }),
        }
    }

    /// Give up this owner. Equivalent to dropping the handle.
    pub fn release(self) {
        if let Some(name) = self.type_name() {
            log::trace!("host released {name} ({} owners before)", self.use_count());
        }
    }
}

impl<T> From<Ref<T>> for Handle
where
    T: ?Sized + RefCounted + Upcast<dyn RefCounted>,
{
    fn from(handle: Ref<T>) -> Self {
        Handle::from_ref(handle)
    }
}

impl<T> From<Shared<T>> for Handle
where
    T: ?Sized + Native + Upcast<dyn Native>,
{
    fn from(handle: Shared<T>) -> Self {
        Handle::from_shared(handle)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Empty => f.write_str("Handle(empty)"),
            Inner::Intrusive(handle) => f.debug_tuple("Handle").field(handle).finish(),
            Inner::External(handle) => f.debug_tuple("Handle").field(handle).finish(),
        }
    }
}
