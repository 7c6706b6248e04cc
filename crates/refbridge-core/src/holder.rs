//! Typed holders.
//!
//! A holder is the native-side owning pointer a registered type is exposed
//! with: [`Ref<T>`] for intrusive types, [`Shared<T>`] for external ones. The
//! [`Holder`] trait lets registration and marshaling code work with either
//! without caring which counting scheme is underneath.

use std::ptr::NonNull;

use crate::{
    Handle, HandleError, Native, NativeType, OwnershipPolicy, Ref, RefCounted, Shared, Upcast,
};

/// An owning pointer that can cross into a [`Handle`] and back.
pub trait Holder: Clone + Send + Sync + Sized + 'static {
    /// The type the holder points at, possibly a trait object.
    type Target: ?Sized + Native;

    /// Ownership policy this holder implements.
    const POLICY: OwnershipPolicy;

    /// Erase into a host handle, moving this owner into it.
    fn into_handle(self) -> Handle;

    /// Take a new owner from `handle` if its object's concrete type is `C`.
    fn from_concrete<C>(handle: &Handle) -> Option<Self>
    where
        C: Native + Upcast<Self::Target>;

    /// Wrap a raw pointer under this holder's policy.
    ///
    /// # Safety
    ///
    /// See [`Ref::from_raw`] and [`Shared::from_raw`].
    unsafe fn from_raw(ptr: *mut Self::Target) -> Result<Self, HandleError>;

    /// Take a new owner of the handle's object, addressed as `ptr`.
    ///
    /// Returns `None` if the handle is empty or uses the other policy.
    ///
    /// # Safety
    ///
    /// `ptr` must point at the object `handle` owns.
    unsafe fn share_from(handle: &Handle, ptr: *mut Self::Target) -> Option<Self>;

    /// The object address. Does not change the count.
    fn as_ptr(this: &Self) -> *mut Self::Target;

    /// Current number of owners.
    fn use_count(this: &Self) -> usize;
}

/// A holder for a concrete, constructible type.
pub trait ConstructHolder: Holder {
    /// The concrete value type.
    type Value: NativeType;

    /// Allocate `value` and take the first owner.
    fn construct(value: Self::Value) -> Self;

    /// Take a new owner from `handle` if it holds exactly a `Value`.
    fn from_handle(handle: &Handle) -> Option<Self>;

    /// Wrap an untyped pointer to a `Value` into a host handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a `Value` satisfying the contract of
    /// [`Holder::from_raw`].
    unsafe fn wrap_raw(ptr: *mut ()) -> Result<Handle, HandleError>;
}

impl<T> Holder for Ref<T>
where
    T: ?Sized + RefCounted + Upcast<dyn RefCounted>,
{
    type Target = T;

    const POLICY: OwnershipPolicy = OwnershipPolicy::Intrusive;

    fn into_handle(self) -> Handle {
        Handle::from_ref(self)
    }

    fn from_concrete<C>(handle: &Handle) -> Option<Self>
    where
        C: Native + Upcast<T>,
    {
        Ref::<dyn RefCounted>::cast_concrete::<C, T>(handle.as_intrusive().ok()?)
    }

    unsafe fn from_raw(ptr: *mut T) -> Result<Self, HandleError> {
        // SAFETY: forwarded to the caller.
        unsafe { Ref::<T>::from_raw(ptr) }
    }

    unsafe fn share_from(handle: &Handle, ptr: *mut T) -> Option<Self> {
        handle.as_intrusive().ok()?;
        // SAFETY: the handle keeps the object behind `ptr` alive.
        unsafe { Ref::<T>::from_raw(ptr) }.ok()
    }

    fn as_ptr(this: &Self) -> *mut T {
        Ref::<T>::as_ptr(this)
    }

    fn use_count(this: &Self) -> usize {
        Ref::count(this) as usize
    }
}

impl<T> ConstructHolder for Ref<T>
where
    T: NativeType + RefCounted + Upcast<dyn RefCounted>,
{
    type Value = T;

    fn construct(value: T) -> Self {
        Ref::new(value)
    }

    fn from_handle(handle: &Handle) -> Option<Self> {
        Self::from_concrete::<T>(handle)
    }

    unsafe fn wrap_raw(ptr: *mut ()) -> Result<Handle, HandleError> {
        // SAFETY: forwarded to the caller.
        unsafe { Ref::<T>::from_raw(ptr.cast::<T>()) }.map(Handle::from_ref)
    }
}

impl<T> Holder for Shared<T>
where
    T: ?Sized + Native + Upcast<dyn Native>,
{
    type Target = T;

    const POLICY: OwnershipPolicy = OwnershipPolicy::External;

    fn into_handle(self) -> Handle {
        Handle::from_shared(self)
    }

    fn from_concrete<C>(handle: &Handle) -> Option<Self>
    where
        C: Native + Upcast<T>,
    {
        Shared::<dyn Native>::cast_concrete::<C, T>(handle.as_external().ok()?)
    }

    unsafe fn from_raw(ptr: *mut T) -> Result<Self, HandleError> {
        // SAFETY: forwarded to the caller.
        unsafe { Shared::<T>::from_raw(ptr) }
    }

    unsafe fn share_from(handle: &Handle, ptr: *mut T) -> Option<Self> {
        let owner = handle.as_external().ok()?;
        // SAFETY: forwarded to the caller.
        Some(unsafe { Shared::<dyn Native>::alias(owner, NonNull::new(ptr)?) })
    }

    fn as_ptr(this: &Self) -> *mut T {
        Shared::<T>::as_ptr(this)
    }

    fn use_count(this: &Self) -> usize {
        Shared::<T>::use_count(this)
    }
}

impl<T> ConstructHolder for Shared<T>
where
    T: NativeType + Upcast<dyn Native>,
{
    type Value = T;

    fn construct(value: T) -> Self {
        Shared::new(value)
    }

    fn from_handle(handle: &Handle) -> Option<Self> {
        Self::from_concrete::<T>(handle)
    }

    unsafe fn wrap_raw(ptr: *mut ()) -> Result<Handle, HandleError> {
        // SAFETY: forwarded to the caller.
        unsafe { Shared::<T>::from_raw(ptr.cast::<T>()) }.map(Handle::from_shared)
    }
}
