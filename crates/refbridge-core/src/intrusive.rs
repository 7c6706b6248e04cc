//! Intrusively counted handles.
//!
//! A [`Ref<T>`] is a pointer to a heap object whose reference count lives inside
//! the object itself ([`RefCounted::ref_count`]). Because the count travels
//! with the object, any raw pointer to a live object can be turned back into
//! an owning handle and every handle made that way shares the same count.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::{HandleError, Native, RefCounted, Upcast};

/// An owning handle to an intrusively counted object.
///
/// - `Clone` adds an owner.
/// - `Drop` removes one; the last drop destroys the object through `T`'s
///   vtable, so a `Ref<dyn Trait>` runs the concrete type's `Drop`.
pub struct Ref<T: ?Sized + RefCounted> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: RefCounted requires Send + Sync and the count is atomic.
unsafe impl<T: ?Sized + RefCounted> Send for Ref<T> {}
// SAFETY: as above.
unsafe impl<T: ?Sized + RefCounted> Sync for Ref<T> {}

impl<T: RefCounted> Ref<T> {
    /// Move `value` to the heap and take the first reference to it.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: freshly boxed.
        unsafe { Self::adopt(ptr) }
    }
}

impl<T: ?Sized + RefCounted> Ref<T> {
    /// Increment the embedded count and take ownership of that reference.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object allocated by `Box`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    unsafe fn adopt(ptr: NonNull<T>) -> Self {
        // SAFETY: caller guarantees the object is live.
        let object = unsafe { ptr.as_ref() };
        let count = object.ref_count().increment();
        log::trace!("wrap {} (intrusive, count {count})", object.native_type_name());
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Wrap a raw pointer, adding an owner to its embedded count.
    ///
    /// Pointers obtained from [`Ref::as_ptr`] of a live handle are always
    /// valid here, so a native function that only has a `*mut T` can hand out
    /// another owner.
    ///
    /// # Errors
    ///
    /// [`HandleError::Null`] if `ptr` is null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live object allocated by `Box` whose
    /// lifetime is managed only through `Ref` (its count is either zero and no
    /// one else owns it, or positive and held by other `Ref`s).
    pub unsafe fn from_raw(ptr: *mut T) -> Result<Self, HandleError> {
        let ptr = NonNull::new(ptr).ok_or(HandleError::Null)?;
        // SAFETY: forwarded to the caller.
        Ok(unsafe { Self::adopt(ptr) })
    }

    /// The object address. Does not change the count.
    #[inline]
    pub fn as_ptr(this: &Self) -> *mut T {
        this.ptr.as_ptr()
    }

    /// Current number of owners.
    #[inline]
    pub fn count(this: &Self) -> u32 {
        this.ref_count().get()
    }

    /// Whether both handles point at the same object.
    #[inline]
    pub fn ptr_eq<U: ?Sized + RefCounted>(this: &Self, other: &Ref<U>) -> bool {
        this.ptr.cast::<()>() == other.ptr.cast::<()>()
    }

    /// Convert into a handle to a base type, carrying this owner over.
    pub fn upcast<U>(this: Self) -> Ref<U>
    where
        U: ?Sized + RefCounted,
        T: Upcast<U>,
    {
        let this = ManuallyDrop::new(this);
        let ptr = <T as Upcast<U>>::upcast_ptr(this.ptr.as_ptr());
        Ref {
            // SAFETY: upcasting a non-null pointer keeps its address.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
            _owns: PhantomData,
        }
    }
}

impl Ref<dyn RefCounted> {
    /// Take an additional owner as `Ref<U>` if the concrete type is `C`.
    pub fn cast_concrete<C, U>(this: &Self) -> Option<Ref<U>>
    where
        C: Native + Upcast<U>,
        U: ?Sized + RefCounted,
    {
        let object: &dyn Native = &**this;
        if !object.is::<C>() {
            return None;
        }
        let concrete = this.ptr.cast::<C>();
        let ptr = <C as Upcast<U>>::upcast_ptr(concrete.as_ptr());
        // SAFETY: the object is live (we hold a reference) and was boxed.
        Some(unsafe { Ref::adopt(NonNull::new_unchecked(ptr)) })
    }

    /// Convert into a handle to the concrete type `C`.
    pub fn downcast<C: RefCounted>(this: Self) -> Result<Ref<C>, Self> {
        let object: &dyn Native = &*this;
        if !object.is::<C>() {
            return Err(this);
        }
        let this = ManuallyDrop::new(this);
        Ok(Ref {
            ptr: this.ptr.cast::<C>(),
            _owns: PhantomData,
        })
    }
}

impl<T: ?Sized + RefCounted> Clone for Ref<T> {
    fn clone(&self) -> Self {
        // SAFETY: we hold a reference, so the object is live.
        unsafe { Self::adopt(self.ptr) }
    }
}

impl<T: ?Sized + RefCounted> Drop for Ref<T> {
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn drop(&mut self) {
        // SAFETY: we hold a reference, so the object is live.
        let object = unsafe { self.ptr.as_ref() };
        let type_name = object.native_type_name();
        if !object.ref_count().decrement() {
            log::trace!("release {type_name} (intrusive)");
            return;
        }
        log::trace!("destroy {type_name} (intrusive)");
        // SAFETY: the count reached zero on this call, so no other handle
        // exists and the allocation came from Box.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl<T: ?Sized + RefCounted> Deref for Ref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: we hold a reference, so the object is live.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + RefCounted> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("type", &self.native_type_name())
            .field("address", &self.ptr.cast::<()>())
            .field("count", &Ref::count(self))
            .finish()
    }
}
