//! Pointer upcasting from a derived type to one of its bases.
//!
//! Rust has no class inheritance; a "base" of a native type is a trait object
//! it can be viewed through (`dyn Object`, `dyn RefCounted`, `dyn Native`).
//! [`Upcast`] records that relationship so handles can be converted from a
//! derived holder to a base holder without losing the concrete type's vtable:
//! destroying through the base pointer still runs the derived `Drop`.
//!
//! Implement it with [`impl_upcast!`](crate::impl_upcast) or `#[derive(Native)]`.

/// Conversion of a pointer to `Self` into a pointer to the base `U`.
///
/// # Safety
///
/// `upcast_ptr` must return a pointer to the same allocation with the same
/// data address, only changing pointer metadata. Handles rebuild boxes from the
/// returned pointer. The unsizing coercions emitted by [`impl_upcast!`] satisfy
/// this.
///
/// [`impl_upcast!`]: crate::impl_upcast
pub unsafe trait Upcast<U: ?Sized> {
    /// Convert a raw pointer.
    fn upcast_ptr(ptr: *mut Self) -> *mut U;

    /// Convert a shared reference.
    fn upcast_ref(&self) -> &U;
}

// SAFETY: identity.
unsafe impl<T: ?Sized> Upcast<T> for T {
    #[inline]
    fn upcast_ptr(ptr: *mut Self) -> *mut T {
        ptr
    }

    #[inline]
    fn upcast_ref(&self) -> &T {
        self
    }
}

/// Declare base types of a native type or trait object.
///
/// Each target must be reachable from the source by an unsizing or trait
/// upcasting coercion.
///
/// ```
/// use refbridge_core::{impl_upcast, Native, NativeType, Ref, RefCount, RefCounted};
///
/// trait Object: RefCounted {
///     fn describe(&self) -> String;
/// }
///
/// struct MyObject {
///     value: i32,
///     refs: RefCount,
/// }
///
/// impl NativeType for MyObject {
///     fn type_name() -> &'static str {
///         "MyObject"
///     }
/// }
///
/// impl RefCounted for MyObject {
///     fn ref_count(&self) -> &RefCount {
///         &self.refs
///     }
/// }
///
/// impl Object for MyObject {
///     fn describe(&self) -> String {
///         format!("MyObject[{}]", self.value)
///     }
/// }
///
/// impl_upcast!(MyObject => dyn Object, dyn RefCounted, dyn Native);
/// impl_upcast!(dyn Object => dyn RefCounted, dyn Native);
///
/// let obj = Ref::new(MyObject { value: 5, refs: RefCount::new() });
/// let base: Ref<dyn Object> = Ref::upcast(obj);
/// assert_eq!(base.describe(), "MyObject[5]");
/// ```
#[macro_export]
macro_rules! impl_upcast {
    ($from:ty => $($to:ty),+ $(,)?) => {
        $(
            // SAFETY: unsizing coercions keep the data address.
            unsafe impl $crate::Upcast<$to> for $from {
                #[inline]
                fn upcast_ptr(ptr: *mut Self) -> *mut $to {
                    ptr
                }

                #[inline]
                fn upcast_ref(&self) -> &$to {
                    self
                }
            }
        )+
    };
}
