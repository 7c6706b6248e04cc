//! Traits for native types that can cross into the host.
//!
//! [`NativeType`] carries the static identity of a concrete type (its
//! registered name and [`TypeHash`]). [`Native`] is the object-safe view of the
//! same information, so a type-erased object can still report what it is.
//! [`RefCounted`] marks types that embed their own [`RefCount`].
//!
//! # Example
//!
//! ```
//! use refbridge_core::{Native, NativeType, RefCount, RefCounted, TypeHash};
//!
//! struct MyObject {
//!     value: i32,
//!     refs: RefCount,
//! }
//!
//! impl NativeType for MyObject {
//!     fn type_name() -> &'static str {
//!         "MyObject"
//!     }
//! }
//!
//! impl RefCounted for MyObject {
//!     fn ref_count(&self) -> &RefCount {
//!         &self.refs
//!     }
//! }
//!
//! let obj = MyObject { value: 5, refs: RefCount::new() };
//! let erased: &dyn Native = &obj;
//! assert_eq!(erased.native_type_name(), "MyObject");
//! assert_eq!(erased.native_type_hash(), TypeHash::from_name("MyObject"));
//! assert_eq!(erased.downcast_ref::<MyObject>().map(|o| o.value), Some(5));
//! ```
//!
//! With the `#[derive(Native)]` macro (from `refbridge-macros`):
//!
//! ```ignore
//! #[derive(Native)]
//! #[refbridge(name = "MyObject", intrusive)]
//! pub struct MyObject {
//!     value: i32,
//!     #[refbridge(ref_count)]
//!     refs: RefCount,
//! }
//! ```

use std::any::{Any, TypeId};

use crate::{RefCount, TypeHash};

/// Static identity of a concrete native type.
///
/// Implemented once per registered struct, usually via `#[derive(Native)]`.
pub trait NativeType: Any + Send + Sync {
    /// The name the type is registered under.
    fn type_name() -> &'static str;

    /// The hash of [`type_name`](NativeType::type_name).
    fn type_hash() -> TypeHash {
        TypeHash::from_name(Self::type_name())
    }
}

/// Object-safe identity of a native object.
///
/// Blanket-implemented for every [`NativeType`]; trait objects built on top of
/// it (`dyn Native`, `dyn RefCounted`, user traits extending them) can report
/// their dynamic type and be downcast.
pub trait Native: Any + Send + Sync {
    /// `TypeId` of the concrete type.
    fn native_type_id(&self) -> TypeId;

    /// Registered name of the concrete type.
    fn native_type_name(&self) -> &'static str;

    /// Registered hash of the concrete type.
    fn native_type_hash(&self) -> TypeHash;

    /// View as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: NativeType> Native for T {
    #[inline]
    fn native_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    #[inline]
    fn native_type_name(&self) -> &'static str {
        T::type_name()
    }

    #[inline]
    fn native_type_hash(&self) -> TypeHash {
        T::type_hash()
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Native {
    /// Whether the concrete type is `T`.
    #[inline]
    pub fn is<T: Native>(&self) -> bool {
        self.native_type_id() == TypeId::of::<T>()
    }

    /// Downcast to the concrete type.
    #[inline]
    pub fn downcast_ref<T: Native>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// A native type that embeds its own reference count.
///
/// Objects of these types are owned through [`Ref<T>`](crate::Ref). The count
/// must be a field of the object and must not be shared with any other object.
pub trait RefCounted: Native {
    /// The embedded counter.
    fn ref_count(&self) -> &RefCount;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(u8);

    impl NativeType for Plain {
        fn type_name() -> &'static str {
            "Plain"
        }
    }

    struct Counted {
        refs: RefCount,
    }

    impl NativeType for Counted {
        fn type_name() -> &'static str {
            "Counted"
        }
    }

    impl RefCounted for Counted {
        fn ref_count(&self) -> &RefCount {
            &self.refs
        }
    }

    #[test]
    fn erased_identity() {
        let value = Plain(3);
        let erased: &dyn Native = &value;
        assert_eq!(erased.native_type_id(), TypeId::of::<Plain>());
        assert_eq!(erased.native_type_name(), "Plain");
        assert_eq!(erased.native_type_hash(), TypeHash::from_name("Plain"));
    }

    #[test]
    fn downcast() {
        let value = Plain(3);
        let erased: &dyn Native = &value;
        assert!(erased.is::<Plain>());
        assert!(!erased.is::<Counted>());
        assert_eq!(erased.downcast_ref::<Plain>().map(|p| p.0), Some(3));
        assert!(erased.downcast_ref::<Counted>().is_none());
    }

    #[test]
    fn ref_counted_reports_concrete_type() {
        let value = Counted {
            refs: RefCount::new(),
        };
        let counted: &dyn RefCounted = &value;
        assert_eq!(counted.native_type_name(), "Counted");
        assert_eq!(counted.ref_count().get(), 0);

        let native: &dyn Native = counted;
        assert!(native.is::<Counted>());
    }
}
