//! Conversion traits for native call argument extraction and return values.
//!
//! This module provides traits for converting between Rust types and host values:
//! - [`FromDynamic`]: Extract a Rust value from a [`Dynamic`]
//! - [`IntoDynamic`]: Convert a Rust value into a [`Dynamic`]
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`
//! - Floats: `f32`, `f64`
//! - Boolean: `bool`
//! - Strings: `String`
//! - Unit: `()` (void)
//! - Objects: [`Handle`], and [`Ref<T>`] / [`Shared<T>`] for `IntoDynamic`
//!
//! ## Example
//!
//! ```
//! use refbridge_core::{Dynamic, FromDynamic, IntoDynamic};
//!
//! let slot = Dynamic::Int(42);
//! let value: i32 = i32::from_dynamic(&slot).unwrap();
//! assert_eq!(value.into_dynamic(), slot);
//! ```

use crate::{ConversionError, Dynamic, Handle, Native, Ref, RefCounted, Shared, Upcast};

/// Extract a value from a host value.
pub trait FromDynamic: Sized {
    /// Extract a value from the given slot.
    ///
    /// Returns a `ConversionError` if the slot contains an incompatible type.
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a host value.
pub trait IntoDynamic {
    /// Convert this value into a host value.
    fn into_dynamic(self) -> Dynamic;
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_from_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
                    match slot {
                        Dynamic::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(ConversionError::TypeMismatch {
                            expected: "int",
                            actual: slot.type_name(),
                        }),
                    }
                }
            }

            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(self as i64)
                }
            }
        )*
    };
}

impl_from_dynamic_int!(i8, i16, i32, i64, u8, u16, u32);

// u64 reinterprets the bits so the full range survives a round trip
impl FromDynamic for u64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Int(v) => Ok(*v as u64),
            _ => Err(ConversionError::TypeMismatch {
                expected: "int",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

// ============================================================================
// Float implementations
// ============================================================================

impl FromDynamic for f32 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Float(v) => {
                if !v.is_finite() || (*v <= f32::MAX as f64 && *v >= f32::MIN as f64) {
                    Ok(*v as f32)
                } else {
                    Err(ConversionError::FloatConversion {
                        value: *v,
                        target_type: "f32",
                    })
                }
            }
            Dynamic::Int(v) => Ok(*v as f32),
            _ => Err(ConversionError::TypeMismatch {
                expected: "float",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self as f64)
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Float(v) => Ok(*v),
            Dynamic::Int(v) => Ok(*v as f64),
            _ => Err(ConversionError::TypeMismatch {
                expected: "float",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

// ============================================================================
// Bool, string, unit
// ============================================================================

impl FromDynamic for bool {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Bool(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "bool",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for String {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl IntoDynamic for &str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_owned())
    }
}

impl FromDynamic for () {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Void => Ok(()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "void",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Void
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Copies the handle; `Null` extracts as an empty handle.
impl FromDynamic for Handle {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Object(handle) => Ok(handle.clone()),
            Dynamic::Null => Ok(Handle::empty()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "object",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for Handle {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::from(self)
    }
}

impl<T> IntoDynamic for Ref<T>
where
    T: ?Sized + RefCounted + Upcast<dyn RefCounted>,
{
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(Handle::from_ref(self))
    }
}

impl<T> IntoDynamic for Shared<T>
where
    T: ?Sized + Native + Upcast<dyn Native>,
{
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(Handle::from_shared(self))
    }
}

impl<T: IntoDynamic> IntoDynamic for Option<T> {
    fn into_dynamic(self) -> Dynamic {
        match self {
            Some(value) => value.into_dynamic(),
            None => Dynamic::Null,
        }
    }
}
