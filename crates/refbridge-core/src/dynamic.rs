//! Host value type.

use std::fmt;

use crate::{Handle, PrimitiveKind};

/// A value as the host runtime stores it in a slot.
///
/// `Object` slots own a [`Handle`], so cloning a `Dynamic` is a host copy (one
/// more owner) and dropping it is a host release.
#[derive(Clone, Default)]
pub enum Dynamic {
    /// Void/empty
    #[default]
    Void,
    /// Integer value (all integer widths stored as i64)
    Int(i64),
    /// Floating point value (f32, f64 both stored as f64)
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value (owned)
    String(String),
    /// Reference to a native object
    Object(Handle),
    /// Null handle
    Null,
}

impl Dynamic {
    /// Get a human-readable name for this slot's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "void",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::Bool(_) => "bool",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
            Dynamic::Null => "null",
        }
    }

    /// Check if this slot is void.
    pub fn is_void(&self) -> bool {
        matches!(self, Dynamic::Void)
    }

    /// Check if this slot is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    /// The primitive kind of this slot, if it holds a primitive.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Dynamic::Int(_) => Some(PrimitiveKind::Int),
            Dynamic::Float(_) => Some(PrimitiveKind::Float),
            Dynamic::Bool(_) => Some(PrimitiveKind::Bool),
            Dynamic::String(_) => Some(PrimitiveKind::String),
            Dynamic::Void | Dynamic::Object(_) | Dynamic::Null => None,
        }
    }

    /// Borrow the handle in an `Object` slot.
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Dynamic::Object(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<Handle> for Dynamic {
    fn from(handle: Handle) -> Self {
        if handle.is_empty() {
            Dynamic::Null
        } else {
            Dynamic::Object(handle)
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Void => write!(f, "Void"),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::String(s) => write!(f, "String({:?})", s),
            Dynamic::Object(h) => write!(f, "Object({:?})", h),
            Dynamic::Null => write!(f, "Null"),
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Void, Dynamic::Void) => true,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Float(a), Dynamic::Float(b)) => a == b,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            // Objects compare by identity
            (Dynamic::Object(a), Dynamic::Object(b)) => a.ptr_eq(b),
            (Dynamic::Null, Dynamic::Null) => true,
            _ => false,
        }
    }
}
