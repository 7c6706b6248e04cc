//! Primitive host value kinds.

use std::fmt;

use crate::{ConversionError, Dynamic, FromDynamic};

/// Kinds of primitive host values an implicit constructor can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int,
    Float,
    Bool,
    String,
}

impl PrimitiveKind {
    /// Get the name of this primitive kind.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::String => "string",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A Rust type an implicit constructor can take as its single argument.
pub trait Primitive: FromDynamic + Send + Sync + 'static {
    /// The host value kind this type is extracted from.
    const KIND: PrimitiveKind;

    /// Extract from a host value of kind [`KIND`](Primitive::KIND).
    fn from_primitive(value: &Dynamic) -> Result<Self, ConversionError> {
        Self::from_dynamic(value)
    }
}

macro_rules! impl_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;
            }
        )*
    };
}

impl_primitive!(
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    u64 => Int,
    f32 => Float,
    f64 => Float,
    bool => Bool,
    String => String,
);
