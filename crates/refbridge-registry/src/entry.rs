//! Registered type entries.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use refbridge_core::{
    ConversionError, Dynamic, Handle, HandleError, OwnershipPolicy, PrimitiveKind, TypeHash,
};

bitflags! {
    /// Properties of a registered type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeFlags: u32 {
        /// Trait-object base; never instantiated directly.
        const ABSTRACT = 1 << 0;
        /// Bound to a concrete Rust type that can be constructed and wrapped.
        const CONCRETE = 1 << 1;
        /// Has at least one implicit constructor from a primitive.
        const IMPLICIT = 1 << 2;
    }
}

/// Wraps a raw pointer under the type's ownership policy.
pub type WrapFn = unsafe fn(*mut ()) -> Result<Handle, HandleError>;

/// Builds a new object from a primitive host value.
pub type ConvertFn = dyn Fn(&Dynamic) -> Result<Handle, ConversionError> + Send + Sync;

/// An implicit constructor from one primitive kind.
#[derive(Clone)]
pub struct ImplicitConversion {
    /// The primitive kind accepted.
    pub source: PrimitiveKind,
    convert: Arc<ConvertFn>,
}

impl ImplicitConversion {
    /// Create a conversion.
    pub fn new(source: PrimitiveKind, convert: Arc<ConvertFn>) -> Self {
        Self { source, convert }
    }

    /// Run the constructor.
    pub fn convert(&self, value: &Dynamic) -> Result<Handle, ConversionError> {
        (self.convert)(value)
    }
}

impl fmt::Debug for ImplicitConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplicitConversion")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// One registered type: its name, policy and how to produce handles for it.
#[derive(Clone)]
pub struct TypeEntry {
    name: String,
    hash: TypeHash,
    policy: OwnershipPolicy,
    flags: TypeFlags,
    type_id: Option<TypeId>,
    wrap: Option<WrapFn>,
    conversions: Vec<ImplicitConversion>,
}

impl TypeEntry {
    /// An entry carrying only a policy.
    pub fn new(name: impl Into<String>, policy: OwnershipPolicy) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            policy,
            flags: TypeFlags::empty(),
            type_id: None,
            wrap: None,
            conversions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn policy(&self) -> OwnershipPolicy {
        self.policy
    }

    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Rust `TypeId` the entry is bound to, if any.
    pub fn rust_type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Whether any implicit constructor is registered.
    pub fn is_implicitly_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::IMPLICIT)
    }

    /// Policy-specific raw-pointer wrapper, `None` for abstract or
    /// policy-only entries.
    pub fn wrap_fn(&self) -> Option<WrapFn> {
        self.wrap
    }

    /// The implicit constructor accepting `kind`.
    pub fn conversion_for(&self, kind: PrimitiveKind) -> Option<&ImplicitConversion> {
        self.conversions.iter().find(|c| c.source == kind)
    }

    pub fn conversions(&self) -> &[ImplicitConversion] {
        &self.conversions
    }

    pub(crate) fn bind_concrete(&mut self, type_id: TypeId, wrap: WrapFn) {
        self.type_id = Some(type_id);
        self.wrap = Some(wrap);
        self.flags.insert(TypeFlags::CONCRETE);
    }

    pub(crate) fn bind_abstract(&mut self, type_id: TypeId) {
        self.type_id = Some(type_id);
        self.flags.insert(TypeFlags::ABSTRACT);
    }

    /// Add a conversion, replacing any earlier one for the same kind.
    ///
    /// Returns `true` when an earlier conversion was replaced.
    pub(crate) fn set_conversion(&mut self, conversion: ImplicitConversion) -> bool {
        self.flags.insert(TypeFlags::IMPLICIT);
        match self
            .conversions
            .iter_mut()
            .find(|c| c.source == conversion.source)
        {
            Some(existing) => {
                *existing = conversion;
                true
            }
            None => {
                self.conversions.push(conversion);
                false
            }
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("policy", &self.policy)
            .field("flags", &self.flags)
            .field("conversions", &self.conversions)
            .finish()
    }
}
