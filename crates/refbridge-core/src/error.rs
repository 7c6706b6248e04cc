//! Error types for the ownership bridge.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (top-level wrapper)
//! ├── RegistrationError - policy/type/function registration errors
//! ├── HandleError       - invalid, empty or mistyped handles
//! ├── ConversionError   - primitive <-> native value conversion errors
//! └── NativeError       - errors raised while marshaling a native call
//! ```
//!
//! Each phase-specific error can be used directly, or converted into
//! [`BridgeError`] with `?`.

use thiserror::Error;

use crate::OwnershipPolicy;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while registering types, policies and functions.
///
/// All of these are configuration errors: they are reported during the
/// one-time setup phase and the setup must not proceed past them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The type already has a different ownership policy.
    #[error("type '{type_name}' is registered as {existing}, cannot re-register as {requested}")]
    PolicyConflict {
        /// The type name.
        type_name: String,
        /// The policy already on record.
        existing: OwnershipPolicy,
        /// The policy that was requested.
        requested: OwnershipPolicy,
    },

    /// A derived type and its base use different ownership policies.
    #[error("type '{derived}' ({derived_policy}) cannot derive from '{base}' ({base_policy})")]
    PolicyMismatch {
        /// The derived type name.
        derived: String,
        /// The derived type's policy.
        derived_policy: OwnershipPolicy,
        /// The base type name.
        base: String,
        /// The base type's policy.
        base_policy: OwnershipPolicy,
    },

    /// A referenced type was never registered.
    #[error("type not registered: {0}")]
    UnknownType(String),

    /// The name is already bound to a different Rust type.
    #[error("type '{0}' is already registered for a different Rust type")]
    DuplicateType(String),

    /// The type is an abstract base and has no concrete representation.
    #[error("type '{0}' is abstract")]
    Abstract(String),

    /// A base type was referenced before it was registered.
    #[error("base type of '{derived}' is not registered: {base}")]
    UnknownBase {
        /// The derived type name.
        derived: String,
        /// The missing base (Rust type name).
        base: String,
    },

    /// Adding an inheritance edge would create a cycle.
    #[error("inheritance cycle: '{derived}' cannot derive from '{base}'")]
    CyclicInheritance {
        /// The derived type name.
        derived: String,
        /// The base type name.
        base: String,
    },

    /// A function with this name already exists.
    #[error("duplicate function: {0}")]
    DuplicateFunction(String),

    /// The registry was sealed; no further registrations are accepted.
    #[error("registry is sealed, cannot register '{0}'")]
    Sealed(String),
}

// ============================================================================
// Handle Errors
// ============================================================================

/// Errors raised when a handle cannot produce the requested object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The handle was never bound to an object.
    #[error("handle is empty")]
    Empty,

    /// A null pointer was offered for wrapping.
    #[error("cannot wrap a null pointer")]
    Null,

    /// The object behind this address is already being destroyed.
    #[error("object at {address:#x} has no remaining owners")]
    Expired {
        /// The object address.
        address: usize,
    },

    /// A zero-sized object has no address of its own to share a count by.
    #[error("cannot share {type_name} by address: it is zero-sized")]
    Unidentifiable {
        /// The object's dynamic type.
        type_name: String,
    },

    /// The object is not of (or derived from) the requested type.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The requested type.
        expected: String,
        /// The object's dynamic type.
        actual: String,
    },

    /// The handle uses a different ownership policy than requested.
    #[error("handle is {actual}, expected {expected}")]
    WrongPolicy {
        /// The policy the caller asked for.
        expected: OwnershipPolicy,
        /// The policy the handle actually carries.
        actual: OwnershipPolicy,
    },
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors raised while converting host values into native values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has the wrong kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected kind.
        expected: &'static str,
        /// The actual kind.
        actual: &'static str,
    },

    /// An integer does not fit the target type.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        /// The offending value.
        value: i64,
        /// The target Rust type.
        target_type: &'static str,
    },

    /// A float is out of range for the target type.
    #[error("float conversion: {value} cannot be represented as {target_type}")]
    FloatConversion {
        /// The offending value.
        value: f64,
        /// The target Rust type.
        target_type: &'static str,
    },

    /// The target type has no implicit constructor for this kind of value.
    #[error("'{target}' is not implicitly constructible from {source_kind}")]
    NotImplicitlyConstructible {
        /// The target type name.
        target: String,
        /// The source value kind.
        source_kind: &'static str,
    },

    /// The implicit constructor refused the input.
    #[error("cannot construct '{target}': {reason}")]
    Rejected {
        /// The target type name.
        target: String,
        /// Why the constructor refused.
        reason: String,
    },

    /// The handle could not be produced or viewed.
    #[error(transparent)]
    Handle(#[from] HandleError),
}

// ============================================================================
// Native Call Errors
// ============================================================================

/// Errors raised by the marshaling layer during a native call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// An argument index was out of range.
    #[error("argument {index} out of bounds (call has {count} arguments)")]
    ArgumentIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of arguments.
        count: usize,
    },

    /// An argument could not be converted.
    #[error("argument conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// A handle argument was unusable.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// No function was registered under this name.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// No type was registered under this name.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// No constructor was registered for this type.
    #[error("type '{0}' has no constructor")]
    NoConstructor(String),

    /// A generic native error.
    #[error("{message}")]
    Other {
        /// The error message.
        message: String,
    },
}

impl NativeError {
    /// Create a generic error from a message.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error produced by the bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A handle error.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// A conversion error.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A native call error.
    #[error(transparent)]
    Native(#[from] NativeError),
}

impl BridgeError {
    /// Check if this is a registration error.
    pub fn is_registration(&self) -> bool {
        matches!(self, BridgeError::Registration(_))
    }

    /// Check if this is a handle error.
    pub fn is_handle(&self) -> bool {
        matches!(self, BridgeError::Handle(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_conflict_display() {
        let err = RegistrationError::PolicyConflict {
            type_name: "MyObject".into(),
            existing: OwnershipPolicy::Intrusive,
            requested: OwnershipPolicy::External,
        };
        assert_eq!(
            err.to_string(),
            "type 'MyObject' is registered as intrusive, cannot re-register as external"
        );
    }

    #[test]
    fn expired_display_uses_hex_address() {
        let err = HandleError::Expired { address: 0x1000 };
        assert_eq!(err.to_string(), "object at 0x1000 has no remaining owners");
    }

    #[test]
    fn not_implicitly_constructible_display() {
        let err = ConversionError::NotImplicitlyConstructible {
            target: "MyObject2".into(),
            source_kind: "int",
        };
        assert_eq!(
            err.to_string(),
            "'MyObject2' is not implicitly constructible from int"
        );
    }

    #[test]
    fn native_error_wraps_handle_error() {
        let err: NativeError = HandleError::Empty.into();
        assert_eq!(err.to_string(), "handle is empty");
    }

    #[test]
    fn bridge_error_classification() {
        let err: BridgeError = RegistrationError::Sealed("MyObject".into()).into();
        assert!(err.is_registration());
        assert!(!err.is_handle());

        let err: BridgeError = HandleError::Null.into();
        assert!(err.is_handle());
    }
}
