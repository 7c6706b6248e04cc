//! Ownership policies.

use std::fmt;

/// How a native type's lifetime is tracked once it crosses into the host.
///
/// Every registered type has exactly one policy. Derived types share their
/// base's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipPolicy {
    /// The object embeds its own reference count ([`RefCounted`](crate::RefCounted)).
    /// Handles are [`Ref<T>`](crate::Ref).
    Intrusive,

    /// The object carries no count; a control block keyed by the object's
    /// address tracks ownership. Handles are [`Shared<T>`](crate::Shared).
    External,
}

impl OwnershipPolicy {
    /// Lowercase name, used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            OwnershipPolicy::Intrusive => "intrusive",
            OwnershipPolicy::External => "external",
        }
    }

    /// Whether the count lives inside the object itself.
    pub const fn counts_inline(self) -> bool {
        matches!(self, OwnershipPolicy::Intrusive)
    }
}

impl fmt::Display for OwnershipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(OwnershipPolicy::Intrusive.to_string(), "intrusive");
        assert_eq!(OwnershipPolicy::External.to_string(), "external");
    }

    #[test]
    fn inline_counting() {
        assert!(OwnershipPolicy::Intrusive.counts_inline());
        assert!(!OwnershipPolicy::External.counts_inline());
    }
}
