//! Embedded reference counter for intrusively counted objects.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Upper bound before an increment is treated as a leak.
const MAX_REFCOUNT: u32 = i32::MAX as u32;

/// An atomic reference count embedded in a native object.
///
/// Starts at zero: the object is not owned by anyone until the first
/// [`Ref`](crate::Ref) is created for it. Only `Ref` touches the counter, so
/// the transition to zero is observed exactly once.
///
/// Cloning the owning object clones this as a fresh zero counter; a copy is a
/// new identity with no owners yet.
pub struct RefCount {
    count: AtomicU32,
}

impl RefCount {
    /// Create a counter with no owners.
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Current number of owners.
    #[inline]
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Add an owner, returning the new count.
    #[inline]
    pub(crate) fn increment(&self) -> u32 {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        if previous >= MAX_REFCOUNT {
            log::error!("reference count overflow ({previous}), aborting");
            std::process::abort();
        }
        previous + 1
    }

    /// Drop an owner. Returns `true` when this call released the last one.
    ///
    /// The `true` result is only ever produced once per object; the caller that
    /// receives it owns destruction.
    #[inline]
    pub(crate) fn decrement(&self) -> bool {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        if previous == 0 {
            log::error!("reference count underflow: object released after destruction");
            std::process::abort();
        }
        if previous != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RefCount {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unowned() {
        assert_eq!(RefCount::new().get(), 0);
        assert_eq!(RefCount::default().get(), 0);
    }

    #[test]
    fn increment_and_decrement() {
        let count = RefCount::new();
        assert_eq!(count.increment(), 1);
        assert_eq!(count.increment(), 2);
        assert!(!count.decrement());
        assert_eq!(count.get(), 1);
        assert!(count.decrement());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn clone_resets() {
        let count = RefCount::new();
        count.increment();
        count.increment();
        assert_eq!(count.clone().get(), 0);
    }

    #[test]
    fn debug_shows_count() {
        let count = RefCount::new();
        count.increment();
        assert_eq!(format!("{count:?}"), "RefCount(1)");
    }
}
