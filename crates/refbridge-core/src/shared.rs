//! Externally counted handles.
//!
//! A [`Shared<T>`] owns a heap object that has no count of its own. The count
//! lives in a control block allocated beside the object, and a process-wide
//! owner table maps each object address to its live block. Wrapping a raw
//! pointer consults the table first, so independent wraps of the same object
//! converge on one block instead of creating competing owners.
//!
//! ## Concurrency
//!
//! Lookups and the increment-if-nonzero step run under the table lock. The
//! thread that drops the count to zero removes its own table entry under the
//! same lock before freeing anything, so a block is never reachable from the
//! table after it starts being destroyed. A wrap that races with that window
//! fails with [`HandleError::Expired`].
//!
//! ## Zero-sized objects
//!
//! Every boxed zero-sized value lives at the same dangling address, so the
//! address says nothing about which object it is. [`Shared::new`] still gives
//! such a value its own block, but it never enters the owner table, and
//! wrapping a raw pointer to one fails with [`HandleError::Unidentifiable`].

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering, fence};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::{HandleError, Native, Upcast};

/// Upper bound before an increment is treated as a leak.
const MAX_STRONG: usize = isize::MAX as usize;

/// Ownership record for one externally counted object.
struct ControlBlock {
    strong: AtomicUsize,
    /// Owner-table key; `None` for zero-sized objects, which have no identity.
    key: Option<usize>,
    object: NonNull<dyn Native>,
}

impl ControlBlock {
    fn allocate(object: NonNull<dyn Native>, key: Option<usize>) -> NonNull<ControlBlock> {
        let block = Box::new(ControlBlock {
            strong: AtomicUsize::new(1),
            key,
            object,
        });
        NonNull::from(Box::leak(block))
    }

    fn object(&self) -> &dyn Native {
        // SAFETY: the object outlives its block's last owner.
        unsafe { self.object.as_ref() }
    }

    fn increment(&self) -> usize {
        let previous = self.strong.fetch_add(1, Ordering::Relaxed);
        if previous >= MAX_STRONG {
            log::error!("control block count overflow ({previous}), aborting");
            std::process::abort();
        }
        previous + 1
    }

    /// Add an owner unless the block already reached zero.
    fn try_increment(&self) -> bool {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current >= MAX_STRONG {
                log::error!("control block count overflow ({current}), aborting");
                std::process::abort();
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Drop one owner, destroying the object and block on the last one.
    ///
    /// # Safety
    ///
    /// The caller must own one count on `block`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    unsafe fn release(block: NonNull<ControlBlock>) {
        // SAFETY: the caller's count keeps the block alive.
        let this = unsafe { block.as_ref() };
        let previous = this.strong.fetch_sub(1, Ordering::Release);
        if previous == 0 {
            log::error!("control block count underflow: object released after destruction");
            std::process::abort();
        }
        if previous != 1 {
            log::trace!("release {} (external)", this.object().native_type_name());
            return;
        }
        fence(Ordering::Acquire);

        if let Some(key) = this.key {
            let mut owners = owners();
            if owners.get(&key).is_some_and(|entry| entry.0 == block) {
                owners.remove(&key);
            }
        }

        // SAFETY: the count reached zero on this call and the block is no
        // longer reachable from the owner table.
        let block = unsafe { Box::from_raw(block.as_ptr()) };
        log::trace!("destroy {} (external)", block.object().native_type_name());
        // SAFETY: the object was boxed when the block was created.
        drop(unsafe { Box::from_raw(block.object.as_ptr()) });
    }
}

struct BlockPtr(NonNull<ControlBlock>);

// SAFETY: blocks are only touched through atomics or under the table lock.
unsafe impl Send for BlockPtr {}

lazy_static! {
    static ref OWNERS: Mutex<FxHashMap<usize, BlockPtr>> = Mutex::new(FxHashMap::default());
}

fn owners() -> MutexGuard<'static, FxHashMap<usize, BlockPtr>> {
    // Critical sections never leave the table half-updated.
    OWNERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner-table key for an object, `None` when it is zero-sized.
fn identity_key(object: &dyn Native) -> Option<usize> {
    if std::mem::size_of_val(object) == 0 {
        return None;
    }
    Some((object as *const dyn Native).cast::<()>() as usize)
}

/// Find the live block for `object`, optionally creating one.
///
/// Returns `Ok(None)` only when `create` is false and no block exists.
/// Zero-sized objects are rejected outright.
///
/// # Safety
///
/// `object` must point to a live boxed object.
#[cfg_attr(feature = "profiling", profiling::function)]
unsafe fn acquire(
    object: NonNull<dyn Native>,
    create: bool,
) -> Result<Option<NonNull<ControlBlock>>, HandleError> {
    // SAFETY: caller guarantees the object is live.
    let native = unsafe { object.as_ref() };
    let Some(key) = identity_key(native) else {
        return Err(HandleError::Unidentifiable {
            type_name: native.native_type_name().to_string(),
        });
    };

    let mut owners = owners();
    if let Some(entry) = owners.get(&key) {
        // SAFETY: entries are removed before their block is freed.
        let block = unsafe { entry.0.as_ref() };
        let existing = block.object();
        if existing.native_type_id() != native.native_type_id() {
            return Err(HandleError::TypeMismatch {
                expected: existing.native_type_name().to_string(),
                actual: native.native_type_name().to_string(),
            });
        }
        if !block.try_increment() {
            return Err(HandleError::Expired { address: key });
        }
        log::trace!(
            "wrap {} (external, reused block, count {})",
            native.native_type_name(),
            block.strong.load(Ordering::Relaxed)
        );
        return Ok(Some(entry.0));
    }

    if !create {
        return Ok(None);
    }
    let block = ControlBlock::allocate(object, Some(key));
    owners.insert(key, BlockPtr(block));
    log::trace!("wrap {} (external, new block)", native.native_type_name());
    Ok(Some(block))
}

/// An owning handle to an externally counted object.
///
/// - `Clone` adds an owner to the shared control block.
/// - `Drop` removes one; the last drop destroys the object through its
///   concrete type, so a `Shared<dyn Trait>` runs the concrete `Drop`.
pub struct Shared<T: ?Sized + Native> {
    ptr: NonNull<T>,
    block: NonNull<ControlBlock>,
    _owns: PhantomData<T>,
}

// SAFETY: Native requires Send + Sync and the block count is atomic.
unsafe impl<T: ?Sized + Native> Send for Shared<T> {}
// SAFETY: as above.
unsafe impl<T: ?Sized + Native> Sync for Shared<T> {}

impl<T: Native> Shared<T> {
    /// Move `value` to the heap under a new control block.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        let object: NonNull<dyn Native> = ptr;
        // SAFETY: freshly boxed.
        let native = unsafe { object.as_ref() };
        let key = identity_key(native);
        let block = ControlBlock::allocate(object, key);
        if let Some(key) = key {
            owners().insert(key, BlockPtr(block));
        }
        log::trace!("wrap {} (external, new block)", native.native_type_name());
        Self {
            ptr,
            block,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized + Native> Shared<T> {
    /// Wrap a raw pointer, reusing the object's live control block if one
    /// exists and creating one otherwise.
    ///
    /// # Errors
    ///
    /// - [`HandleError::Null`] if `ptr` is null.
    /// - [`HandleError::Expired`] if the object's last owner is releasing it.
    /// - [`HandleError::Unidentifiable`] if `T` is zero-sized.
    /// - [`HandleError::TypeMismatch`] if a different type is registered at the
    ///   same address.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live object allocated by `Box`, owned
    /// either by nobody or only by `Shared` handles.
    pub unsafe fn from_raw(ptr: *mut T) -> Result<Self, HandleError>
    where
        T: Upcast<dyn Native>,
    {
        let ptr = NonNull::new(ptr).ok_or(HandleError::Null)?;
        let object = erase(ptr);
        // SAFETY: forwarded to the caller.
        let block = unsafe { acquire(object, true) }?.ok_or(HandleError::Null)?;
        Ok(Self {
            ptr,
            block,
            _owns: PhantomData,
        })
    }

    /// Take another owner of an object that is already shared, without
    /// creating a control block.
    ///
    /// Returns `Ok(None)` if no live handle owns the object. Fails like
    /// [`from_raw`](Self::from_raw) otherwise.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live object.
    pub unsafe fn from_existing(ptr: *mut T) -> Result<Option<Self>, HandleError>
    where
        T: Upcast<dyn Native>,
    {
        let ptr = NonNull::new(ptr).ok_or(HandleError::Null)?;
        let object = erase(ptr);
        // SAFETY: forwarded to the caller.
        let block = unsafe { acquire(object, false) }?;
        Ok(block.map(|block| Self {
            ptr,
            block,
            _owns: PhantomData,
        }))
    }

    /// The object address. Does not change the count.
    #[inline]
    pub fn as_ptr(this: &Self) -> *mut T {
        this.ptr.as_ptr()
    }

    /// Current number of owners sharing the control block.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.block().strong.load(Ordering::Acquire)
    }

    /// Whether both handles share one control block.
    #[inline]
    pub fn ptr_eq<U: ?Sized + Native>(this: &Self, other: &Shared<U>) -> bool {
        this.block == other.block
    }

    /// Convert into a handle to a base type, carrying this owner over.
    pub fn upcast<U>(this: Self) -> Shared<U>
    where
        U: ?Sized + Native,
        T: Upcast<U>,
    {
        let this = ManuallyDrop::new(this);
        let ptr = <T as Upcast<U>>::upcast_ptr(this.ptr.as_ptr());
        Shared {
            // SAFETY: upcasting a non-null pointer keeps its address.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
            block: this.block,
            _owns: PhantomData,
        }
    }

    fn block(&self) -> &ControlBlock {
        // SAFETY: we hold a count, so the block is live.
        unsafe { self.block.as_ref() }
    }
}

impl Shared<dyn Native> {
    /// Take an additional owner as `Shared<U>` if the concrete type is `C`.
    pub fn cast_concrete<C, U>(this: &Self) -> Option<Shared<U>>
    where
        C: Native + Upcast<U>,
        U: ?Sized + Native,
    {
        if !(**this).is::<C>() {
            return None;
        }
        let ptr = <C as Upcast<U>>::upcast_ptr(this.ptr.cast::<C>().as_ptr());
        this.block().increment();
        Some(Shared {
            // SAFETY: upcasting a non-null pointer keeps its address.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
            block: this.block,
            _owns: PhantomData,
        })
    }

    /// Take an additional owner of this object, addressed as `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point at this handle's object.
    pub(crate) unsafe fn alias<U: ?Sized + Native>(this: &Self, ptr: NonNull<U>) -> Shared<U> {
        this.block().increment();
        Shared {
            ptr,
            block: this.block,
            _owns: PhantomData,
        }
    }

    /// Convert into a handle to the concrete type `C`.
    pub fn downcast<C: Native>(this: Self) -> Result<Shared<C>, Self> {
        if !(*this).is::<C>() {
            return Err(this);
        }
        let this = ManuallyDrop::new(this);
        Ok(Shared {
            ptr: this.ptr.cast::<C>(),
            block: this.block,
            _owns: PhantomData,
        })
    }
}

fn erase<T: ?Sized + Upcast<dyn Native>>(ptr: NonNull<T>) -> NonNull<dyn Native> {
    let erased = <T as Upcast<dyn Native>>::upcast_ptr(ptr.as_ptr());
    // SAFETY: upcasting a non-null pointer keeps its address.
    unsafe { NonNull::new_unchecked(erased) }
}

impl<T: ?Sized + Native> Clone for Shared<T> {
    fn clone(&self) -> Self {
        let count = self.block().increment();
        log::trace!("copy {} (external, count {count})", self.native_type_name());
        Self {
            ptr: self.ptr,
            block: self.block,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized + Native> Drop for Shared<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one count.
        unsafe { ControlBlock::release(self.block) }
    }
}

impl<T: ?Sized + Native> Deref for Shared<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: we hold a count, so the object is live.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + Native> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("type", &self.native_type_name())
            .field("address", &self.ptr.cast::<()>())
            .field("use_count", &Shared::use_count(self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NativeType, impl_upcast};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    trait Describe: Native {
        fn describe(&self) -> String;
    }

    struct Tracked {
        value: i32,
        drops: Arc<AtomicUsize>,
    }

    impl NativeType for Tracked {
        fn type_name() -> &'static str {
            "Tracked"
        }
    }

    impl Describe for Tracked {
        fn describe(&self) -> String {
            format!("Tracked[{}]", self.value)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl_upcast!(Tracked => dyn Describe, dyn Native);
    impl_upcast!(dyn Describe => dyn Native);

    struct Other;

    impl NativeType for Other {
        fn type_name() -> &'static str {
            "Other"
        }
    }

    impl_upcast!(Other => dyn Native);

    fn tracked(value: i32) -> (Tracked, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (
            Tracked {
                value,
                drops: drops.clone(),
            },
            drops,
        )
    }

    #[test]
    fn second_wrap_reuses_block() {
        let (value, drops) = tracked(2);
        let raw = Box::into_raw(Box::new(value));

        // SAFETY: raw is a live boxed object with no owners.
        let first = unsafe { Shared::from_raw(raw) }.unwrap();
        assert_eq!(Shared::use_count(&first), 1);

        // SAFETY: raw is owned only by `first`.
        let second = unsafe { Shared::from_raw(raw) }.unwrap();
        assert_eq!(Shared::use_count(&first), 2);
        assert!(Shared::ptr_eq(&first, &second));

        drop(first);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(second.value, 2);
        drop(second);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_and_release() {
        let (value, drops) = tracked(4);
        let first = Shared::new(value);
        let copy = first.clone();
        assert_eq!(Shared::use_count(&copy), 2);
        drop(first);
        assert_eq!(Shared::use_count(&copy), 1);
        drop(copy);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_raw_of_new_handle_shares_block() {
        let (value, drops) = tracked(6);
        let owner = Shared::new(value);
        // SAFETY: the object is owned by `owner`.
        let again = unsafe { Shared::from_raw(Shared::as_ptr(&owner)) }.unwrap();
        assert!(Shared::ptr_eq(&owner, &again));
        assert_eq!(Shared::use_count(&owner), 2);
        drop(owner);
        drop(again);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_existing_only_finds_live_blocks() {
        let (value, drops) = tracked(8);
        let raw = Box::into_raw(Box::new(value));
        // SAFETY: raw is live and not yet shared.
        assert!(unsafe { Shared::from_existing(raw) }.unwrap().is_none());

        // SAFETY: raw is live and has no owners.
        let owner = unsafe { Shared::from_raw(raw) }.unwrap();
        // SAFETY: raw is owned by `owner`.
        let found = unsafe { Shared::from_existing(raw) }.unwrap().unwrap();
        assert_eq!(Shared::use_count(&found), 2);
        drop(found);
        drop(owner);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_is_rejected() {
        // SAFETY: null is rejected before any dereference.
        let result = unsafe { Shared::<Tracked>::from_raw(std::ptr::null_mut()) };
        assert_eq!(result.unwrap_err(), HandleError::Null);
    }

    #[test]
    fn base_handle_runs_derived_drop() {
        let (value, drops) = tracked(1);
        let base: Shared<dyn Describe> = Shared::upcast(Shared::new(value));
        assert_eq!(base.describe(), "Tracked[1]");
        let erased: Shared<dyn Native> = Shared::upcast(base.clone());
        assert_eq!(Shared::use_count(&erased), 2);
        drop(base);
        drop(erased);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn erased_casts() {
        let (value, drops) = tracked(3);
        let erased: Shared<dyn Native> = Shared::upcast(Shared::new(value));

        let base = Shared::<dyn Native>::cast_concrete::<Tracked, dyn Describe>(&erased).unwrap();
        assert_eq!(base.describe(), "Tracked[3]");
        assert_eq!(Shared::use_count(&erased), 2);
        assert!(Shared::<dyn Native>::cast_concrete::<Other, dyn Native>(&erased).is_none());
        drop(base);

        let erased = Shared::<dyn Native>::downcast::<Other>(erased).err().unwrap();
        let concrete = Shared::<dyn Native>::downcast::<Tracked>(erased).ok().unwrap();
        assert_eq!(concrete.value, 3);
        drop(concrete);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_sized_values_are_not_tracked() {
        let first = Shared::new(Other);
        let second = Shared::new(Other);
        assert!(!Shared::ptr_eq(&first, &second));
        assert_eq!(Shared::use_count(&first), 1);
        assert!(owners().get(&(Shared::as_ptr(&first) as usize)).is_none());
    }

    static MARKER_DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Marker;

    impl NativeType for Marker {
        fn type_name() -> &'static str {
            "Marker"
        }
    }

    impl Drop for Marker {
        fn drop(&mut self) {
            MARKER_DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl_upcast!(Marker => dyn Native);

    #[test]
    fn zero_sized_raw_pointers_are_rejected() {
        let owner = Shared::new(Marker);
        let raw = Shared::as_ptr(&owner);

        // SAFETY: raw is owned by `owner`.
        let err = unsafe { Shared::from_raw(raw) }.unwrap_err();
        assert_eq!(
            err,
            HandleError::Unidentifiable {
                type_name: "Marker".into()
            }
        );
        // SAFETY: as above.
        let err = unsafe { Shared::from_existing(raw) }.unwrap_err();
        assert!(matches!(err, HandleError::Unidentifiable { .. }));

        let copy = owner.clone();
        drop(owner);
        assert_eq!(MARKER_DROPS.load(Ordering::SeqCst), 0);
        drop(copy);
        assert_eq!(MARKER_DROPS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wrap_during_final_release_is_expired() {
        let (value, drops) = tracked(9);
        let raw = Box::into_raw(Box::new(value));
        let key = raw as usize;

        // The state a releasing thread leaves between its last decrement and
        // unregistering the block.
        let block = ControlBlock::allocate(erase(NonNull::new(raw).unwrap()), Some(key));
        // SAFETY: the block was just allocated.
        unsafe { block.as_ref() }.strong.store(0, Ordering::SeqCst);
        owners().insert(key, BlockPtr(block));

        // SAFETY: raw is live until the block is torn down below.
        let err = unsafe { Shared::from_raw(raw) }.unwrap_err();
        assert_eq!(err, HandleError::Expired { address: key });
        // SAFETY: as above.
        let err = unsafe { Shared::from_existing(raw) }.unwrap_err();
        assert_eq!(err, HandleError::Expired { address: key });
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        owners().remove(&key);
        // SAFETY: the block and object are unreachable and owned by nobody.
        drop(unsafe { Box::from_raw(block.as_ptr()) });
        // SAFETY: as above.
        drop(unsafe { Box::from_raw(raw) });
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_wraps_converge() {
        let (value, drops) = tracked(11);
        let owner = Shared::new(value);
        let raw = Shared::as_ptr(&owner) as usize;
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(move || {
                    for _ in 0..500 {
                        // SAFETY: `owner` keeps the object alive for the scope.
                        let handle = unsafe { Shared::from_raw(raw as *mut Tracked) }.unwrap();
                        let copy = handle.clone();
                        drop(handle);
                        drop(copy);
                    }
                });
            }
        });
        assert_eq!(Shared::use_count(&owner), 1);
        drop(owner);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
