//! The container behind every `#[safe_global]` static.
use std::{
    cell::UnsafeCell,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// The one lock shared by every [`SafeGlobal`] in the process.
static LOCK: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    // Critical sections never leave a value half-written, so a poisoned lock
    // carries no information.
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A value that can be read and written from any thread.
///
/// All reads and writes, across all `SafeGlobal`s, are serialized through one
/// process-wide lock. Two globals holding unrelated values may therefore
/// block each other.
///
/// # Reentrancy
///
/// The lock is held while a value is cloned by [`SafeGlobal::get`]. A `Clone`
/// impl that touches another `SafeGlobal` will deadlock. Old values are
/// dropped after the lock is released, so `Drop` impls are free to touch
/// other globals.
///
/// ```
/// use safe_global::SafeGlobal;
///
/// static LEVEL: SafeGlobal<u8> = SafeGlobal::new(3);
///
/// LEVEL.set(LEVEL.get() + 1);
/// assert_eq!(4, LEVEL.get());
/// ```
pub struct SafeGlobal<T> {
    value: UnsafeCell<T>,
}

// SAFETY: `value` is only ever accessed while holding `LOCK`, which gives the
// same guarantees as `Mutex<T>`.
unsafe impl<T: Send> Sync for SafeGlobal<T> {}

impl<T> SafeGlobal<T> {
    pub const fn new(initial: T) -> Self {
        SafeGlobal {
            value: UnsafeCell::new(initial),
        }
    }

    fn locked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = lock();
        // SAFETY: the lock is held for as long as the reference lives.
        f(unsafe { &mut *self.value.get() })
    }

    /// Returns a copy of the value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.locked(|value| value.clone())
    }

    /// Replaces the value.
    pub fn set(&self, value: T) {
        drop(self.replace(value));
    }

    /// Replaces the value, returning the old one.
    pub fn replace(&self, value: T) -> T {
        self.locked(|current| std::mem::replace(current, value))
    }

    /// Takes the value, leaving `T::default()` in its place.
    pub fn take(&self) -> T
    where
        T: Default,
    {
        self.replace(T::default())
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> SafeGlobal<Option<T>> {
    /// A global that starts out as `None`.
    pub const fn empty() -> Self {
        SafeGlobal::new(None)
    }
}

impl<T: Default> Default for SafeGlobal<T> {
    fn default() -> Self {
        SafeGlobal::new(T::default())
    }
}

impl<T> From<T> for SafeGlobal<T> {
    fn from(value: T) -> Self {
        SafeGlobal::new(value)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for SafeGlobal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SafeGlobal").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_after_new() {
        let global = SafeGlobal::new(42);
        assert_eq!(42, global.get());
        let global = SafeGlobal::new(String::from("hello"));
        assert_eq!("hello", global.get());
    }

    #[test]
    fn write_then_read() {
        let global = SafeGlobal::new(0u32);
        global.set(666);
        assert_eq!(666, global.get());
        assert_eq!(666, global.replace(1337));
        assert_eq!(1337, global.get());
    }

    #[test]
    fn empty_is_none() {
        let global: SafeGlobal<Option<u32>> = SafeGlobal::empty();
        assert_eq!(None, global.get());
        global.set(Some(3));
        assert_eq!(Some(3), global.take());
        assert_eq!(None, global.get());
    }

    #[test]
    fn default_debug_and_into_inner() {
        let mut global: SafeGlobal<Vec<u8>> = SafeGlobal::default();
        global.get_mut().push(1);
        assert_eq!("SafeGlobal([1])", format!("{global:?}"));
        assert_eq!(vec![1], global.into_inner());
    }

    #[test]
    fn writes_are_never_torn() {
        let global = SafeGlobal::new((0u64, 0u64));
        rayon::scope(|s| {
            for i in 0..8u64 {
                let global = &global;
                s.spawn(move |_| {
                    for j in 0..1000u64 {
                        let n = i * 1000 + j;
                        global.set((n, n));
                    }
                });
                s.spawn(move |_| {
                    for _ in 0..1000 {
                        let (a, b) = global.get();
                        assert_eq!(a, b);
                    }
                });
            }
        });
        let (a, b) = global.get();
        assert_eq!(a, b);
        assert!(a < 8000);
    }

    #[test]
    fn distinct_globals_share_the_lock_without_interfering() {
        let left = SafeGlobal::new(0usize);
        let right = SafeGlobal::new(String::new());
        rayon::scope(|s| {
            s.spawn(|_| {
                for i in 0..500 {
                    left.set(i);
                }
            });
            s.spawn(|_| {
                for i in 0..500 {
                    right.set(i.to_string());
                }
            });
        });
        assert_eq!(499, left.get());
        assert_eq!("499", right.get());
    }

    static SEEN_ON_DROP: SafeGlobal<u32> = SafeGlobal::new(0);

    struct ReadsAnotherGlobalOnDrop(u32);

    impl Drop for ReadsAnotherGlobalOnDrop {
        fn drop(&mut self) {
            SEEN_ON_DROP.set(self.0);
        }
    }

    #[test]
    fn old_values_drop_outside_the_lock() {
        let global = SafeGlobal::new(ReadsAnotherGlobalOnDrop(1));
        // Would deadlock if the old value were dropped while locked.
        global.set(ReadsAnotherGlobalOnDrop(2));
        assert_eq!(1, SEEN_ON_DROP.get());
    }
}
