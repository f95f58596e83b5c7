//! Lock-guarded global values.
//!
//! Annotate a `static` with [`safe_global`] to make it readable and, for a
//! `static mut`, writable from any thread without `unsafe`:
//!
//! ```rust
//! use safe_global::safe_global;
//!
//! #[safe_global]
//! static mut RETRIES: u32 = 3;
//!
//! #[safe_global]
//! static GREETING: &str = "hello";
//!
//! RETRIES.set(RETRIES.get() - 1);
//! assert_eq!(2, RETRIES.get());
//! assert_eq!("hello", GREETING.get());
//! ```
//!
//! The value itself lives in a private [`SafeGlobal`] named `_RETRIES`.
//! `SafeGlobal` can also be used directly when a macro is not wanted.
pub use safe_global_macros::safe_global;

mod global;
pub use global::SafeGlobal;

#[cfg(test)]
mod test {
    use crate::safe_global;

    #[safe_global(crate_path = crate)]
    static mut DUMMY: i32 = 42;

    #[safe_global(crate_path = crate)]
    static ANSWER: u32 = 42;

    #[safe_global(crate_path = crate)]
    static mut MAYBE: Option<u32>;

    #[safe_global(crate_path = crate)]
    static mut NONE_YET: Option<&'static str> = None;

    #[safe_global(crate_path = crate)]
    /// Written from several threads at once.
    static mut PAIR: (u64, u64) = (0, 0);

    #[safe_global(crate_path = crate)]
    pub(crate) static mut NAME: String = String::new();

    #[test]
    fn read_after_init() {
        assert_eq!(42, ANSWER.get());
        assert_eq!(42, _ANSWER.get());
    }

    #[test]
    fn read_write() {
        assert_eq!(42, DUMMY.get());
        DUMMY.set(7);
        assert_eq!(7, DUMMY.get());
        assert_eq!(7, _DUMMY.get());
    }

    #[test]
    fn optional_without_initializer_starts_empty() {
        assert_eq!(None, MAYBE.get());
        MAYBE.set(Some(5));
        assert_eq!(Some(5), MAYBE.get());
        assert_eq!(None, NONE_YET.get());
    }

    #[test]
    fn accessor_is_a_copyable_handle() {
        let handle = NAME;
        handle.set("safe".to_string());
        assert_eq!("safe", NAME.get());
        assert_eq!("NAME", format!("{handle:?}"));
    }

    #[test]
    fn concurrent_writes_through_the_accessor() {
        rayon::scope(|s| {
            for i in 1..=8u64 {
                s.spawn(move |_| {
                    for _ in 0..200 {
                        PAIR.set((i, i));
                        let (a, b) = PAIR.get();
                        assert_eq!(a, b);
                    }
                });
            }
        });
        let (a, b) = PAIR.get();
        assert_eq!(a, b);
        assert!((1..=8).contains(&a));
    }
}
