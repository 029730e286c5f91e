//! # Memoizing Wrapper
//!
//! [`Memo`] owns one cache table, a depth counter and a lifecycle policy, and wraps one
//! callable. The callable receives the wrapper as its first argument, so recursive calls
//! go back through the cache:
//!
//! ```
//! use std::convert::Infallible;
//! use memoizo_core::{Memo, MemoOptions, MemoRegistry};
//!
//! fn fib(memo: &Memo<u64, u64, Infallible>, n: u64) -> Result<u64, Infallible> {
//!     if n < 2 {
//!         return Ok(n);
//!     }
//!     Ok(memo.call(n - 2)? + memo.call(n - 1)?)
//! }
//!
//! let registry = MemoRegistry::new();
//! let fib = Memo::new(&registry, fib, MemoOptions::default()).unwrap();
//!
//! assert_eq!(fib.call(90), Ok(2_880_067_194_370_816_120));
//! assert_eq!(fib.len(), 91);
//! assert!(registry.contains("fib"));
//! ```
//!
//! ## Lifecycle
//!
//! Every call increments the depth counter on entry and decrements it on exit, through a
//! scope guard, so normal returns, `Err` returns and panics all restore it. With
//! auto-clear enabled, the exit that brings the counter back to zero empties the table:
//! the table lives exactly as long as one top-level call tree.
//!
//! ## Failures
//!
//! `Err` results pass through untouched and are never stored. When no key can be
//! derived for a call, the callable runs uncached and the call still succeeds.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::deriver::{derive_key, Derivation};
use crate::events::{ClearReason, EventSink, MemoEvent};
use crate::keys::{Arguments, CacheKey};
use crate::options::MemoOptions;
use crate::registry::{MemoRegistry, Memoized};
use crate::utils::callable_name;
use crate::MemoError;

#[cfg(feature = "stats")]
use crate::CacheStats;

type Callable<A, R, E> = dyn Fn(&Memo<A, R, E>, A) -> Result<R, E> + Send + Sync;

/// A callable wrapped with a result cache keyed by its arguments.
///
/// # Type Parameters
///
/// * `A` - The argument set, see [`Arguments`]
/// * `R` - The result type; cloned out of the table on every hit
/// * `E` - The callable's error type, passed through unchanged
pub struct Memo<A, R, E> {
    name: String,
    auto_clear: bool,
    func: Box<Callable<A, R, E>>,
    table: Mutex<HashMap<CacheKey, R>>,
    depth: AtomicUsize,
    sink: Arc<dyn EventSink>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<A, R, E> Memo<A, R, E>
where
    A: Arguments + 'static,
    R: Clone + Send + 'static,
    E: 'static,
{
    /// Wraps `func` and registers the wrapper in `registry`.
    ///
    /// The slot name is the explicit name from `options`, or the callable's own name.
    ///
    /// # Errors
    ///
    /// [`MemoError::DuplicateRegistration`] if the slot name is taken. The wrapper that
    /// already owns it is left untouched.
    pub fn new<F>(
        registry: &MemoRegistry,
        func: F,
        options: MemoOptions,
    ) -> Result<Arc<Self>, MemoError>
    where
        F: Fn(&Memo<A, R, E>, A) -> Result<R, E> + Send + Sync + 'static,
    {
        let name = match options.explicit_name() {
            Some(name) => name.to_owned(),
            None => callable_name::<F>(),
        };

        let memo = Arc::new(Self {
            auto_clear: options.is_auto_clear(),
            sink: options.resolve_sink(),
            func: Box::new(func),
            table: Mutex::new(HashMap::new()),
            depth: AtomicUsize::new(0),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
            name,
        });

        registry.register(&memo.name, memo.clone())?;
        info!(memo = %memo.name, auto_clear = memo.auto_clear, "memo registered");
        Ok(memo)
    }

    /// Calls the wrapped function through the cache.
    pub fn call(&self, args: A) -> Result<R, E> {
        let _depth = DepthGuard::enter(self);

        let key = match derive_key(&args) {
            Derivation::Direct(key) => key,
            Derivation::Fallback(key) => {
                #[cfg(feature = "stats")]
                self.stats.record_fallback();
                self.sink
                    .emit(&MemoEvent::KeyFallbackUsed { name: &self.name });
                key
            }
            Derivation::Failed(err) => {
                #[cfg(feature = "stats")]
                self.stats.record_uncached();
                self.sink.emit(&MemoEvent::KeyDerivationFailed {
                    name: &self.name,
                    reason: &err.reason,
                });
                return (self.func)(self, args);
            }
        };

        let cached = self.table.lock().get(&key).cloned();
        if let Some(value) = cached {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            self.sink.emit(&MemoEvent::CacheHit {
                name: &self.name,
                key: &key,
            });
            return Ok(value);
        }

        #[cfg(feature = "stats")]
        self.stats.record_miss();
        self.sink.emit(&MemoEvent::CacheMiss {
            name: &self.name,
            key: &key,
        });

        let value = (self.func)(self, args)?;
        self.table.lock().insert(key, value.clone());
        Ok(value)
    }

    /// Calls the wrapped function directly, without reading or writing the cache.
    ///
    /// The call still counts towards the depth, so recursive calls made from inside it
    /// belong to the same call tree.
    pub fn call_uncached(&self, args: A) -> Result<R, E> {
        let _depth = DepthGuard::enter(self);
        (self.func)(self, args)
    }

    /// Returns `true` if a result is stored for these arguments.
    pub fn contains(&self, args: &A) -> bool {
        match derive_key(args).into_key() {
            Ok(key) => self.table.lock().contains_key(&key),
            Err(_) => false,
        }
    }
}

impl<A, R, E> Memo<A, R, E> {
    /// Registry slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_auto_clear(&self) -> bool {
        self.auto_clear
    }

    /// Number of calls of this wrapper currently on the stack, across all threads.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the table regardless of the depth counter. Returns the number of
    /// entries removed.
    pub fn clear(&self) -> usize {
        self.clear_with(ClearReason::Explicit)
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn clear_with(&self, reason: ClearReason) -> usize {
        // Take the entries out first so results are dropped outside the lock.
        let removed = std::mem::take(&mut *self.table.lock());
        let entries = removed.len();
        drop(removed);

        #[cfg(feature = "stats")]
        self.stats.record_clear();
        self.sink.emit(&MemoEvent::CacheCleared {
            name: &self.name,
            reason,
            entries,
        });
        entries
    }
}

impl<A, R, E> Memoized for Memo<A, R, E>
where
    R: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&self) -> usize {
        self.clear_with(ClearReason::Explicit)
    }

    fn len(&self) -> usize {
        self.table.lock().len()
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    fn is_auto_clear(&self) -> bool {
        self.auto_clear
    }

    #[cfg(feature = "stats")]
    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<A, R, E> fmt::Debug for Memo<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("name", &self.name)
            .field("auto_clear", &self.auto_clear)
            .field("depth", &self.depth())
            .field("len", &self.len())
            .finish()
    }
}

/// One level of call depth, released on every exit path.
struct DepthGuard<'a, A, R, E> {
    memo: &'a Memo<A, R, E>,
}

impl<'a, A, R, E> DepthGuard<'a, A, R, E> {
    fn enter(memo: &'a Memo<A, R, E>) -> Self {
        memo.depth.fetch_add(1, Ordering::SeqCst);
        Self { memo }
    }
}

impl<A, R, E> Drop for DepthGuard<'_, A, R, E> {
    fn drop(&mut self) {
        let previous = self.memo.depth.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.memo.auto_clear {
            self.memo.clear_with(ClearReason::Auto);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, RecordingSink};
    use crate::keys::Call;
    use std::convert::Infallible;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;

    type Fib = Memo<u64, u64, Infallible>;

    #[derive(Clone)]
    struct Socket(i32);

    impl serde::Serialize for Socket {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom(format!("fd {} is not serializable", self.0)))
        }
    }

    impl crate::KeyArg for Socket {}

    fn counted_fib(
        registry: &MemoRegistry,
        options: MemoOptions,
    ) -> (Arc<Fib>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memo = Memo::new(
            registry,
            move |memo: &Fib, n: u64| -> Result<u64, Infallible> {
                counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    return Ok(n);
                }
                Ok(memo.call(n - 2)? + memo.call(n - 1)?)
            },
            options.name("fib"),
        )
        .unwrap();
        (memo, calls)
    }

    #[test]
    fn test_persistent_fib_computes_each_n_once() {
        let registry = MemoRegistry::new();
        let (fib, calls) = counted_fib(&registry, MemoOptions::persistent());

        assert_eq!(fib.call(30), Ok(832_040));
        assert_eq!(calls.load(Ordering::SeqCst), 31);
        assert_eq!(fib.len(), 31);
        assert_eq!(fib.depth(), 0);

        // Second top-level call is a single hit.
        assert_eq!(fib.call(30), Ok(832_040));
        assert_eq!(calls.load(Ordering::SeqCst), 31);
    }

    #[test]
    fn test_auto_clear_recomputes_every_top_level_call() {
        let registry = MemoRegistry::new();
        let (fib, calls) = counted_fib(&registry, MemoOptions::clean());

        assert_eq!(fib.call(10), Ok(55));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(fib.is_empty());

        assert_eq!(fib.call(10), Ok(55));
        assert_eq!(calls.load(Ordering::SeqCst), 22);
        assert!(fib.is_empty());
    }

    #[test]
    fn test_auto_clear_table_is_populated_mid_recursion() {
        let registry = MemoRegistry::new();
        let peak = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&peak);
        let fib = Memo::new(
            &registry,
            move |memo: &Fib, n: u64| -> Result<u64, Infallible> {
                seen.fetch_max(memo.len(), Ordering::SeqCst);
                if n < 2 {
                    return Ok(n);
                }
                Ok(memo.call(n - 2)? + memo.call(n - 1)?)
            },
            MemoOptions::clean().name("fib"),
        )
        .unwrap();

        assert_eq!(fib.call(12), Ok(144));
        assert!(peak.load(Ordering::SeqCst) > 0);
        assert_eq!(fib.len(), 0);
    }

    #[test]
    fn test_failure_restores_depth_and_stores_nothing_for_failed_keys() {
        let registry = MemoRegistry::new();
        let fact = Memo::new(
            &registry,
            |memo: &Memo<u64, u64, String>, n: u64| -> Result<u64, String> {
                if n == 3 {
                    return Err(format!("refusing {n}"));
                }
                if n == 0 {
                    return Ok(1);
                }
                Ok(n * memo.call(n - 1)?)
            },
            MemoOptions::persistent().name("fact"),
        )
        .unwrap();

        assert_eq!(fact.call(6), Err("refusing 3".to_string()));
        assert_eq!(fact.depth(), 0);
        assert!(fact.is_empty());

        assert_eq!(fact.call(2), Ok(2));
        assert_eq!(fact.len(), 3);
        assert!(!fact.contains(&3));
    }

    #[test]
    fn test_failure_still_auto_clears() {
        let registry = MemoRegistry::new();
        let memo = Memo::new(
            &registry,
            |memo: &Memo<u64, u64, String>, n: u64| -> Result<u64, String> {
                match n {
                    0 => Err("bottom".to_string()),
                    1 => Ok(1),
                    _ => Ok(memo.call(n - 2)? + memo.call(n - 1)?),
                }
            },
            MemoOptions::clean().name("shaky"),
        )
        .unwrap();

        // n = 3 evaluates n = 1 first, which succeeds and is stored, then fails on 0.
        assert_eq!(memo.call(3), Err("bottom".to_string()));
        assert_eq!(memo.depth(), 0);
        assert!(memo.is_empty());
    }

    #[test]
    fn test_panic_restores_depth() {
        let registry = MemoRegistry::new();
        let memo = Memo::new(
            &registry,
            |memo: &Memo<u64, u64, Infallible>, n: u64| -> Result<u64, Infallible> {
                if n == 0 {
                    panic!("boom");
                }
                memo.call(n - 1)
            },
            MemoOptions::clean().name("panicky"),
        )
        .unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| memo.call(4)));
        assert!(result.is_err());
        assert_eq!(memo.depth(), 0);
        assert!(memo.is_empty());
    }

    #[test]
    fn test_fallback_key_hits_for_equal_containers() {
        let registry = MemoRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sum = Memo::new(
            &registry,
            move |_: &Memo<Vec<i64>, i64, Infallible>, xs: Vec<i64>| -> Result<i64, Infallible> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(xs.iter().sum())
            },
            MemoOptions::default().name("sum"),
        )
        .unwrap();

        assert_eq!(sum.call(vec![1, 2, 3]), Ok(6));
        assert_eq!(sum.call((1..=3).collect()), Ok(6));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        #[cfg(feature = "stats")]
        {
            assert_eq!(sum.stats().fallbacks(), 2);
            assert_eq!(sum.stats().hits(), 1);
        }
    }

    #[test]
    fn test_underivable_key_runs_uncached_every_time() {
        let registry = MemoRegistry::new();
        let sink = Arc::new(RecordingSink::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        type Arg = Vec<Socket>;
        let memo = Memo::new(
            &registry,
            move |_: &Memo<Arg, usize, Infallible>, sockets: Arg| -> Result<usize, Infallible> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(sockets.len())
            },
            MemoOptions::default().name("sockets").sink(sink.clone()),
        )
        .unwrap();

        let sockets = vec![Socket(3)];
        assert_eq!(memo.call(sockets.clone()), Ok(1));
        assert_eq!(memo.call(sockets), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(memo.is_empty());
        assert_eq!(memo.depth(), 0);
        assert_eq!(sink.count(EventKind::KeyDerivationFailed), 2);
        assert_eq!(sink.count(EventKind::CacheMiss), 0);
    }

    #[test]
    fn test_keyword_arguments() {
        let registry = MemoRegistry::new();
        type Fib2 = Memo<Call<u64>, u64, Infallible>;
        let fib2 = Memo::new(
            &registry,
            |memo: &Fib2, call: Call<u64>| -> Result<u64, Infallible> {
                let n = (call.args + call.kw_or("addn", 0u64)) * call.kw_or("multn", 1u64);
                if n < 2 {
                    return Ok(n);
                }
                Ok(memo.call(Call::new(n - 2))? + memo.call(Call::new(n - 1))?)
            },
            MemoOptions::clean().name("fibonacci2"),
        )
        .unwrap();

        assert_eq!(fib2.call(Call::new(10).kw("multn", 3u64)), Ok(832_040));
        assert_eq!(fib2.call(Call::new(20).kw("addn", 5u64).kw("multn", 2u64)), Ok(12_586_269_025));
        assert!(fib2.is_empty());
    }

    #[test]
    fn test_events_follow_the_call_tree() {
        let registry = MemoRegistry::new();
        let sink = Arc::new(RecordingSink::new());
        let (fib, _) = counted_fib(&registry, MemoOptions::clean().sink(sink.clone()));

        fib.call(3).unwrap();
        // fib(3) -> fib(1), fib(2) -> fib(0), fib(1)
        assert_eq!(sink.count(EventKind::CacheMiss), 4);
        assert_eq!(sink.count(EventKind::CacheHit), 1);
        assert_eq!(sink.count(EventKind::CacheCleared(ClearReason::Auto)), 1);

        fib.clear();
        assert_eq!(sink.count(EventKind::CacheCleared(ClearReason::Explicit)), 1);
    }

    #[test]
    fn test_explicit_clear_ignores_depth() {
        let registry = MemoRegistry::new();
        let memo = Memo::new(
            &registry,
            |memo: &Memo<u32, usize, Infallible>, n: u32| -> Result<usize, Infallible> {
                if n >= 100 {
                    return Ok(memo.clear());
                }
                Ok(n as usize)
            },
            MemoOptions::persistent().name("self_clearing"),
        )
        .unwrap();

        memo.call(1).unwrap();
        memo.call(2).unwrap();
        assert_eq!(memo.len(), 2);

        // Clears from inside an active call, then stores its own result.
        assert_eq!(memo.call(100), Ok(2));
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.depth(), 0);
    }

    #[test]
    fn test_call_uncached_bypasses_the_table() {
        let registry = MemoRegistry::new();
        let (fib, calls) = counted_fib(&registry, MemoOptions::persistent());

        fib.call(5).unwrap();
        let before = calls.load(Ordering::SeqCst);
        assert_eq!(fib.call_uncached(5), Ok(5));
        // Only the outer call runs again; its sub-calls hit the table.
        assert_eq!(calls.load(Ordering::SeqCst), before + 1);
        assert_eq!(fib.depth(), 0);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let registry = MemoRegistry::new();
        let (first, _) = counted_fib(&registry, MemoOptions::default());
        first.call(4).unwrap();

        let second = Memo::new(
            &registry,
            |_: &Fib, n: u64| -> Result<u64, Infallible> { Ok(n) },
            MemoOptions::default().name("fib"),
        );
        assert_eq!(
            second.unwrap_err(),
            MemoError::DuplicateRegistration {
                name: "fib".to_string()
            }
        );
        assert_eq!(registry.lookup("fib").unwrap().len(), first.len());
    }

    #[test]
    fn test_name_inferred_from_function_item() {
        fn triangle(memo: &Memo<u32, u32, Infallible>, n: u32) -> Result<u32, Infallible> {
            if n == 0 {
                return Ok(0);
            }
            Ok(n + memo.call(n - 1)?)
        }

        let registry = MemoRegistry::new();
        let memo = Memo::new(&registry, triangle, MemoOptions::default()).unwrap();
        assert_eq!(memo.name(), "triangle");
        assert_eq!(memo.call(100), Ok(5050));
        assert!(registry.contains("triangle"));
    }

    #[test]
    fn test_concurrent_callers_share_the_table() {
        let registry = MemoRegistry::new();
        let (fib, calls) = counted_fib(&registry, MemoOptions::persistent());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let fib = Arc::clone(&fib);
                std::thread::spawn(move || fib.call(40))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(102_334_155));
        }

        assert_eq!(fib.depth(), 0);
        assert_eq!(fib.len(), 41);
        // Racing misses may compute a value twice, never more than once per thread.
        assert!(calls.load(Ordering::SeqCst) <= 41 * 4);
    }
}
