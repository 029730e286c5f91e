//! # Memoizo
//!
//! Recursion-scoped memoization for Rust.
//!
//! A memo wraps one callable and stores its results by argument value. Recursive calls
//! made through the wrapper hit the table, which turns exponential recursions into
//! linear ones. Two lifecycles are available:
//!
//! - **Persistent** (default): the table keeps its results until cleared explicitly
//! - **Auto-clear**: the table is discarded when the outermost call returns, so it only
//!   ever holds the results of a single call tree
//!
//! ## Features
//!
//! - **Key fallback**: arguments that are not directly comparable (vectors, maps, nested
//!   structures) are keyed by a canonical serialization; calls that cannot be keyed at
//!   all still run, uncached
//! - **Named registry**: every wrapper is reachable by name for lookup and invalidation
//! - **Methods**: receivers are part of the key by identity
//! - **Diagnostics**: hits, misses, fallbacks and clears are reported through `tracing`
//!   or a custom sink
//!
//! ## Quick Start
//!
//! ```rust
//! use std::convert::Infallible;
//! use memoizo::{Memo, MemoOptions, MemoRegistry};
//!
//! fn fibonacci(memo: &Memo<u64, u64, Infallible>, n: u64) -> Result<u64, Infallible> {
//!     if n < 2 {
//!         return Ok(n);
//!     }
//!     Ok(memo.call(n - 2)? + memo.call(n - 1)?)
//! }
//!
//! let registry = MemoRegistry::new();
//! let fibonacci = Memo::new(&registry, fibonacci, MemoOptions::persistent()).unwrap();
//!
//! assert_eq!(fibonacci.call(30), Ok(832_040));
//! // Every n in 0..=30 was computed exactly once.
//! assert_eq!(fibonacci.len(), 31);
//! ```
//!
//! ## Keyword Arguments
//!
//! [`Call`] pairs positional arguments with named ones. Keywords are part of the key,
//! independent of the order they were given in:
//!
//! ```rust
//! use std::convert::Infallible;
//! use memoizo::{Call, Memo, MemoOptions, MemoRegistry};
//!
//! type Fib2 = Memo<Call<u64>, u64, Infallible>;
//!
//! let registry = MemoRegistry::new();
//! let fibonacci2 = Memo::new(
//!     &registry,
//!     |memo: &Fib2, call: Call<u64>| -> Result<u64, Infallible> {
//!         let n = (call.args + call.kw_or("addn", 0u64)) * call.kw_or("multn", 1u64);
//!         if n < 2 {
//!             return Ok(n);
//!         }
//!         Ok(memo.call(Call::new(n - 2))? + memo.call(Call::new(n - 1))?)
//!     },
//!     MemoOptions::clean().name("fibonacci2"),
//! )
//! .unwrap();
//!
//! assert_eq!(fibonacci2.call(Call::new(10).kw("multn", 3u64)), Ok(832_040));
//! // Auto-clear: nothing survives the top-level call.
//! assert!(fibonacci2.is_empty());
//! ```
//!
//! ## Error Handling
//!
//! `Err` results are returned unchanged and never stored:
//!
//! ```rust
//! use memoizo::{Memo, MemoOptions, MemoRegistry};
//!
//! let registry = MemoRegistry::new();
//! let divide = Memo::new(
//!     &registry,
//!     |_: &Memo<(i32, i32), i32, String>, (a, b): (i32, i32)| {
//!         if b == 0 {
//!             Err("Division by zero".to_string())
//!         } else {
//!             Ok(a / b)
//!         }
//!     },
//!     MemoOptions::default().name("divide"),
//! )
//! .unwrap();
//!
//! assert_eq!(divide.call((10, 2)), Ok(5));
//! assert!(divide.call((10, 0)).is_err());
//! assert_eq!(divide.len(), 1);
//! ```

pub use memoizo_core::*;

/// Empty the table of the wrapper registered under `name` in the global registry
///
/// # Arguments
///
/// * `name` - The slot name of the wrapper
///
/// # Returns
///
/// The number of entries removed, or [`MemoError::NotFound`] if no wrapper has that name
///
/// # Examples
///
/// ```rust
/// use memoizo::clear_memo;
///
/// assert!(clear_memo("never_registered").is_err());
/// ```
pub fn clear_memo(name: &str) -> Result<usize, MemoError> {
    MemoRegistry::global().clear_one(name)
}

/// Empty the tables of every wrapper in the global registry
///
/// # Returns
///
/// The total number of entries removed
pub fn clear_all_memos() -> usize {
    MemoRegistry::global().clear_all()
}

/// Find a wrapper in the global registry by name
///
/// # Examples
///
/// ```rust
/// use memoizo::{lookup_memo, MemoError};
///
/// assert_eq!(
///     lookup_memo("never_registered").unwrap_err(),
///     MemoError::NotFound { name: "never_registered".to_string() }
/// );
/// ```
pub fn lookup_memo(name: &str) -> Result<std::sync::Arc<dyn Memoized>, MemoError> {
    MemoRegistry::global().lookup(name)
}
