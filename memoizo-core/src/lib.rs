//! # Memoizo Core
//!
//! Core types for the Memoizo memoization library.
//!
//! A [`Memo`] wraps one callable and caches its results by call arguments. The cache
//! is populated by the recursive sub-calls of a call tree and, in auto-clear mode,
//! discarded the moment the outermost call returns. Every wrapper registers itself in
//! a [`MemoRegistry`] under a slot name so that code outside the call tree can find
//! and invalidate it.
//!
//! ## Module Organization
//!
//! - [`keys`] - Argument capabilities ([`KeyArg`], [`Arguments`]) and the [`CacheKey`] type
//! - [`deriver`] - Cache key derivation: direct fast path, serialized fallback
//! - [`memo`] - The memoizing wrapper and its depth-scoped lifecycle
//! - [`method`] - Per-receiver binding for method-style callables
//! - [`registry`] - Named registry used for lookup and bulk invalidation
//! - [`events`] - Diagnostic events and the sinks that consume them
//!
//! ## Concurrency
//!
//! Wrappers are `Send + Sync`. The table sits behind a `parking_lot::Mutex` that is
//! never held while the wrapped callable runs, and the depth counter is shared by all
//! threads: an auto-clear wrapper empties its table once no call of it is active
//! anywhere.
mod canonical;
mod error;
mod options;
mod utils;

pub mod deriver;
pub mod events;
pub mod keys;
pub mod memo;
pub mod method;
pub mod registry;

#[cfg(feature = "stats")]
mod stats;

pub use deriver::{derive_key, Derivation};
pub use error::{KeyDerivationFailed, MemoError};
pub use events::{
    ClearReason, EventKind, EventRecord, EventSink, MemoEvent, NullSink, RecordingSink,
    TracingSink,
};
pub use keys::{Arguments, CacheKey, Call, Component, InstanceRef, KeyArg, KeyPart, Kwargs};
pub use memo::Memo;
pub use method::{BoundMethod, MethodMemo, Receiver};
pub use options::MemoOptions;
pub use registry::{MemoRegistry, Memoized};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
