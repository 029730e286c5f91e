//! # Diagnostic Events
//!
//! Structured events emitted by every wrapper. Sinks observe them; caching behaves the
//! same whether or not anything listens.
//!
//! The default [`TracingSink`] forwards events to `tracing`: hits and misses at
//! `debug`, fallback keys and table clears at `info`, key derivation failures at
//! `error`.

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::keys::CacheKey;

/// Why a table was emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearReason {
    /// The outermost call of an auto-clear wrapper returned.
    Auto,
    /// `clear()` was called on the wrapper or through the registry.
    Explicit,
}

/// An event emitted during a call or a clear.
#[derive(Debug, Clone, Copy)]
pub enum MemoEvent<'a> {
    CacheHit {
        name: &'a str,
        key: &'a CacheKey,
    },
    CacheMiss {
        name: &'a str,
        key: &'a CacheKey,
    },
    KeyFallbackUsed {
        name: &'a str,
    },
    KeyDerivationFailed {
        name: &'a str,
        reason: &'a str,
    },
    CacheCleared {
        name: &'a str,
        reason: ClearReason,
        entries: usize,
    },
}

impl<'a> MemoEvent<'a> {
    /// Slot name of the wrapper that emitted the event.
    pub fn name(&self) -> &'a str {
        match *self {
            MemoEvent::CacheHit { name, .. }
            | MemoEvent::CacheMiss { name, .. }
            | MemoEvent::KeyFallbackUsed { name }
            | MemoEvent::KeyDerivationFailed { name, .. }
            | MemoEvent::CacheCleared { name, .. } => name,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MemoEvent::CacheHit { .. } => EventKind::CacheHit,
            MemoEvent::CacheMiss { .. } => EventKind::CacheMiss,
            MemoEvent::KeyFallbackUsed { .. } => EventKind::KeyFallbackUsed,
            MemoEvent::KeyDerivationFailed { .. } => EventKind::KeyDerivationFailed,
            MemoEvent::CacheCleared { reason, .. } => EventKind::CacheCleared(*reason),
        }
    }
}

/// Discriminant of a [`MemoEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CacheHit,
    CacheMiss,
    KeyFallbackUsed,
    KeyDerivationFailed,
    CacheCleared(ClearReason),
}

/// Consumer of wrapper events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &MemoEvent<'_>);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MemoEvent<'_>) {
        match *event {
            MemoEvent::CacheHit { name, key } => debug!(memo = name, key = %key, "cache hit"),
            MemoEvent::CacheMiss { name, key } => debug!(memo = name, key = %key, "cache miss"),
            MemoEvent::KeyFallbackUsed { name } => {
                info!(memo = name, "arguments not directly comparable, serialized key used")
            }
            MemoEvent::KeyDerivationFailed { name, reason } => {
                error!(memo = name, reason, "could not derive a cache key, result not stored")
            }
            MemoEvent::CacheCleared {
                name,
                reason,
                entries,
            } => info!(memo = name, ?reason, entries, "cache cleared"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &MemoEvent<'_>) {}
}

/// Owned summary of an event, as kept by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub name: String,
    /// Rendered cache key for hits and misses.
    pub key: Option<String>,
}

impl From<&MemoEvent<'_>> for EventRecord {
    fn from(event: &MemoEvent<'_>) -> Self {
        let key = match event {
            MemoEvent::CacheHit { key, .. } | MemoEvent::CacheMiss { key, .. } => {
                Some(key.to_string())
            }
            _ => None,
        };
        Self {
            kind: event.kind(),
            name: event.name().to_owned(),
            key,
        }
    }
}

/// Keeps every event in memory.
///
/// # Examples
///
/// ```
/// use memoizo_core::{ClearReason, EventKind, EventSink, MemoEvent, RecordingSink};
///
/// let sink = RecordingSink::new();
/// sink.emit(&MemoEvent::CacheCleared { name: "fib", reason: ClearReason::Auto, entries: 3 });
///
/// assert_eq!(sink.count(EventKind::CacheCleared(ClearReason::Auto)), 1);
/// assert_eq!(sink.events()[0].name, "fib");
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &MemoEvent<'_>) {
        self.events.lock().push(EventRecord::from(event));
    }
}
