//! # Memo Registry
//!
//! Maps slot names to live wrappers so that code outside a call tree can find a memo
//! and empty its table, one at a time or all at once.
//!
//! Registries are plain values: tests and libraries can build their own with
//! [`MemoRegistry::new`]. [`MemoRegistry::global`] is the process-wide instance.
//!
//! # Examples
//!
//! ```rust
//! use std::convert::Infallible;
//! use memoizo_core::{Memo, MemoError, MemoOptions, MemoRegistry};
//!
//! let registry = MemoRegistry::new();
//! let square = Memo::new(
//!     &registry,
//!     |_: &Memo<u32, u32, Infallible>, n: u32| Ok(n * n),
//!     MemoOptions::default().name("square"),
//! )
//! .unwrap();
//!
//! square.call(3).unwrap();
//! square.call(4).unwrap();
//!
//! assert_eq!(registry.clear_one("square"), Ok(2));
//! assert_eq!(
//!     registry.clear_one("cube"),
//!     Err(MemoError::NotFound { name: "cube".to_string() })
//! );
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::MemoError;

#[cfg(feature = "stats")]
use crate::CacheStats;

static GLOBAL_REGISTRY: Lazy<MemoRegistry> = Lazy::new(MemoRegistry::new);

/// Type-erased view of a registered wrapper.
///
/// Implemented by [`Memo`](crate::Memo) for every argument, result and error type, so
/// one registry can hold wrappers of unrelated signatures.
pub trait Memoized: Send + Sync {
    /// Slot name the wrapper was registered under.
    fn name(&self) -> &str;

    /// Empties the table. Returns the number of entries removed.
    fn clear(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of calls of the wrapper currently on the stack.
    fn depth(&self) -> usize;

    fn is_auto_clear(&self) -> bool;

    #[cfg(feature = "stats")]
    fn stats(&self) -> &CacheStats;
}

impl fmt::Debug for dyn Memoized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name())
            .field("len", &self.len())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Name-indexed collection of wrappers.
///
/// # Thread Safety
///
/// Backed by a `DashMap`. No shard lock is held while a wrapper clears its table, so
/// sinks reacting to `cache_cleared` may use the registry freely.
#[derive(Default)]
pub struct MemoRegistry {
    slots: DashMap<String, Arc<dyn Memoized>>,
}

impl MemoRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static MemoRegistry {
        &GLOBAL_REGISTRY
    }

    /// Adds `memo` under `name`.
    ///
    /// # Errors
    ///
    /// [`MemoError::DuplicateRegistration`] if the name is taken. The existing slot is
    /// kept as it was.
    pub fn register(&self, name: &str, memo: Arc<dyn Memoized>) -> Result<(), MemoError> {
        match self.slots.entry(name.to_string()) {
            Entry::Occupied(_) => Err(MemoError::DuplicateRegistration {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(memo);
                debug!(memo = name, "slot registered");
                Ok(())
            }
        }
    }

    /// Returns the wrapper registered under `name`.
    ///
    /// # Errors
    ///
    /// [`MemoError::NotFound`] if no wrapper has that name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Memoized>, MemoError> {
        self.slots
            .get(name)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| MemoError::NotFound {
                name: name.to_string(),
            })
    }

    /// Removes the slot, freeing the name for another wrapper. The wrapper itself keeps
    /// working for anyone still holding it.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Memoized>, MemoError> {
        self.slots
            .remove(name)
            .map(|(_, memo)| memo)
            .ok_or_else(|| MemoError::NotFound {
                name: name.to_string(),
            })
    }

    /// Empties the table of one wrapper, regardless of its depth.
    pub fn clear_one(&self, name: &str) -> Result<usize, MemoError> {
        let memo = self.lookup(name)?;
        Ok(memo.clear())
    }

    /// Empties every registered table. Returns the total number of entries removed.
    pub fn clear_all(&self) -> usize {
        let memos: Vec<Arc<dyn Memoized>> = self
            .slots
            .iter()
            .map(|slot| Arc::clone(slot.value()))
            .collect();

        let removed = memos.iter().map(|memo| memo.clear()).sum();
        info!(memos = memos.len(), entries = removed, "all memo tables cleared");
        removed
    }

    /// Registered slot names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for MemoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoRegistry")
            .field("names", &self.names())
            .finish()
    }
}
