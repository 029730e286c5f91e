use std::fmt;
use std::sync::Arc;

use crate::events::{EventSink, TracingSink};

/// Construction options of a memo.
///
/// The default persists the table across top-level calls, infers the slot name from
/// the callable and reports through [`TracingSink`].
///
/// ```
/// use memoizo_core::MemoOptions;
///
/// let options = MemoOptions::clean().name("fibonacci2");
/// assert!(options.is_auto_clear());
/// assert_eq!(options.explicit_name(), Some("fibonacci2"));
///
/// assert!(!MemoOptions::default().is_auto_clear());
/// ```
#[derive(Clone, Default)]
pub struct MemoOptions {
    auto_clear: bool,
    name: Option<String>,
    sink: Option<Arc<dyn EventSink>>,
}

impl MemoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps results until an explicit clear.
    pub fn persistent() -> Self {
        Self::default()
    }

    /// Discards the table when the outermost call returns.
    pub fn clean() -> Self {
        Self::default().auto_clear(true)
    }

    pub fn auto_clear(mut self, auto_clear: bool) -> Self {
        self.auto_clear = auto_clear;
        self
    }

    /// Registry slot name; overrides the name inferred from the callable.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_auto_clear(&self) -> bool {
        self.auto_clear
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn resolve_sink(&self) -> Arc<dyn EventSink> {
        match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for MemoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoOptions")
            .field("auto_clear", &self.auto_clear)
            .field("name", &self.name)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}
