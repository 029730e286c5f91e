use thiserror::Error;

/// Errors surfaced by wrapper construction and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    /// Another wrapper already owns this slot name. The existing registration is kept.
    #[error("a memo is already registered under the name `{name}`")]
    DuplicateRegistration { name: String },

    /// No wrapper is registered under this slot name.
    #[error("no memo registered under the name `{name}`")]
    NotFound { name: String },
}

impl MemoError {
    /// The slot name the error refers to.
    pub fn name(&self) -> &str {
        match self {
            MemoError::DuplicateRegistration { name } | MemoError::NotFound { name } => name,
        }
    }
}

/// The arguments of a call could not be turned into any cache key.
///
/// This never reaches the caller of a memoized function: the wrapper recovers by
/// invoking the callable directly and skipping the cache for that call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot derive a cache key: {reason}")]
pub struct KeyDerivationFailed {
    pub reason: String,
}

impl KeyDerivationFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
