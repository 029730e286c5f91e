//! # Key Derivation
//!
//! Turns an argument set into a [`CacheKey`].
//!
//! 1. Keyword arguments are folded in after the positional ones as `name = value` parts,
//!    sorted by name.
//! 2. If every component is direct, the key is the sequence of parts itself.
//! 3. Otherwise every component, direct ones included, is lowered into a tagged
//!    canonical encoding and the key is its bytes. Values of different kinds never
//!    encode alike, and map entries and `HashSet` elements are sorted.
//! 4. If serialization fails the result is [`Derivation::Failed`]; the caller runs the
//!    callable uncached.
//!
//! Keys follow call syntax, not resolved parameter bindings: `f(1, 2)` and
//! `f(1, b = 2)` derive different keys.
//!
//! ```
//! use memoizo_core::{derive_key, Call, Derivation};
//!
//! assert!(matches!(derive_key(&(1, 2)), Derivation::Direct(_)));
//! assert!(matches!(derive_key(&(1, vec![2])), Derivation::Fallback(_)));
//!
//! let a = derive_key(&Call::new(1).kw("x", 1).kw("y", 2));
//! let b = derive_key(&Call::new(1).kw("y", 2).kw("x", 1));
//! assert_eq!(a.key(), b.key());
//! ```

use serde_json::Value;

use crate::canonical;
use crate::keys::{Arguments, CacheKey, Component, KeyPart, Kwargs};
use crate::KeyDerivationFailed;

/// Outcome of deriving a key for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Every argument was directly comparable.
    Direct(CacheKey),
    /// At least one argument needed the serialization fallback.
    Fallback(CacheKey),
    /// No key could be derived; the call must run uncached.
    Failed(KeyDerivationFailed),
}

impl Derivation {
    pub fn key(&self) -> Option<&CacheKey> {
        match self {
            Derivation::Direct(key) | Derivation::Fallback(key) => Some(key),
            Derivation::Failed(_) => None,
        }
    }

    pub fn into_key(self) -> Result<CacheKey, KeyDerivationFailed> {
        match self {
            Derivation::Direct(key) | Derivation::Fallback(key) => Ok(key),
            Derivation::Failed(err) => Err(err),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Derivation::Fallback(_))
    }
}

/// Derives the cache key of one call.
pub fn derive_key<A: Arguments + ?Sized>(args: &A) -> Derivation {
    let positional = args.positional();
    let keywords = args.keywords();

    if let Some(parts) = direct_parts(&positional, keywords) {
        return Derivation::Direct(CacheKey::Direct(parts));
    }

    match serialized_key(&positional, keywords) {
        Ok(key) => Derivation::Fallback(key),
        Err(err) => Derivation::Failed(err),
    }
}

fn direct_parts(positional: &[Component], keywords: Option<&Kwargs>) -> Option<Vec<KeyPart>> {
    let mut parts = Vec::with_capacity(positional.len() + keywords.map_or(0, Kwargs::len));
    for component in positional {
        parts.push(component.as_direct()?.clone());
    }
    if let Some(keywords) = keywords {
        for (name, component) in keywords.components() {
            let part = component.as_direct()?.clone();
            parts.push(KeyPart::Keyword(name.to_owned(), Box::new(part)));
        }
    }
    Some(parts)
}

fn serialized_key(
    positional: &[Component],
    keywords: Option<&Kwargs>,
) -> Result<CacheKey, KeyDerivationFailed> {
    let mut pins = Vec::new();

    let args = positional
        .iter()
        .map(|component| component.to_canonical(&mut pins))
        .collect::<Result<Vec<_>, _>>()
        .map_err(KeyDerivationFailed::new)?;

    let mut kwargs = Vec::new();
    if let Some(keywords) = keywords {
        for (name, component) in keywords.components() {
            let value = component
                .to_canonical(&mut pins)
                .map_err(KeyDerivationFailed::new)?;
            kwargs.push(canonical::keyword(name, value));
        }
    }

    let call = canonical::node("call", [Value::Array(args), Value::Array(kwargs)]);
    Ok(CacheKey::Serialized {
        bytes: canonical::to_bytes(&call),
        pins,
    })
}
