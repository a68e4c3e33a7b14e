//! Resolution of event object names to live handles.
//!
//! Events only carry the name (and optional identity key) of the object they
//! are about. Right before a callback runs, the dispatcher asks the
//! connection's [`ObjectResolver`] for a handle; objects that disappeared in
//! the meantime are skipped for that one delivery.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::class::EventClassId;

/// A resolved reference to a managed object, passed to callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    class: EventClassId,
    name: String,
    key: Option<String>,
}

impl ObjectHandle {
    /// Create a handle.
    pub fn new(class: EventClassId, name: impl Into<String>, key: Option<String>) -> Self {
        Self {
            class,
            name: name.into(),
            key,
        }
    }

    /// Family of the object.
    #[must_use]
    pub fn class(&self) -> EventClassId {
        self.class
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Secondary identity, if known.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} ({key})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Why a handle could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The object no longer exists.
    #[error("object {name} no longer exists")]
    Gone {
        /// Name the event carried.
        name: String,
    },

    /// The lookup itself failed.
    #[error("failed to resolve {name}: {reason}")]
    Failed {
        /// Name the event carried.
        name: String,
        /// Backend-specific reason.
        reason: String,
    },
}

/// Looks up live objects on behalf of the dispatcher.
///
/// Implementations are called from delivery tasks, outside any engine lock,
/// and may be called concurrently for different connections.
pub trait ObjectResolver: Send + Sync {
    /// Resolve the object an event is about.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when no live handle can be produced.
    fn resolve(
        &self,
        family: EventClassId,
        name: &str,
        key: Option<&str>,
    ) -> Result<ObjectHandle, ResolveError>;
}

/// Resolver that trusts the event: every name resolves to a handle built
/// from the event's own fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver;

impl ObjectResolver for NameResolver {
    fn resolve(
        &self,
        family: EventClassId,
        name: &str,
        key: Option<&str>,
    ) -> Result<ObjectHandle, ResolveError> {
        Ok(ObjectHandle::new(family, name, key.map(str::to_owned)))
    }
}
