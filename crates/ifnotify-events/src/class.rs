//! Process-wide table of event classes.
//!
//! Each class names its parent, so a family of events can share base fields
//! and a dispatch adapter. The table is built once, on first use, and is
//! read-only for the rest of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::dispatch::DispatchAdapter;
use crate::error::{EventError, EventResult};
use crate::interface::dispatch_interface_event;

/// Identifier of an event class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClassId {
    /// Root of every event: carries the object name and identity key.
    Object,
    /// Events about network interfaces.
    Interface,
    /// Interface lifecycle transitions (defined, started, ...).
    InterfaceLifecycle,
}

impl EventClassId {
    /// Stable class name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Object => "ObjectEvent",
            Self::Interface => "InterfaceEvent",
            Self::InterfaceLifecycle => "InterfaceEventLifecycle",
        }
    }
}

impl fmt::Display for EventClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration of one class, in registration order.
#[derive(Clone, Copy)]
pub(crate) struct ClassDecl {
    pub(crate) id: EventClassId,
    pub(crate) parent: Option<EventClassId>,
    pub(crate) adapter: Option<DispatchAdapter>,
}

/// Every class this engine knows about. Parents must precede children.
const CLASS_TABLE: &[ClassDecl] = &[
    ClassDecl {
        id: EventClassId::Object,
        parent: None,
        adapter: None,
    },
    ClassDecl {
        id: EventClassId::Interface,
        parent: Some(EventClassId::Object),
        adapter: Some(dispatch_interface_event),
    },
    ClassDecl {
        id: EventClassId::InterfaceLifecycle,
        parent: Some(EventClassId::Interface),
        adapter: None,
    },
];

/// A registered event class.
#[derive(Clone, Copy)]
pub struct EventClass {
    id: EventClassId,
    parent: Option<EventClassId>,
    adapter: Option<DispatchAdapter>,
}

impl EventClass {
    /// Class identifier.
    #[must_use]
    pub fn id(&self) -> EventClassId {
        self.id
    }

    /// Parent class, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<EventClassId> {
        self.parent
    }

    /// Whether this class installs its own dispatch adapter (as opposed to
    /// inheriting one).
    #[must_use]
    pub fn has_own_adapter(&self) -> bool {
        self.adapter.is_some()
    }
}

impl fmt::Debug for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventClass")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("has_own_adapter", &self.adapter.is_some())
            .finish()
    }
}

/// The class hierarchy, keyed by id.
#[derive(Debug)]
pub struct EventClassRegistry {
    classes: HashMap<EventClassId, EventClass>,
}

impl EventClassRegistry {
    /// Build a registry from declarations, rejecting duplicates and classes
    /// whose parent has not been registered yet.
    pub(crate) fn build(decls: &[ClassDecl]) -> EventResult<Self> {
        let mut classes = HashMap::with_capacity(decls.len());

        for decl in decls {
            if classes.contains_key(&decl.id) {
                return Err(EventError::Initialization(format!(
                    "duplicate event class {}",
                    decl.id
                )));
            }
            if let Some(parent) = decl.parent
                && !classes.contains_key(&parent)
            {
                return Err(EventError::Initialization(format!(
                    "event class {} declares unknown parent {parent}",
                    decl.id
                )));
            }
            classes.insert(
                decl.id,
                EventClass {
                    id: decl.id,
                    parent: decl.parent,
                    adapter: decl.adapter,
                },
            );
        }

        Ok(Self { classes })
    }

    /// Look up a class.
    #[must_use]
    pub fn get(&self, id: EventClassId) -> Option<&EventClass> {
        self.classes.get(&id)
    }

    /// Whether `id` is `ancestor` or derives from it.
    #[must_use]
    pub fn is_a(&self, id: EventClassId, ancestor: EventClassId) -> bool {
        let mut current = self.get(id);
        while let Some(class) = current {
            if class.id == ancestor {
                return true;
            }
            current = class.parent.and_then(|p| self.get(p));
        }
        false
    }

    /// The adapter for `id`: its own, or the nearest ancestor's.
    #[must_use]
    pub fn adapter_for(&self, id: EventClassId) -> Option<DispatchAdapter> {
        let mut current = self.get(id);
        while let Some(class) = current {
            if let Some(adapter) = class.adapter {
                return Some(adapter);
            }
            current = class.parent.and_then(|p| self.get(p));
        }
        None
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no classes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

static REGISTRY: OnceLock<EventResult<EventClassRegistry>> = OnceLock::new();

/// Build the class registry on first call; later calls return the same
/// result without doing any work.
///
/// A failure is logged once, when it happens, and then returned to every
/// caller.
///
/// # Errors
///
/// Returns [`EventError::Initialization`] if the class table is inconsistent.
pub fn ensure_initialized() -> EventResult<&'static EventClassRegistry> {
    REGISTRY
        .get_or_init(|| {
            let result = EventClassRegistry::build(CLASS_TABLE);
            match &result {
                Ok(registry) => {
                    debug!(classes = registry.len(), "Event class registry initialized");
                },
                Err(e) => error!(error = %e, "Event class registry failed to initialize"),
            }
            result
        })
        .as_ref()
        .map_err(Clone::clone)
}
