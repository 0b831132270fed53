//! Error types for body construction, geometry building and catalog lookup.

use crate::module::ModuleKind;
use crate::slot::SlotId;
use crate::tree::ModuleId;
use thiserror::Error;

/// Errors raised while editing a body, building its geometry or estimating
/// physical properties.
///
/// All of these indicate a design or configuration mistake, so none of them
/// are retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    /// The slot already holds a module.
    #[error("slot {slot} is already occupied")]
    SlotOccupied {
        /// The occupied slot.
        slot: SlotId,
    },

    /// The slot is not offered by the parent's module kind.
    #[error("{kind} does not offer slot {slot}")]
    InvalidSlot {
        /// Kind of the parent module.
        kind: ModuleKind,
        /// The requested slot.
        slot: SlotId,
    },

    /// The parent module is not part of this tree.
    #[error("{0} is not part of this body")]
    DetachedParent(ModuleId),

    /// Nothing is attached at the slot.
    #[error("slot {slot} is empty")]
    EmptySlot {
        /// The empty slot.
        slot: SlotId,
    },

    /// A module kind outside `core`, `brick` and `active_hinge`.
    #[error("unsupported module type: {0}")]
    UnsupportedModuleType(String),

    /// A discretized geometry that cannot be integrated.
    #[error("insufficient geometry in element {element}: {message}")]
    InsufficientGeometry {
        /// Index of the offending element.
        element: usize,
        /// Description of what is missing.
        message: String,
    },

    /// Catalog lookup of an unknown robot.
    #[error("no robot named {name:?}, valid names are {valid:?}")]
    NameNotFound {
        /// The requested name.
        name: String,
        /// All names the catalog knows.
        valid: Vec<&'static str>,
    },

    /// A body must be rooted at a core.
    #[error("body root must be a core, got {0}")]
    InvalidRoot(ModuleKind),

    /// A second core somewhere below the root.
    #[error("a body holds exactly one core")]
    DuplicateCore,

    /// Scene assembly without terrain.
    #[error("scene requires at least one terrain geometry")]
    MissingTerrain,

    /// The arena cannot hold that many more modules.
    #[error("no room for {requested} more modules in this body")]
    CapacityExceeded {
        /// Number of modules the rejected attach would have added.
        requested: usize,
    },

    /// Two non-adjacent modules occupy the same space.
    #[error("{a} intersects {b}")]
    SelfIntersection {
        /// First module of the pair.
        a: ModuleId,
        /// Second module of the pair.
        b: ModuleId,
    },
}

impl BodyError {
    /// Create an insufficient geometry error.
    pub fn insufficient_geometry(element: usize, message: impl Into<String>) -> Self {
        Self::InsufficientGeometry {
            element,
            message: message.into(),
        }
    }

    /// Create an unsupported module type error.
    pub fn unsupported_module_type(name: impl Into<String>) -> Self {
        Self::UnsupportedModuleType(name.into())
    }
}

/// Result type for body operations.
pub type Result<T> = std::result::Result<T, BodyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{Face, GridPosition};

    #[test]
    fn test_error_display() {
        let err = BodyError::InvalidSlot {
            kind: ModuleKind::Brick,
            slot: SlotId::new(Face::Back, GridPosition::Middle),
        };
        assert!(err.to_string().contains("brick"));
        assert!(err.to_string().contains("back"));
    }

    #[test]
    fn test_name_not_found_lists_names() {
        let err = BodyError::NameNotFound {
            name: "nonexistent".into(),
            valid: vec!["gecko", "darts"],
        };
        let msg = err.to_string();
        assert!(msg.contains("nonexistent"));
        assert!(msg.contains("gecko"));
    }

    #[test]
    fn test_insufficient_geometry() {
        let err = BodyError::insufficient_geometry(3, "node 9 out of range");
        assert!(err.to_string().contains("element 3"));
        assert!(err.to_string().contains("node 9"));
    }
}
