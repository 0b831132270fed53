//! Attachment slots: which faces a module kind offers and where they sit.
//!
//! Module frames follow one convention throughout the crate: `+X` points out
//! of the front face, `+Y` out of the left face and `+Z` up. A child attached
//! to a slot has its `-X` face (its "back") resting on the slot anchor.

use crate::module::{Module, ModuleKind};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;

/// Horizontal distance between attachment points on a core face.
pub const CORE_FACE_LATERAL_OFFSET: f32 = 0.029;

/// Vertical distance between attachment points on a core face.
pub const CORE_FACE_VERTICAL_OFFSET: f32 = 0.032;

/// A lateral face of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    Front,
    Left,
    Back,
    Right,
}

impl Face {
    pub const ALL: [Face; 4] = [Face::Front, Face::Left, Face::Back, Face::Right];

    pub fn name(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Left => "left",
            Self::Back => "back",
            Self::Right => "right",
        }
    }

    /// Rotation taking the module's `+X` axis onto this face's outward normal.
    pub fn orientation(self) -> Quat {
        match self {
            Self::Front => Quat::IDENTITY,
            Self::Left => Quat::from_rotation_z(FRAC_PI_2),
            Self::Back => Quat::from_rotation_z(PI),
            Self::Right => Quat::from_rotation_z(-FRAC_PI_2),
        }
    }

    /// Half the module's extent along this face's normal.
    fn depth(self, bounding_box: Vec3) -> f32 {
        match self {
            Self::Front | Self::Back => bounding_box.x / 2.0,
            Self::Left | Self::Right => bounding_box.y / 2.0,
        }
    }
}

/// Position of an attachment point within a face, looking outward from the
/// module's centre (left is towards the module's own left).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPosition {
    TopLeft,
    Top,
    TopRight,
    Left,
    Middle,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl GridPosition {
    pub const ALL: [GridPosition; 9] = [
        GridPosition::TopLeft,
        GridPosition::Top,
        GridPosition::TopRight,
        GridPosition::Left,
        GridPosition::Middle,
        GridPosition::Right,
        GridPosition::BottomLeft,
        GridPosition::Bottom,
        GridPosition::BottomRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::Top => "top",
            Self::TopRight => "top_right",
            Self::Left => "left",
            Self::Middle => "middle",
            Self::Right => "right",
            Self::BottomLeft => "bottom_left",
            Self::Bottom => "bottom",
            Self::BottomRight => "bottom_right",
        }
    }

    /// Unit (lateral, vertical) offset in the face plane. Left and top are positive.
    fn offset(self) -> (f32, f32) {
        let index = self as i8;
        let column = index % 3;
        let row = index / 3;
        ((1 - column) as f32, (1 - row) as f32)
    }
}

/// Identifies one attachment point on a module: a face and a position on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId {
    pub face: Face,
    pub position: GridPosition,
}

impl SlotId {
    /// The only slot of an active hinge, at its far end.
    pub const ATTACHMENT: SlotId = SlotId::center(Face::Front);

    pub const fn new(face: Face, position: GridPosition) -> Self {
        Self { face, position }
    }

    /// The middle attachment point of `face`.
    pub const fn center(face: Face) -> Self {
        Self::new(face, GridPosition::Middle)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.face.name(), self.position.name())
    }
}

impl ModuleKind {
    /// Whether a module of this kind exposes `slot`.
    pub fn offers(self, slot: SlotId) -> bool {
        match self {
            Self::Core => true,
            Self::Brick => {
                slot.position == GridPosition::Middle && slot.face != Face::Back
            }
            Self::ActiveHinge => slot == SlotId::ATTACHMENT,
        }
    }

    /// All slots this kind exposes, in ascending order.
    pub fn slots(self) -> Vec<SlotId> {
        Face::ALL
            .into_iter()
            .flat_map(|face| GridPosition::ALL.map(|position| SlotId::new(face, position)))
            .filter(|slot| self.offers(*slot))
            .collect()
    }
}

/// Fixed transform of a slot in its owner's local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotTransform {
    /// Point on the owner's face where the child's back face rests.
    pub anchor: Vec3,
    /// Rotation taking `+X` onto the face's outward normal.
    pub orientation: Quat,
}

impl Module {
    /// Local transform of `slot` on this module.
    ///
    /// Only meaningful for slots this module's kind offers.
    pub fn slot_transform(&self, slot: SlotId) -> SlotTransform {
        let orientation = slot.face.orientation();
        let depth = slot.face.depth(self.bounding_box());
        let (lateral, vertical) = match self.kind() {
            ModuleKind::Core => {
                let (u, v) = slot.position.offset();
                (u * CORE_FACE_LATERAL_OFFSET, v * CORE_FACE_VERTICAL_OFFSET)
            }
            ModuleKind::Brick | ModuleKind::ActiveHinge => (0.0, 0.0),
        };
        SlotTransform {
            anchor: orientation * Vec3::new(depth, lateral, vertical),
            orientation,
        }
    }
}
