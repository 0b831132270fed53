//! World-space poses and the depth-first pose resolver.

use crate::tree::{BodyTree, ModuleId};
use glam::{IVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// Origin, no rotation.
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Applies `local` inside this pose's frame: `self ∘ local`.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: self.transform_point(local.position),
            orientation: (self.orientation * local.orientation).normalize(),
        }
    }

    /// Maps a point from this pose's local frame to the parent frame.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.orientation * point
    }

    /// Returns the pose's local forward direction (X-axis).
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    /// Returns the pose's local left direction (Y-axis).
    pub fn left(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    /// Returns the pose's local up direction (Z-axis).
    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }
}

/// A module placed by [`resolve_poses`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPose {
    pub id: ModuleId,
    /// The module this one hangs from. `None` for the core.
    pub parent: Option<ModuleId>,
    /// World pose of the module's centre.
    pub pose: Pose,
    /// Integer cell in the body's module grid, core at the origin.
    ///
    /// Each step moves one cell along the world axis closest to the slot's
    /// outward direction, so off-axis rotations still land on an axis
    /// neighbour. The nine grid positions of one core face are sub-cell
    /// offsets and share that face's cell.
    pub cell: IVec3,
}

/// Cursor state while walking the tree. Everything is body-relative.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    id: ModuleId,
    parent: Option<ModuleId>,
    local: Pose,
    cell: IVec3,
}

/// Unit step along the dominant axis of `direction`. Ties go to X, then Y.
fn snap_to_axis(direction: Vec3) -> IVec3 {
    let a = direction.abs();
    if a.x >= a.y && a.x >= a.z {
        IVec3::X * direction.x.signum() as i32
    } else if a.y >= a.z {
        IVec3::Y * direction.y.signum() as i32
    } else {
        IVec3::Z * direction.z.signum() as i32
    }
}

/// Computes the world pose of every module in `tree`, depth first from the core.
///
/// A child's pose is its parent's pose, then the slot anchor and face
/// rotation, then the child's own rotation. The child's back face rests on
/// the anchor, so its centre sits half its length further out. Children are
/// visited in slot order, which makes the output order stable.
pub fn resolve_poses(tree: &BodyTree) -> Vec<ResolvedPose> {
    let root_pose = tree.root_pose();
    let mut resolved = Vec::with_capacity(tree.len());
    let Some(core) = tree.module(tree.root()) else {
        return resolved;
    };

    let mut stack = vec![Cursor {
        id: tree.root(),
        parent: None,
        local: Pose::new(Vec3::ZERO, core.intrinsic_orientation()),
        cell: IVec3::ZERO,
    }];

    while let Some(cursor) = stack.pop() {
        let Some(module) = tree.module(cursor.id) else {
            continue;
        };
        resolved.push(ResolvedPose {
            id: cursor.id,
            parent: cursor.parent,
            pose: root_pose.compose(&cursor.local),
            cell: cursor.cell,
        });

        // Reverse so the lowest slot is popped first.
        let children: Vec<_> = tree.children(cursor.id).collect();
        for (slot, child_id) in children.into_iter().rev() {
            let Some(child) = tree.module(child_id) else {
                continue;
            };
            let slot_transform = module.slot_transform(slot);
            let face = (cursor.local.orientation * slot_transform.orientation).normalize();
            let outward = face * Vec3::X;
            let anchor = cursor.local.transform_point(slot_transform.anchor);

            stack.push(Cursor {
                id: child_id,
                parent: Some(cursor.id),
                local: Pose {
                    position: anchor + outward * (child.bounding_box().x / 2.0),
                    orientation: (face * child.intrinsic_orientation()).normalize(),
                },
                cell: cursor.cell + snap_to_axis(outward),
            });
        }
    }

    resolved
}
