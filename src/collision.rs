//! Oriented-box overlap tests used to catch self-intersecting bodies.

use crate::error::{BodyError, Result};
use crate::pose::Pose;
use crate::tree::{FrozenBody, ModuleId};
use glam::Vec3;

/// A box with arbitrary orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub center: Vec3,
    /// Unit axes of the box frame.
    pub axes: [Vec3; 3],
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// A box of full extents `size` centred on `pose`.
    pub fn new(pose: &Pose, size: Vec3) -> Self {
        Self {
            center: pose.position,
            axes: [pose.forward(), pose.left(), pose.up()],
            half_extents: size / 2.0,
        }
    }

    /// Half-width of the box's shadow on `axis`.
    fn projected_radius(&self, axis: Vec3) -> f32 {
        self.half_extents.x * self.axes[0].dot(axis).abs()
            + self.half_extents.y * self.axes[1].dot(axis).abs()
            + self.half_extents.z * self.axes[2].dot(axis).abs()
    }

    /// Smallest overlap over all 15 separating-axis candidates.
    ///
    /// Zero or negative means the boxes touch or are apart.
    pub fn penetration(&self, other: &OrientedBox) -> f32 {
        let offset = other.center - self.center;
        let mut candidates: Vec<Vec3> = Vec::with_capacity(15);
        candidates.extend(self.axes);
        candidates.extend(other.axes);
        for a in self.axes {
            for b in other.axes {
                let cross = a.cross(b);
                // Parallel edges add nothing the face axes do not cover.
                if cross.length_squared() > 1e-8 {
                    candidates.push(cross.normalize());
                }
            }
        }

        candidates
            .into_iter()
            .map(|axis| {
                self.projected_radius(axis) + other.projected_radius(axis)
                    - offset.dot(axis).abs()
            })
            .fold(f32::INFINITY, f32::min)
    }

    pub fn intersects(&self, other: &OrientedBox, tolerance: f32) -> bool {
        self.penetration(other) > tolerance
    }
}

impl FrozenBody {
    /// Pairs of modules whose bounding boxes overlap by more than
    /// `tolerance`. Parent and child always touch and are not reported.
    pub fn self_intersections(&self, tolerance: f32) -> Vec<(ModuleId, ModuleId)> {
        let boxes: Vec<_> = self
            .poses()
            .iter()
            .filter_map(|resolved| {
                let module = self.tree().module(resolved.id)?;
                Some((
                    resolved,
                    OrientedBox::new(&resolved.pose, module.bounding_box()),
                ))
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (a, box_a)) in boxes.iter().enumerate() {
            for (b, box_b) in &boxes[i + 1..] {
                if a.parent == Some(b.id) || b.parent == Some(a.id) {
                    continue;
                }
                if box_a.intersects(box_b, tolerance) {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }

    /// Fails on the first pair of intersecting modules.
    pub fn validate(&self, tolerance: f32) -> Result<()> {
        match self.self_intersections(tolerance).first() {
            Some(&(a, b)) => Err(BodyError::SelfIntersection { a, b }),
            None => Ok(()),
        }
    }
}
