//! Configuration for turning bodies into scene geometry.

use crate::geometry::JointLimit;

/// Configuration for geometry building.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    /// Joint limits for hinges that do not override them.
    pub hinge_limits: JointLimit,
    /// Penetration depth (meters) below which touching boxes are not
    /// considered intersecting.
    pub contact_tolerance: f32,
    /// Refuse to build bodies whose modules overlap.
    pub reject_self_intersection: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            hinge_limits: JointLimit::default(),
            contact_tolerance: 1e-4,
            reject_self_intersection: true,
        }
    }
}
