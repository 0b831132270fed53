//! Module kinds and the immutable [`Module`] record.

use crate::error::{BodyError, Result};
use crate::geometry::{Color, JointLimit};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

/// Default bounding box of a core (x forward, y left, z up), in meters.
pub const CORE_SIZE: Vec3 = Vec3::new(0.10, 0.10, 0.10);

/// Default bounding box of a brick.
pub const BRICK_SIZE: Vec3 = Vec3::new(0.06288625, 0.06288625, 0.0603);

/// Default bounding box of an active hinge, frame and servo together.
pub const ACTIVE_HINGE_SIZE: Vec3 = Vec3::new(0.074, 0.052, 0.052);

/// The closed set of module types a body can be made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleKind {
    /// The single root of every body. Houses the controller.
    Core,
    /// Passive structural cube.
    Brick,
    /// Servo-driven revolute joint.
    ActiveHinge,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [ModuleKind::Core, ModuleKind::Brick, ModuleKind::ActiveHinge];

    pub fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Brick => "brick",
            Self::ActiveHinge => "active_hinge",
        }
    }

    pub fn default_bounding_box(self) -> Vec3 {
        match self {
            Self::Core => CORE_SIZE,
            Self::Brick => BRICK_SIZE,
            Self::ActiveHinge => ACTIVE_HINGE_SIZE,
        }
    }

    pub fn default_color(self) -> Color {
        match self {
            Self::Core => Color::new(255, 200, 50, 255),
            Self::Brick => Color::new(50, 50, 255, 255),
            Self::ActiveHinge => Color::new(255, 50, 50, 255),
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleKind {
    type Err = BodyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| BodyError::unsupported_module_type(s))
    }
}

impl TryFrom<String> for ModuleKind {
    type Error = BodyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModuleKind> for String {
    fn from(kind: ModuleKind) -> Self {
        kind.name().to_owned()
    }
}

/// Quarter-turn rotations used for collision-free, grid-aligned placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RightAngle {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl RightAngle {
    pub fn radians(self) -> f32 {
        match self {
            Self::Deg0 => 0.0,
            Self::Deg90 => FRAC_PI_2,
            Self::Deg180 => PI,
            Self::Deg270 => PI + FRAC_PI_2,
        }
    }
}

/// A module's intrinsic rotation in radians.
///
/// Built from either a raw angle or a [`RightAngle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation(pub f32);

impl Rotation {
    pub fn radians(self) -> f32 {
        self.0
    }
}

impl From<f32> for Rotation {
    fn from(radians: f32) -> Self {
        Self(radians)
    }
}

impl From<RightAngle> for Rotation {
    fn from(angle: RightAngle) -> Self {
        Self(angle.radians())
    }
}

/// A single rigid unit of a robot body.
///
/// The kind and rotation are fixed at construction. The `with_*` builders
/// only exist to finish construction before the module is attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
    kind: ModuleKind,
    #[serde(default)]
    rotation: Rotation,
    bounding_box: Vec3,
    #[serde(default)]
    mass: Option<f32>,
    color: Color,
    #[serde(default)]
    joint_limits: Option<JointLimit>,
}

impl Module {
    /// Creates a module of `kind` with its default dimensions and colour.
    pub fn new(kind: ModuleKind, rotation: impl Into<Rotation>) -> Self {
        Self {
            kind,
            rotation: rotation.into(),
            bounding_box: kind.default_bounding_box(),
            mass: None,
            color: kind.default_color(),
            joint_limits: None,
        }
    }

    pub fn core(rotation: impl Into<Rotation>) -> Self {
        Self::new(ModuleKind::Core, rotation)
    }

    pub fn brick(rotation: impl Into<Rotation>) -> Self {
        Self::new(ModuleKind::Brick, rotation)
    }

    pub fn active_hinge(rotation: impl Into<Rotation>) -> Self {
        Self::new(ModuleKind::ActiveHinge, rotation)
    }

    /// Overrides the default bounding box (full extents, not half extents).
    pub fn with_bounding_box(mut self, bounding_box: Vec3) -> Self {
        self.bounding_box = bounding_box.abs();
        self
    }

    /// Gives the module a mass in kg. Modules without one are massless.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass.max(0.0));
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Overrides the joint limits of an active hinge. Ignored by other kinds.
    pub fn with_joint_limits(mut self, limits: JointLimit) -> Self {
        self.joint_limits = Some(limits.normalized());
        self
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn bounding_box(&self) -> Vec3 {
        self.bounding_box
    }

    pub fn mass(&self) -> Option<f32> {
        self.mass
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn joint_limits(&self) -> Option<JointLimit> {
        self.joint_limits
    }

    /// The module's own rotation as a quaternion in its local frame.
    ///
    /// A core turns about its vertical (Z) axis. Every other module turns
    /// about the axis it was attached along (X).
    pub fn intrinsic_orientation(&self) -> Quat {
        match self.kind {
            ModuleKind::Core => Quat::from_rotation_z(self.rotation.radians()),
            ModuleKind::Brick | ModuleKind::ActiveHinge => {
                Quat::from_rotation_x(self.rotation.radians())
            }
        }
    }
}
