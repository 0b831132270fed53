//! Simulator-facing geometry and the builder that derives it from a body.
//!
//! A [`Geometry`] is an immutable snapshot: a primitive shape at a world pose
//! with a mass and a texture. It holds no reference to the module it came
//! from. Hinges additionally carry a [`HingeJoint`] so the simulator can
//! instantiate the articulated degree of freedom.

use crate::config::BuildConfig;
use crate::error::Result;
#[cfg(doc)]
use crate::error::BodyError;
use crate::module::ModuleKind;
use crate::pose::Pose;
use crate::tree::{FrozenBody, HingeId};
use bevy_heavy::ComputeMassProperties3d;
use bevy_math::primitives::{Cuboid, Cylinder};
use glam::{Vec2, Vec3, Vec3Swizzles};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An RGBA colour, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channels scaled to `[0, 1]`.
    pub fn to_normalized(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a].map(|c| c as f32 / 255.0)
    }
}

/// How a texture is projected onto its geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapType {
    /// Wrapped around all six faces.
    #[default]
    Cube,
    /// Projected onto a plane, for ground surfaces.
    Map2d,
}

/// Surface appearance of a geometry.
///
/// A texture without a secondary colour is flat; with one it is a checker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub primary_color: Color,
    pub secondary_color: Option<Color>,
    pub map_type: MapType,
}

impl Texture {
    pub fn flat(color: Color) -> Self {
        Self {
            primary_color: color,
            secondary_color: None,
            map_type: MapType::Cube,
        }
    }

    pub fn checker(primary: Color, secondary: Color, map_type: MapType) -> Self {
        Self {
            primary_color: primary,
            secondary_color: Some(secondary),
            map_type,
        }
    }
}

/// Limits for a hinge's motion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    /// Minimum angle (radians).
    pub min: f32,
    /// Maximum angle (radians).
    pub max: f32,
    /// Maximum torque (Nm) the servo can apply.
    pub effort: f32,
    /// Maximum angular velocity (rad/s).
    pub velocity: f32,
}

impl Default for JointLimit {
    fn default() -> Self {
        Self {
            min: -1.047_197_6,
            max: 1.047_197_6,
            effort: 0.948_013_3,
            velocity: 6.338_968,
        }
    }
}

impl JointLimit {
    /// Swaps `min` and `max` if they are inverted.
    pub fn normalized(self) -> Self {
        if self.min <= self.max {
            self
        } else {
            Self {
                min: self.max,
                max: self.min,
                ..self
            }
        }
    }
}

/// Articulation carried by the geometry of an active hinge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HingeJoint {
    /// Stable id the control subsystem addresses this hinge by.
    pub hinge: HingeId,
    /// World-space point the joint rotates about.
    pub anchor: Vec3,
    /// World-space unit rotation axis.
    pub axis: Vec3,
    pub limits: JointLimit,
}

/// A rectangular grid of normalized heights in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heightmap {
    /// Extent along x and y, and the height a value of `1.0` maps to.
    pub size: Vec3,
    /// Thickness of the solid slab below height zero.
    pub base_thickness: f32,
    heights: Vec<Vec<f32>>,
}

impl Heightmap {
    /// Samples `height(x, y)` on a `rows` by `columns` grid.
    ///
    /// `x` and `y` run over `[0, 1]`; results are clamped to `[0, 1]`.
    pub fn from_fn(
        size: Vec3,
        base_thickness: f32,
        rows: usize,
        columns: usize,
        height: impl Fn(f32, f32) -> f32,
    ) -> Self {
        let step = |i: usize, n: usize| if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
        let heights = (0..rows)
            .map(|i| {
                (0..columns)
                    .map(|j| height(step(j, columns), step(i, rows)).clamp(0.0, 1.0))
                    .collect()
            })
            .collect();
        Self {
            size,
            base_thickness,
            heights,
        }
    }

    pub fn rows(&self) -> usize {
        self.heights.len()
    }

    pub fn columns(&self) -> usize {
        self.heights.first().map_or(0, Vec::len)
    }

    pub fn heights(&self) -> &[Vec<f32>] {
        &self.heights
    }
}

/// Supported geometric primitives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Ground plane; `size` is its visual extent.
    Plane { size: Vec2 },
    /// A box defined by full extents (x, y, z).
    Box { size: Vec3 },
    /// A cylinder aligned along its local Z axis.
    Cylinder { radius: f32, length: f32 },
    /// A height field.
    Heightmap(Heightmap),
}

/// A type-erased wrapper so we can call [`ComputeMassProperties3d`] on any solid.
#[derive(Clone, Copy, Debug)]
pub enum BevyPrimitive {
    Cuboid(Cuboid),
    Cylinder(Cylinder),
}

impl ComputeMassProperties3d for BevyPrimitive {
    fn mass(&self, density: f32) -> f32 {
        match self {
            Self::Cuboid(s) => s.mass(density),
            Self::Cylinder(s) => s.mass(density),
        }
    }

    fn unit_principal_angular_inertia(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.unit_principal_angular_inertia(),
            // bevy cylinders stand along Y, ours along Z.
            Self::Cylinder(s) => s.unit_principal_angular_inertia().xzy(),
        }
    }

    fn center_of_mass(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.center_of_mass(),
            Self::Cylinder(s) => s.center_of_mass().xzy(),
        }
    }
}

impl Shape {
    /// The corresponding `bevy_math` solid, if the shape has a finite volume.
    pub fn to_bevy_primitive(&self) -> Option<BevyPrimitive> {
        match self {
            Self::Box { size } => Some(BevyPrimitive::Cuboid(Cuboid {
                half_size: *size / 2.0,
            })),
            Self::Cylinder { radius, length } => {
                Some(BevyPrimitive::Cylinder(Cylinder::new(*radius, *length)))
            }
            Self::Plane { .. } | Self::Heightmap(_) => None,
        }
    }
}

/// One primitive of a scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub pose: Pose,
    /// Mass in kg. Zero means static / kinematic.
    pub mass: f32,
    pub texture: Texture,
    pub shape: Shape,
    #[serde(default)]
    pub joint: Option<HingeJoint>,
}

impl Geometry {
    pub fn plane(pose: Pose, size: Vec2, texture: Texture) -> Self {
        Self::new(pose, 0.0, texture, Shape::Plane { size })
    }

    pub fn cuboid(pose: Pose, size: Vec3, mass: f32, texture: Texture) -> Self {
        Self::new(pose, mass, texture, Shape::Box { size })
    }

    pub fn cylinder(pose: Pose, radius: f32, length: f32, mass: f32, texture: Texture) -> Self {
        Self::new(pose, mass, texture, Shape::Cylinder { radius, length })
    }

    pub fn heightmap(pose: Pose, heightmap: Heightmap, texture: Texture) -> Self {
        Self::new(pose, 0.0, texture, Shape::Heightmap(heightmap))
    }

    fn new(pose: Pose, mass: f32, texture: Texture, shape: Shape) -> Self {
        Self {
            pose,
            mass,
            texture,
            shape,
            joint: None,
        }
    }

    /// Whether the simulator should treat this geometry as immovable.
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }

    /// Principal moments of inertia about the geometry's centre, in its
    /// local frame, for a uniform solid of this mass.
    ///
    /// `None` for planes and heightmaps.
    pub fn principal_inertia(&self) -> Option<Vec3> {
        self.shape
            .to_bevy_primitive()
            .map(|solid| solid.unit_principal_angular_inertia() * self.mass)
    }
}

/// Turns every module of `body` into a geometry, in depth-first order.
///
/// `placement` is applied on top of the body's own root pose, which lets one
/// scene host several robots. Cores and bricks become plain boxes; active
/// hinges become a box plus a [`HingeJoint`] rotating about the hinge's
/// local Y axis through its centre.
///
/// Fails with [`BodyError::SelfIntersection`] when the configuration asks for
/// self-intersecting bodies to be rejected and two modules overlap.
pub fn build_robot_geometries(
    body: &FrozenBody,
    placement: &Pose,
    config: &BuildConfig,
) -> Result<Vec<Geometry>> {
    if config.reject_self_intersection
        && let Err(err) = body.validate(config.contact_tolerance)
    {
        warn!(%err, "Rejected self-intersecting body");
        return Err(err);
    }

    let tree = body.tree();
    let mut geometries = Vec::with_capacity(body.len());

    for resolved in body.poses() {
        let Some(module) = tree.module(resolved.id) else {
            continue;
        };
        let pose = placement.compose(&resolved.pose);
        let mut geometry = Geometry::cuboid(
            pose,
            module.bounding_box(),
            module.mass().unwrap_or(0.0),
            Texture::flat(module.color()),
        );

        match module.kind() {
            ModuleKind::Core | ModuleKind::Brick => {}
            ModuleKind::ActiveHinge => {
                if let Some(hinge) = body.hinge(resolved.id) {
                    geometry.joint = Some(HingeJoint {
                        hinge,
                        anchor: pose.position,
                        axis: pose.left().normalize(),
                        limits: module.joint_limits().unwrap_or(config.hinge_limits),
                    });
                }
            }
        }
        geometries.push(geometry);
    }

    debug!(
        modules = body.len(),
        hinges = body.active_hinges().len(),
        "Built robot geometry"
    );
    Ok(geometries)
}
