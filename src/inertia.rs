//! Coarse inertia estimates from a node/element discretization.
//!
//! The body's mass is spread evenly over node references, each node acting
//! as a point mass. Per element, the diagonal moments of its nodes about the
//! element centroid are summed, then the element is shifted to the body
//! origin with the parallel-axis term `m (|c|² I - c cᵀ)`. The body-frame
//! tensor is finally rotated into world axes by the body's orientation.
//!
//! This is an approximation. Products of inertia inside an element are
//! dropped and there is no continuum integration, so it is only fit for
//! coarse estimates, not high-fidelity dynamics. Use
//! [`Geometry::principal_inertia`] for primitives with a closed form.

use crate::error::{BodyError, Result};
use crate::geometry::{Geometry, Shape};
use crate::pose::Pose;
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// A body discretized into point nodes grouped into elements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscretizedBody {
    pub pose: Pose,
    /// Total mass in kg.
    pub mass: f32,
    nodes: Vec<Vec3>,
    elements: Vec<Vec<usize>>,
}

impl DiscretizedBody {
    pub fn new(pose: Pose, mass: f32) -> Self {
        Self {
            pose,
            mass,
            nodes: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Adds a node in the body frame and returns its index.
    pub fn add_node(&mut self, position: Vec3) -> usize {
        self.nodes.push(position);
        self.nodes.len() - 1
    }

    /// Adds an element over existing nodes and returns its index.
    pub fn add_element(&mut self, nodes: Vec<usize>) -> Result<usize> {
        let index = self.elements.len();
        self.check_element(index, &nodes)?;
        self.elements.push(nodes);
        Ok(index)
    }

    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Vec<usize>] {
        &self.elements
    }

    /// Samples a solid primitive on a regular `resolution`³ grid of cell
    /// centres, one node per element.
    ///
    /// Planes and heightmaps have no volume to sample.
    pub fn from_geometry(geometry: &Geometry, resolution: usize) -> Result<Self> {
        let n = resolution.max(1);
        let (extent, inside): (Vec3, Box<dyn Fn(Vec3) -> bool>) = match &geometry.shape {
            Shape::Box { size } => (*size, Box::new(|_: Vec3| true)),
            Shape::Cylinder { radius, length } => {
                let radius = *radius;
                (
                    Vec3::new(2.0 * radius, 2.0 * radius, *length),
                    Box::new(move |p: Vec3| p.x * p.x + p.y * p.y <= radius * radius),
                )
            }
            Shape::Plane { .. } => {
                return Err(BodyError::insufficient_geometry(0, "a plane has no volume"));
            }
            Shape::Heightmap(_) => {
                return Err(BodyError::insufficient_geometry(0, "a heightmap has no volume"));
            }
        };

        let mut body = Self::new(geometry.pose, geometry.mass);
        let cell = extent / n as f32;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let p = (Vec3::new(i as f32, j as f32, k as f32) + 0.5) * cell - extent / 2.0;
                    if inside(p) {
                        let node = body.add_node(p);
                        body.elements.push(vec![node]);
                    }
                }
            }
        }
        if body.elements.is_empty() {
            return Err(BodyError::insufficient_geometry(0, "no sample fell inside the solid"));
        }
        Ok(body)
    }

    /// Estimates the inertia tensor about the body origin, in world axes.
    pub fn inertia_tensor(&self) -> Result<Mat3> {
        let references: usize = self.elements.iter().map(Vec::len).sum();
        if references == 0 {
            return Ok(Mat3::ZERO);
        }
        let node_mass = self.mass / references as f32;

        let mut tensor = Mat3::ZERO;
        for (index, element) in self.elements.iter().enumerate() {
            let points = self.check_element(index, element)?;
            let count = points.len() as f32;
            let centroid = points.iter().sum::<Vec3>() / count;

            let mut moments = Vec3::ZERO;
            for p in &points {
                let r = *p - centroid;
                moments += node_mass
                    * Vec3::new(
                        r.y * r.y + r.z * r.z,
                        r.x * r.x + r.z * r.z,
                        r.x * r.x + r.y * r.y,
                    );
            }

            let element_mass = node_mass * count;
            let outer = Mat3::from_cols(
                centroid * centroid.x,
                centroid * centroid.y,
                centroid * centroid.z,
            );
            let shift = (Mat3::from_diagonal(Vec3::splat(centroid.length_squared())) - outer)
                * element_mass;
            tensor += Mat3::from_diagonal(moments) + shift;
        }

        let rotation = Mat3::from_quat(self.pose.orientation);
        Ok(rotation * tensor * rotation.transpose())
    }

    fn check_element(&self, index: usize, element: &[usize]) -> Result<Vec<Vec3>> {
        if element.is_empty() {
            return Err(BodyError::insufficient_geometry(index, "element references no nodes"));
        }
        element
            .iter()
            .map(|&node| {
                self.nodes.get(node).copied().ok_or_else(|| {
                    BodyError::insufficient_geometry(
                        index,
                        format!("node {node} out of range ({} nodes)", self.nodes.len()),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, Texture};
    use approx::assert_relative_eq;
    use glam::{Quat, Vec2};
    use std::f32::consts::FRAC_PI_2;

    fn texture() -> Texture {
        Texture::flat(Color::new(0, 0, 0, 255))
    }

    #[test]
    fn test_coincident_nodes_at_origin_contribute_nothing() {
        let mut body = DiscretizedBody::new(Pose::IDENTITY, 1.0);
        let nodes: Vec<_> = (0..3).map(|_| body.add_node(Vec3::ZERO)).collect();
        body.add_element(nodes).unwrap();
        assert_eq!(body.inertia_tensor().unwrap(), Mat3::ZERO);
    }

    #[test]
    fn test_coincident_nodes_away_from_origin_are_a_point_mass() {
        let mut body = DiscretizedBody::new(Pose::IDENTITY, 2.0);
        let nodes: Vec<_> = (0..3).map(|_| body.add_node(Vec3::X)).collect();
        body.add_element(nodes).unwrap();
        let tensor = body.inertia_tensor().unwrap();
        assert_relative_eq!(tensor.x_axis.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.y_axis.y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.z_axis.z, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangle_element() {
        let mut body = DiscretizedBody::new(Pose::IDENTITY, 1.0);
        let a = body.add_node(Vec3::ZERO);
        let b = body.add_node(Vec3::new(1.0, 0.0, 0.0));
        let c = body.add_node(Vec3::new(1.0, 1.0, 0.0));
        body.add_element(vec![a, b, c]).unwrap();

        let tensor = body.inertia_tensor().unwrap();
        assert_relative_eq!(tensor.x_axis.x, 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.y_axis.y, 2.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.z_axis.z, 1.0, epsilon = 1e-6);
        // Only the centroid shift contributes a product of inertia.
        assert_relative_eq!(tensor.x_axis.y, -2.0 / 9.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.y_axis.x, -2.0 / 9.0, epsilon = 1e-6);
    }

    #[test]
    fn test_orientation_rotates_tensor() {
        let pose = Pose::new(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2));
        let mut body = DiscretizedBody::new(pose, 1.0);
        let node = body.add_node(Vec3::X);
        body.add_element(vec![node]).unwrap();

        let tensor = body.inertia_tensor().unwrap();
        assert_relative_eq!(tensor.x_axis.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.y_axis.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(tensor.z_axis.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bad_elements_are_rejected() {
        let mut body = DiscretizedBody::new(Pose::IDENTITY, 1.0);
        body.add_node(Vec3::ZERO);

        let err = body.add_element(Vec::new()).unwrap_err();
        assert!(matches!(err, BodyError::InsufficientGeometry { element: 0, .. }));

        let err = body.add_element(vec![0, 4]).unwrap_err();
        assert!(err.to_string().contains("node 4"));
        assert!(body.elements().is_empty());
    }

    #[test]
    fn test_empty_body_has_zero_inertia() {
        let body = DiscretizedBody::new(Pose::IDENTITY, 1.0);
        assert_eq!(body.inertia_tensor().unwrap(), Mat3::ZERO);
    }

    #[test]
    fn test_uniform_box_converges_to_closed_form() {
        let geometry = Geometry::cuboid(Pose::IDENTITY, Vec3::new(0.2, 0.4, 0.6), 3.0, texture());
        let body = DiscretizedBody::from_geometry(&geometry, 20).unwrap();
        let estimate = body.inertia_tensor().unwrap();
        let exact = geometry.principal_inertia().unwrap();

        assert_relative_eq!(estimate.x_axis.x, exact.x, max_relative = 0.01);
        assert_relative_eq!(estimate.y_axis.y, exact.y, max_relative = 0.01);
        assert_relative_eq!(estimate.z_axis.z, exact.z, max_relative = 0.01);
        assert_relative_eq!(estimate.x_axis.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cylinder_samples_stay_inside() {
        let geometry = Geometry::cylinder(Pose::IDENTITY, 0.5, 1.0, 1.0, texture());
        let body = DiscretizedBody::from_geometry(&geometry, 10).unwrap();
        assert!(body.nodes().iter().all(|p| p.x * p.x + p.y * p.y <= 0.25));
        assert!(body.nodes().len() < 1000);
    }

    #[test]
    fn test_plane_cannot_be_discretized() {
        let plane = Geometry::plane(Pose::IDENTITY, Vec2::ONE, texture());
        assert!(matches!(
            DiscretizedBody::from_geometry(&plane, 4),
            Err(BodyError::InsufficientGeometry { .. })
        ));
    }
}
