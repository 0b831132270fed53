//! Scene assembly: robot geometry plus static terrain, in a stable order.

use crate::config::BuildConfig;
use crate::error::{BodyError, Result};
use crate::geometry::{Geometry, build_robot_geometries};
use crate::pose::Pose;
use crate::tree::FrozenBody;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::info;

/// A collection of static geometries a robot moves over.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub static_geometry: Vec<Geometry>,
}

impl Terrain {
    pub fn new(static_geometry: Vec<Geometry>) -> Self {
        Self { static_geometry }
    }

    /// Adds an obstacle (builder pattern).
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.static_geometry.push(geometry);
        self
    }
}

/// The complete, ordered set of primitives handed to a simulator.
///
/// Terrain comes first, then each robot's geometry as one contiguous run.
/// The order is stable, so two assemblies of the same input compare equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    geometries: Vec<Geometry>,
    terrain_len: usize,
    robots: Vec<Range<usize>>,
}

impl Scene {
    /// Aggregates per-robot geometry lists and terrain into one scene.
    ///
    /// Fails with [`BodyError::MissingTerrain`] if `terrain` is empty.
    pub fn build<R>(robots: R, terrain: Vec<Geometry>) -> Result<Scene>
    where
        R: IntoIterator<Item = Vec<Geometry>>,
    {
        if terrain.is_empty() {
            return Err(BodyError::MissingTerrain);
        }
        let terrain_len = terrain.len();
        let mut geometries = terrain;
        let mut spans = Vec::new();
        for robot in robots {
            let start = geometries.len();
            geometries.extend(robot);
            spans.push(start..geometries.len());
        }
        Ok(Scene {
            geometries,
            terrain_len,
            robots: spans,
        })
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn terrain(&self) -> &[Geometry] {
        &self.geometries[..self.terrain_len]
    }

    pub fn robot_count(&self) -> usize {
        self.robots.len()
    }

    /// Geometry of the `index`-th robot, in insertion order.
    pub fn robot(&self, index: usize) -> Option<&[Geometry]> {
        self.robots
            .get(index)
            .and_then(|span| self.geometries.get(span.clone()))
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

/// Collects frozen bodies at placements over a terrain and assembles a scene.
#[derive(Clone, Debug)]
pub struct SceneBuilder {
    terrain: Terrain,
    robots: Vec<(FrozenBody, Pose)>,
    config: BuildConfig,
}

impl SceneBuilder {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            robots: Vec::new(),
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Places `body` at `placement`, on top of its own root pose. Returns the
    /// robot's index in the scene.
    pub fn add_robot(&mut self, body: FrozenBody, placement: Pose) -> usize {
        self.robots.push((body, placement));
        self.robots.len() - 1
    }

    /// Builds every robot, then assembles. Nothing is returned unless every
    /// robot builds.
    pub fn build(&self) -> Result<Scene> {
        let robots = self
            .robots
            .iter()
            .map(|(body, placement)| build_robot_geometries(body, placement, &self.config))
            .collect::<Result<Vec<_>>>()?;
        let scene = Scene::build(robots, self.terrain.static_geometry.clone())?;
        info!(
            robots = scene.robot_count(),
            geometries = scene.len(),
            "Assembled scene"
        );
        Ok(scene)
    }
}
