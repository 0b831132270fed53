//! # modular-body
//!
//! Body plans for modular robots, expressed as typed trees of rigid modules
//! and turned into engine-agnostic scene geometry using glam.
//!
//! A [`BodyTree`] is rooted at a single core. Bricks and active hinges attach
//! to named slots on their parent's faces. Once the design is done the tree
//! is frozen, its poses are resolved depth first, and every module becomes a
//! [`Geometry`] that a simulator (MuJoCo, Bevy/Avian, Gazebo) can ingest as
//! part of a [`Scene`] alongside static terrain.

pub mod catalog;
pub mod collision;
pub mod config;
pub mod error;
pub mod geometry;
pub mod inertia;
pub mod module;
pub mod pose;
pub mod scene;
pub mod slot;
pub mod terrain;
pub mod tree;

pub use collision::*;
pub use config::*;
pub use error::BodyError;
pub use geometry::*;
pub use inertia::*;
pub use module::*;
pub use pose::*;
pub use scene::*;
pub use slot::*;
pub use tree::*;
