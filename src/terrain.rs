//! Stock terrains.

use crate::geometry::{Color, Geometry, Heightmap, MapType, Texture};
use crate::pose::Pose;
use crate::scene::Terrain;
use glam::{Vec2, Vec3};

const GROUND_PRIMARY: Color = Color::new(170, 170, 180, 255);
const GROUND_SECONDARY: Color = Color::new(150, 150, 150, 255);

fn ground_texture() -> Texture {
    Texture::checker(GROUND_PRIMARY, GROUND_SECONDARY, MapType::Map2d)
}

/// A flat checkered plane of `size` centred on the origin.
pub fn flat(size: Vec2) -> Terrain {
    Terrain::new(vec![Geometry::plane(Pose::IDENTITY, size, ground_texture())])
}

/// A bowl-shaped heightmap: flat at the centre, rising to `depth` at the rim.
///
/// The floor of the bowl sits at `z = 0`.
pub fn bowl(size: Vec2, depth: f32, resolution: usize) -> Terrain {
    let resolution = resolution.max(2);
    let heightmap = Heightmap::from_fn(
        Vec3::new(size.x, size.y, depth),
        depth.max(0.1),
        resolution,
        resolution,
        |x, y| {
            let u = 2.0 * x - 1.0;
            let v = 2.0 * y - 1.0;
            u * u + v * v
        },
    );
    Terrain::new(vec![Geometry::heightmap(
        Pose::IDENTITY,
        heightmap,
        ground_texture(),
    )])
}
