//! Named reference robots.
//!
//! The catalog is a constant lookup table of constructor functions, so every
//! call hands out a fresh, independently owned body.

use crate::error::{BodyError, Result};
use crate::module::{Module, RightAngle};
use crate::slot::{Face, GridPosition, SlotId};
use crate::tree::{BodyTree, Subtree};
use glam::Vec3;
use std::f32::consts::FRAC_PI_2;

const CATALOG: [(&str, fn() -> Result<BodyTree>); 2] = [("gecko", gecko), ("darts", darts)];

/// Names of all catalog robots.
pub fn names() -> Vec<&'static str> {
    CATALOG.iter().map(|(name, _)| *name).collect()
}

/// Builds the robot called `name`.
pub fn get(name: &str) -> Result<BodyTree> {
    match CATALOG.iter().find(|(candidate, _)| *candidate == name) {
        Some((_, build)) => build(),
        None => Err(BodyError::NameNotFound {
            name: name.to_owned(),
            valid: names(),
        }),
    }
}

/// Builds every catalog robot, in catalog order.
pub fn all() -> Result<Vec<BodyTree>> {
    CATALOG.iter().map(|(_, build)| build()).collect()
}

/// A hinge with a brick on its far end.
fn leg() -> Result<Subtree> {
    Subtree::new(Module::active_hinge(0.0)).with(SlotId::ATTACHMENT, Module::brick(0.0))
}

/// Four-legged walker: two legs on the core, a two-segment spine out the
/// back and two more legs on the rear brick.
pub fn gecko() -> Result<BodyTree> {
    let mut body = BodyTree::new();
    let core = body.root();

    body.attach(core, SlotId::new(Face::Right, GridPosition::Bottom), leg()?)?;
    body.attach(core, SlotId::new(Face::Left, GridPosition::Bottom), leg()?)?;

    let rear = Subtree::new(Module::brick(-FRAC_PI_2))
        .with(SlotId::center(Face::Left), leg()?)?
        .with(SlotId::center(Face::Right), leg()?)?;
    let spine = Subtree::new(Module::brick(-FRAC_PI_2)).with(
        SlotId::center(Face::Front),
        Subtree::new(Module::active_hinge(FRAC_PI_2)).with(SlotId::ATTACHMENT, rear)?,
    )?;
    body.attach(
        core,
        SlotId::new(Face::Back, GridPosition::Bottom),
        Subtree::new(Module::active_hinge(FRAC_PI_2)).with(SlotId::ATTACHMENT, spine)?,
    )?;

    Ok(body)
}

/// Wide, rotated core with a six-hinge tail ending in a brick.
pub fn darts() -> Result<BodyTree> {
    let core = Module::core(RightAngle::Deg270).with_bounding_box(Vec3::new(0.35, 0.15, 0.35));
    let mut body = BodyTree::with_core(core)?;

    let mut tail = leg()?;
    for _ in 0..5 {
        tail = Subtree::new(Module::active_hinge(0.0)).with(SlotId::ATTACHMENT, tail)?;
    }
    body.attach(body.root(), SlotId::center(Face::Right), tail)?;

    Ok(body)
}
