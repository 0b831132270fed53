// tests/body_tree.rs
use modular_body::{
    BodyError, BodyTree, Face, GridPosition, Module, ModuleId, ResolvedPose, SlotId,
};

fn setup() -> (BodyTree, ModuleId, ModuleId) {
    // Core -> back hinge -> brick, with a second hinge off the brick's left face.
    let mut tree = BodyTree::new();
    let hinge = tree
        .attach(tree.root(), SlotId::center(Face::Back), Module::active_hinge(0.4))
        .unwrap();
    let brick = tree
        .attach(hinge, SlotId::ATTACHMENT, Module::brick(-0.4))
        .unwrap();
    tree.attach(brick, SlotId::center(Face::Left), Module::active_hinge(0.0))
        .unwrap();
    (tree, hinge, brick)
}

fn placement(poses: &[ResolvedPose]) -> Vec<(Option<usize>, [f32; 7])> {
    // Ids change across detach/attach, so compare by depth-first position.
    poses
        .iter()
        .map(|p| {
            let parent = p
                .parent
                .and_then(|id| poses.iter().position(|q| q.id == id));
            let (t, q) = (p.pose.position, p.pose.orientation);
            (parent, [t.x, t.y, t.z, q.x, q.y, q.z, q.w])
        })
        .collect()
}

#[test]
fn test_module_count_tracks_attach_and_detach() {
    let (mut tree, _, brick) = setup();
    assert_eq!(tree.len(), 4, "core + 3 attached modules");

    tree.attach(brick, SlotId::center(Face::Right), Module::brick(0.0))
        .unwrap();
    assert_eq!(tree.len(), 5);

    let removed = tree.detach(tree.root(), SlotId::center(Face::Back)).unwrap();
    assert_eq!(removed.len(), 4, "hinge, brick and both of the brick's children");
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_occupied_slot_never_mutates() {
    let (mut tree, hinge, _) = setup();
    let before = tree.to_subtree();
    let version = tree.version();

    let err = tree
        .attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0))
        .unwrap_err();
    assert_eq!(
        err,
        BodyError::SlotOccupied {
            slot: SlotId::ATTACHMENT
        }
    );
    assert_eq!(tree.to_subtree(), before);
    assert_eq!(tree.version(), version);
}

#[test]
fn test_invalid_slots() {
    let (mut tree, hinge, _) = setup();
    let side = SlotId::center(Face::Left);
    assert!(matches!(
        tree.attach(hinge, side, Module::brick(0.0)),
        Err(BodyError::InvalidSlot { .. })
    ));
    assert!(matches!(
        tree.detach(hinge, side),
        Err(BodyError::InvalidSlot { .. })
    ));
}

#[test]
fn test_pose_resolution_is_idempotent() {
    let (tree, _, _) = setup();
    let first = tree.poses().to_vec();
    let second = tree.poses().to_vec();
    assert_eq!(first, second);

    // A fresh resolution of an identical copy is bit-identical too.
    let copy = BodyTree::from_subtree(tree.to_subtree()).unwrap();
    assert_eq!(placement(copy.poses()), placement(tree.poses()));
}

#[test]
fn test_detach_then_reattach_restores_body() {
    let (mut tree, _, _) = setup();
    let structure = tree.to_subtree();
    let poses = placement(tree.poses());

    let slot = SlotId::center(Face::Back);
    let subtree = tree.detach(tree.root(), slot).unwrap();
    assert_eq!(tree.len(), 1);
    tree.attach(tree.root(), slot, subtree).unwrap();

    assert_eq!(tree.to_subtree(), structure);
    assert_eq!(placement(tree.poses()), poses);
}

#[test]
fn test_mutation_invalidates_poses() {
    let (mut tree, hinge, _) = setup();
    let before = tree.pose(hinge).unwrap();

    // Growing the front must not move the back chain.
    tree.attach(
        tree.root(),
        SlotId::new(Face::Front, GridPosition::Top),
        Module::brick(0.0),
    )
    .unwrap();
    assert_eq!(tree.pose(hinge).unwrap(), before);
    assert_eq!(tree.poses().len(), 5);
}
