//! The body tree: an arena of modules plus a slot-occupancy table.
//!
//! Modules live in a generational arena. Parent/child links are not stored
//! inside modules; they are entries of a table keyed by `(parent, slot)`.
//! Attaching and detaching are table edits. Arena slots freed by a detach are
//! reused, but with a bumped generation, so a stale id never aliases a newer
//! module. Every tree also carries a process-unique tag that its ids inherit,
//! so an id handed out by one tree is rejected by every other.

use crate::error::{BodyError, Result};
use crate::module::{Module, ModuleKind};
use crate::pose::{Pose, ResolvedPose, resolve_poses};
use crate::slot::{Face, GridPosition, SlotId};
use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const FIRST_SLOT: SlotId = SlotId::new(Face::Front, GridPosition::TopLeft);
const LAST_SLOT: SlotId = SlotId::new(Face::Right, GridPosition::BottomRight);

static NEXT_TAG: AtomicU64 = AtomicU64::new(0);

fn next_tag() -> u64 {
    NEXT_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Arena position of a module, valid only while its generation matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    /// The core never leaves arena index 0.
    const CORE: Key = Key {
        index: 0,
        generation: 0,
    };
}

/// Handle of a module within the [`BodyTree`] that issued it.
///
/// Ids carry the issuing tree's tag and the arena generation. An id from
/// another tree, or one whose module has been detached, is reported as
/// [`BodyError::DetachedParent`] instead of resolving to whatever occupies
/// the same arena index now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    tree: u64,
    index: u32,
    generation: u32,
}

impl ModuleId {
    /// Arena index. Reused after a detach, so only unique together with
    /// [`ModuleId::generation`].
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    fn key(self) -> Key {
        Key {
            index: self.index,
            generation: self.generation,
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({}v{})", self.index, self.generation)
    }
}

/// A child hanging off one slot of a [`Subtree`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub slot: SlotId,
    pub child: Subtree,
}

/// An owned, detached piece of body: a module and everything below it.
///
/// Returned by [`BodyTree::detach`] and accepted by [`BodyTree::attach`].
/// Also the natural way to author nested designs before attaching them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subtree {
    module: Module,
    #[serde(default)]
    children: Vec<Attachment>,
}

impl From<Module> for Subtree {
    fn from(module: Module) -> Self {
        Self::new(module)
    }
}

impl Subtree {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            children: Vec::new(),
        }
    }

    /// Attaches `child` at `slot` (builder pattern).
    pub fn with(mut self, slot: SlotId, child: impl Into<Subtree>) -> Result<Self> {
        self.insert(slot, child)?;
        Ok(self)
    }

    /// Attaches `child` at `slot`, keeping children in slot order.
    pub fn insert(&mut self, slot: SlotId, child: impl Into<Subtree>) -> Result<()> {
        let child = child.into();
        if !self.module.kind().offers(slot) {
            return Err(BodyError::InvalidSlot {
                kind: self.module.kind(),
                slot,
            });
        }
        if child.contains_core() {
            return Err(BodyError::DuplicateCore);
        }
        if self.children.iter().any(|a| a.slot == slot) {
            return Err(BodyError::SlotOccupied { slot });
        }
        self.children.push(Attachment { slot, child });
        self.children.sort_by_key(|a| a.slot);
        Ok(())
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn children(&self) -> &[Attachment] {
        &self.children
    }

    pub fn child(&self, slot: SlotId) -> Option<&Subtree> {
        self.children
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| &a.child)
    }

    /// Number of modules in this subtree, including its root.
    pub fn len(&self) -> usize {
        self.descendants().count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether any module in this subtree, including its root, is a core.
    pub fn contains_core(&self) -> bool {
        self.descendants()
            .any(|s| s.module.kind() == ModuleKind::Core)
    }

    /// Checks that every child sits on an offered, distinct slot and that no
    /// core appears below the root.
    ///
    /// [`Subtree::insert`] upholds this already; deserialized subtrees have
    /// not been through it.
    pub fn validate(&self) -> Result<()> {
        for subtree in self.descendants() {
            let kind = subtree.module.kind();
            let mut seen = BTreeSet::new();
            for Attachment { slot, child } in &subtree.children {
                if !kind.offers(*slot) {
                    return Err(BodyError::InvalidSlot { kind, slot: *slot });
                }
                if !seen.insert(*slot) {
                    return Err(BodyError::SlotOccupied { slot: *slot });
                }
                if child.module.kind() == ModuleKind::Core {
                    return Err(BodyError::DuplicateCore);
                }
            }
        }
        Ok(())
    }

    /// Every module of this subtree, root first, walked with an explicit
    /// stack so long chains cannot exhaust the call stack.
    fn descendants(&self) -> impl Iterator<Item = &Subtree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev().map(|a| &a.child));
            Some(next)
        })
    }
}

/// A non-core module and the slot it occupies.
#[derive(Clone, Debug)]
struct Node {
    module: Module,
    parent: (Key, SlotId),
}

#[derive(Clone, Debug)]
struct Entry {
    generation: u32,
    node: Option<Node>,
}

/// Rebuilds an owned subtree from a depth-first listing. Each listed module
/// names its parent by position: 0 is `root`, `n` the n-th listed module.
fn assemble(root: Module, below: Vec<(Module, usize, SlotId)>) -> Subtree {
    let mut root = Subtree::new(root);
    let links: Vec<_> = below.iter().map(|&(_, parent, slot)| (parent, slot)).collect();
    let mut built: Vec<Option<Subtree>> = below
        .into_iter()
        .map(|(module, _, _)| Some(Subtree::new(module)))
        .collect();

    // Children are listed after their parent, so walking backwards finishes
    // every subtree before it is hung on its parent.
    for (position, &(parent, slot)) in links.iter().enumerate().rev() {
        let Some(child) = built.get_mut(position).and_then(Option::take) else {
            continue;
        };
        let attachment = Attachment { slot, child };
        if parent == 0 {
            root.children.insert(0, attachment);
        } else if let Some(Some(subtree)) = built.get_mut(parent - 1) {
            subtree.children.insert(0, attachment);
        }
    }
    root
}

/// The rooted tree of modules describing one robot's morphology.
///
/// Always rooted at exactly one core. Poses are derived state: they are
/// memoized per structural version and dropped on every mutation.
///
/// A clone is a separate body with a fresh tag: ids of the original are
/// rejected by the copy and vice versa. Use [`BodyTree::children`] from the
/// copy's [`BodyTree::root`] to address its modules.
///
/// Not safe for concurrent writers. Share a [`FrozenBody`] between readers.
#[derive(Debug)]
pub struct BodyTree {
    tag: u64,
    core: Module,
    /// Index 0 is reserved for the core and never holds a node.
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
    slots: BTreeMap<(Key, SlotId), Key>,
    root_pose: Pose,
    version: u64,
    poses: OnceLock<Vec<ResolvedPose>>,
}

impl Default for BodyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BodyTree {
    fn clone(&self) -> Self {
        Self {
            tag: next_tag(),
            core: self.core.clone(),
            entries: self.entries.clone(),
            free: self.free.clone(),
            live: self.live,
            slots: self.slots.clone(),
            root_pose: self.root_pose,
            version: self.version,
            poses: OnceLock::new(),
        }
    }
}

impl BodyTree {
    /// Creates a body holding only a default, unrotated core.
    pub fn new() -> Self {
        Self {
            tag: next_tag(),
            core: Module::core(0.0),
            entries: vec![Entry {
                generation: 0,
                node: None,
            }],
            free: Vec::new(),
            live: 0,
            slots: BTreeMap::new(),
            root_pose: Pose::IDENTITY,
            version: 0,
            poses: OnceLock::new(),
        }
    }

    /// Creates a body rooted at `core`.
    pub fn with_core(core: Module) -> Result<Self> {
        if core.kind() != ModuleKind::Core {
            return Err(BodyError::InvalidRoot(core.kind()));
        }
        Ok(Self {
            core,
            ..Self::new()
        })
    }

    /// Rebuilds a body from a complete design whose root is a core.
    pub fn from_subtree(design: Subtree) -> Result<Self> {
        design.validate()?;
        let Subtree { module, children } = design;
        let mut tree = Self::with_core(module)?;
        for Attachment { slot, child } in children {
            tree.insert((Key::CORE, slot), child)?;
        }
        Ok(tree)
    }

    /// The core's id. Always valid.
    pub fn root(&self) -> ModuleId {
        self.id(Key::CORE)
    }

    pub fn root_pose(&self) -> Pose {
        self.root_pose
    }

    /// Places the core. Defaults to the identity pose.
    pub fn set_root_pose(&mut self, pose: Pose) {
        self.root_pose = pose;
        self.invalidate();
    }

    /// Structural version, bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.key(id).and_then(|key| self.module_at(key))
    }

    /// Whether `id` was issued by this tree and is still reachable from the core.
    pub fn contains(&self, id: ModuleId) -> bool {
        self.key(id).is_some()
    }

    /// Number of modules reachable from the core, the core included.
    pub fn len(&self) -> usize {
        1 + self.live
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The module `id` hangs from and the slot it occupies.
    pub fn parent(&self, id: ModuleId) -> Option<(ModuleId, SlotId)> {
        let node = self.node(self.key(id)?)?;
        let (parent, slot) = node.parent;
        Some((self.id(parent), slot))
    }

    pub fn child(&self, parent: ModuleId, slot: SlotId) -> Option<ModuleId> {
        let key = self.key(parent)?;
        self.slots.get(&(key, slot)).map(|&child| self.id(child))
    }

    /// Occupied slots of `parent`, in slot order. Empty for foreign or
    /// stale ids.
    pub fn children(&self, parent: ModuleId) -> impl Iterator<Item = (SlotId, ModuleId)> + '_ {
        self.key(parent)
            .into_iter()
            .flat_map(move |key| self.child_keys(key))
            .map(move |(slot, child)| (slot, self.id(child)))
    }

    /// All reachable modules, the core first, then in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        let attached = self.entries.iter().enumerate().filter_map(move |(index, entry)| {
            let node = entry.node.as_ref()?;
            let key = Key {
                index: u32::try_from(index).ok()?,
                generation: entry.generation,
            };
            Some((self.id(key), &node.module))
        });
        std::iter::once((self.root(), &self.core)).chain(attached)
    }

    /// Attaches `subtree` at `slot` of `parent` and returns the id of its root.
    ///
    /// Fails without touching the tree if `parent` is not part of this body,
    /// the slot is not offered by the parent's kind, the slot is taken, the
    /// subtree holds a core, or the arena has no room left for it.
    pub fn attach(
        &mut self,
        parent: ModuleId,
        slot: SlotId,
        subtree: impl Into<Subtree>,
    ) -> Result<ModuleId> {
        let subtree = subtree.into();
        let (key, kind) = self.resolve(parent)?;
        if !kind.offers(slot) {
            return Err(BodyError::InvalidSlot { kind, slot });
        }
        if self.slots.contains_key(&(key, slot)) {
            return Err(BodyError::SlotOccupied { slot });
        }
        if subtree.contains_core() {
            return Err(BodyError::DuplicateCore);
        }
        subtree.validate()?;
        let count = subtree.len();
        if count > self.capacity() {
            return Err(BodyError::CapacityExceeded { requested: count });
        }

        let child = self.insert((key, slot), subtree)?;
        self.invalidate();
        let id = self.id(child);
        debug!(%parent, %slot, child = %id, modules = count, "Attached subtree");
        Ok(id)
    }

    /// Removes whatever hangs at `slot` of `parent` and hands it back.
    ///
    /// Ids of the removed modules become invalid for good.
    pub fn detach(&mut self, parent: ModuleId, slot: SlotId) -> Result<Subtree> {
        let (key, kind) = self.resolve(parent)?;
        if !kind.offers(slot) {
            return Err(BodyError::InvalidSlot { kind, slot });
        }
        let child = self
            .slots
            .get(&(key, slot))
            .copied()
            .ok_or(BodyError::EmptySlot { slot })?;
        let subtree = self.remove(child).ok_or(BodyError::EmptySlot { slot })?;
        self.invalidate();
        debug!(%parent, %slot, modules = subtree.len(), "Detached subtree");
        Ok(subtree)
    }

    /// World poses of all modules in depth-first order, memoized until the
    /// next mutation.
    pub fn poses(&self) -> &[ResolvedPose] {
        self.poses.get_or_init(|| resolve_poses(self))
    }

    pub fn pose(&self, id: ModuleId) -> Option<Pose> {
        self.poses().iter().find(|p| p.id == id).map(|p| p.pose)
    }

    /// Copies the whole body out as a design rooted at the core.
    pub fn to_subtree(&self) -> Subtree {
        let below = self
            .walk(Key::CORE)
            .into_iter()
            .map(|(_, module, parent, slot)| (module.clone(), parent, slot))
            .collect();
        assemble(self.core.clone(), below)
    }

    /// Ends the design phase.
    pub fn freeze(self) -> FrozenBody {
        FrozenBody::new(self)
    }

    fn id(&self, key: Key) -> ModuleId {
        ModuleId {
            tree: self.tag,
            index: key.index,
            generation: key.generation,
        }
    }

    /// The arena key behind `id`, if this tree issued it and it is still live.
    fn key(&self, id: ModuleId) -> Option<Key> {
        if id.tree != self.tag {
            return None;
        }
        let key = id.key();
        self.module_at(key).map(|_| key)
    }

    fn resolve(&self, id: ModuleId) -> Result<(Key, ModuleKind)> {
        self.key(id)
            .and_then(|key| Some((key, self.module_at(key)?.kind())))
            .ok_or(BodyError::DetachedParent(id))
    }

    fn node(&self, key: Key) -> Option<&Node> {
        self.entries
            .get(key.index as usize)
            .filter(|entry| entry.generation == key.generation)
            .and_then(|entry| entry.node.as_ref())
    }

    fn module_at(&self, key: Key) -> Option<&Module> {
        if key == Key::CORE {
            Some(&self.core)
        } else {
            self.node(key).map(|node| &node.module)
        }
    }

    fn child_keys(&self, parent: Key) -> impl Iterator<Item = (SlotId, Key)> + '_ {
        self.slots
            .range((parent, FIRST_SLOT)..=(parent, LAST_SLOT))
            .map(|(&(_, slot), &child)| (slot, child))
    }

    /// Modules strictly below `root` in depth-first slot order, each with
    /// the position of its parent as [`assemble`] expects it.
    fn walk(&self, root: Key) -> Vec<(Key, &Module, usize, SlotId)> {
        let mut below = Vec::new();
        let mut stack: Vec<_> = self
            .child_keys(root)
            .map(|(slot, child)| (child, 0, slot))
            .collect();
        stack.reverse();
        while let Some((key, parent, slot)) = stack.pop() {
            let Some(module) = self.module_at(key) else {
                continue;
            };
            below.push((key, module, parent, slot));
            let position = below.len();
            let mut children: Vec<_> = self
                .child_keys(key)
                .map(|(slot, child)| (child, position, slot))
                .collect();
            children.reverse();
            stack.append(&mut children);
        }
        below
    }

    /// Slots still available to new modules.
    fn capacity(&self) -> usize {
        let fresh = usize::try_from(u32::MAX)
            .unwrap_or(usize::MAX)
            .saturating_sub(self.entries.len());
        self.free.len().saturating_add(fresh)
    }

    fn invalidate(&mut self) {
        self.version += 1;
        self.poses = OnceLock::new();
    }

    fn alloc(&mut self, node: Node) -> Result<Key> {
        if let Some(index) = self.free.pop()
            && let Some(entry) = self.entries.get_mut(index as usize)
        {
            entry.node = Some(node);
            self.live += 1;
            return Ok(Key {
                index,
                generation: entry.generation,
            });
        }
        let index = u32::try_from(self.entries.len())
            .map_err(|_| BodyError::CapacityExceeded { requested: 1 })?;
        self.entries.push(Entry {
            generation: 0,
            node: Some(node),
        });
        self.live += 1;
        Ok(Key {
            index,
            generation: 0,
        })
    }

    /// Frees `key` and unlinks it from its parent's slot.
    fn release(&mut self, key: Key) -> Option<Node> {
        let entry = self
            .entries
            .get_mut(key.index as usize)
            .filter(|entry| entry.generation == key.generation)?;
        let node = entry.node.take()?;
        // A slot whose generation would wrap is retired instead of reused.
        if let Some(next) = entry.generation.checked_add(1) {
            entry.generation = next;
            self.free.push(key.index);
        }
        self.live -= 1;
        self.slots.remove(&node.parent);
        Some(node)
    }

    fn place(&mut self, at: (Key, SlotId), module: Module) -> Result<Key> {
        let key = self.alloc(Node { module, parent: at })?;
        self.slots.insert(at, key);
        Ok(key)
    }

    /// Places `subtree` at `at`, numbering modules depth first in slot order.
    fn insert(&mut self, at: (Key, SlotId), subtree: Subtree) -> Result<Key> {
        let Subtree { module, children } = subtree;
        let root = self.place(at, module)?;
        let mut stack: Vec<_> = children
            .into_iter()
            .rev()
            .map(|a| ((root, a.slot), a.child))
            .collect();
        while let Some((at, Subtree { module, children })) = stack.pop() {
            let key = self.place(at, module)?;
            stack.extend(children.into_iter().rev().map(|a| ((key, a.slot), a.child)));
        }
        Ok(root)
    }

    fn remove(&mut self, key: Key) -> Option<Subtree> {
        let below: Vec<_> = self
            .walk(key)
            .into_iter()
            .map(|(child, _, parent, slot)| (child, parent, slot))
            .collect();
        let root = self.release(key)?;
        let mut modules = Vec::with_capacity(below.len());
        for (child, parent, slot) in below {
            if let Some(node) = self.release(child) {
                modules.push((node.module, parent, slot));
            }
        }
        Some(assemble(root.module, modules))
    }
}

/// Stable identifier of an active hinge within a [`FrozenBody`].
///
/// Hinges are numbered in depth-first order, so a brain can address the
/// same hinge across simulation steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HingeId(pub usize);

/// An active hinge as seen by a control subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HingeHandle {
    pub id: HingeId,
    pub module: ModuleId,
    pub cell: IVec3,
}

/// A body whose design phase is over.
///
/// Poses are resolved once on freezing and the structure can no longer be
/// edited, so a frozen body is safe to share between readers.
#[derive(Debug)]
pub struct FrozenBody {
    tree: BodyTree,
    hinges: Vec<HingeHandle>,
}

/// Unlike a [`BodyTree`] clone, a frozen copy keeps its tag, so module ids
/// and hinge handles stay valid across copies of the same frozen body.
impl Clone for FrozenBody {
    fn clone(&self) -> Self {
        let tree = BodyTree {
            tag: self.tree.tag,
            poses: self.tree.poses.clone(),
            ..self.tree.clone()
        };
        Self {
            tree,
            hinges: self.hinges.clone(),
        }
    }
}

impl FrozenBody {
    fn new(tree: BodyTree) -> Self {
        let hinges = tree
            .poses()
            .iter()
            .filter(|p| {
                tree.module(p.id)
                    .is_some_and(|m| m.kind() == ModuleKind::ActiveHinge)
            })
            .enumerate()
            .map(|(index, p)| HingeHandle {
                id: HingeId(index),
                module: p.id,
                cell: p.cell,
            })
            .collect();
        Self { tree, hinges }
    }

    /// Read-only view of the underlying tree.
    pub fn tree(&self) -> &BodyTree {
        &self.tree
    }

    pub fn poses(&self) -> &[ResolvedPose] {
        self.tree.poses()
    }

    pub fn pose(&self, id: ModuleId) -> Option<Pose> {
        self.tree.pose(id)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of modules of `kind`.
    pub fn count(&self, kind: ModuleKind) -> usize {
        self.tree.iter().filter(|(_, m)| m.kind() == kind).count()
    }

    /// Active hinges in depth-first order.
    pub fn active_hinges(&self) -> &[HingeHandle] {
        &self.hinges
    }

    pub fn hinge(&self, module: ModuleId) -> Option<HingeId> {
        self.hinges
            .iter()
            .find(|h| h.module == module)
            .map(|h| h.id)
    }

    /// Pairs of hinges whose grid cells lie within `max_distance` steps
    /// (taxicab) of each other. Each pair appears once, lower id first.
    pub fn hinge_neighbours(&self, max_distance: i32) -> Vec<(HingeId, HingeId)> {
        let mut pairs = Vec::new();
        for (i, a) in self.hinges.iter().enumerate() {
            for b in &self.hinges[i + 1..] {
                let d = (a.cell - b.cell).abs();
                if d.x + d.y + d.z <= max_distance {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front() -> SlotId {
        SlotId::center(Face::Front)
    }

    #[test]
    fn test_attach_and_lookup() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.child(tree.root(), front()), Some(hinge));
        assert_eq!(tree.parent(hinge), Some((tree.root(), front())));
        assert_eq!(tree.module(hinge).unwrap().kind(), ModuleKind::ActiveHinge);
    }

    #[test]
    fn test_attach_errors_leave_tree_untouched() {
        let mut tree = BodyTree::new();
        let brick = tree.attach(tree.root(), front(), Module::brick(0.0)).unwrap();
        let version = tree.version();

        let err = tree.attach(tree.root(), front(), Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::SlotOccupied { slot: front() });

        let back = SlotId::center(Face::Back);
        let err = tree.attach(brick, back, Module::brick(0.0)).unwrap_err();
        assert_eq!(
            err,
            BodyError::InvalidSlot {
                kind: ModuleKind::Brick,
                slot: back
            }
        );

        let err = tree.attach(brick, front(), Module::core(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DuplicateCore);

        assert_eq!(tree.version(), version);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_detached_parent() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        tree.detach(tree.root(), front()).unwrap();

        let err = tree.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(hinge));
        assert!(!tree.contains(hinge));
    }

    #[test]
    fn test_detach_returns_whole_subtree() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        let brick = tree.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();
        tree.attach(brick, SlotId::center(Face::Left), Module::brick(0.0)).unwrap();

        let subtree = tree.detach(tree.root(), front()).unwrap();
        assert_eq!(subtree.len(), 3);
        assert_eq!(subtree.module().kind(), ModuleKind::ActiveHinge);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.children(tree.root()).count(), 0);
        assert!(!tree.contains(brick));
    }

    #[test]
    fn test_detach_empty_slot() {
        let mut tree = BodyTree::new();
        let err = tree.detach(tree.root(), front()).unwrap_err();
        assert_eq!(err, BodyError::EmptySlot { slot: front() });
    }

    #[test]
    fn test_invalid_root() {
        let err = BodyTree::with_core(Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::InvalidRoot(ModuleKind::Brick));
    }

    #[test]
    fn test_subtree_builder() {
        let leg = Subtree::new(Module::active_hinge(0.0))
            .with(SlotId::ATTACHMENT, Module::brick(0.0))
            .unwrap();
        assert_eq!(leg.len(), 2);
        assert!(leg.child(SlotId::ATTACHMENT).is_some());

        let err = leg.clone().with(SlotId::ATTACHMENT, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::SlotOccupied { slot: SlotId::ATTACHMENT });
    }

    #[test]
    fn test_pose_cache_follows_version() {
        let mut tree = BodyTree::new();
        assert_eq!(tree.poses().len(), 1);
        tree.attach(tree.root(), front(), Module::brick(0.0)).unwrap();
        assert_eq!(tree.poses().len(), 2);
        tree.set_root_pose(Pose::from_position(glam::Vec3::Z));
        assert_eq!(tree.pose(tree.root()).unwrap().position, glam::Vec3::Z);
    }

    #[test]
    fn test_to_subtree_and_back() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.3)).unwrap();
        tree.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();

        let rebuilt = BodyTree::from_subtree(tree.to_subtree()).unwrap();
        assert_eq!(rebuilt.to_subtree(), tree.to_subtree());
        let placed = |t: &BodyTree| -> Vec<_> { t.poses().iter().map(|p| (p.pose, p.cell)).collect() };
        assert_eq!(placed(&rebuilt), placed(&tree));
    }

    #[test]
    fn test_frozen_hinges_are_numbered_depth_first() {
        let mut tree = BodyTree::new();
        let a = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        let b = tree.attach(a, SlotId::ATTACHMENT, Module::active_hinge(0.0)).unwrap();
        let c = tree
            .attach(tree.root(), SlotId::center(Face::Left), Module::active_hinge(0.0))
            .unwrap();

        let body = tree.freeze();
        let ids: Vec<_> = body.active_hinges().iter().map(|h| h.module).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(body.hinge(c), Some(HingeId(2)));
        assert_eq!(body.count(ModuleKind::ActiveHinge), 3);

        // a at (1,0,0), b at (2,0,0), c at (0,1,0)
        assert_eq!(
            body.hinge_neighbours(2),
            vec![(HingeId(0), HingeId(1)), (HingeId(0), HingeId(2))]
        );
    }

    #[test]
    fn test_foreign_ids_are_rejected() {
        let mut other = BodyTree::new();
        let hinge = other.attach(other.root(), front(), Module::active_hinge(0.0)).unwrap();
        let brick = other.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();

        // Same arena layout, so the bare indices of `hinge` and `brick` exist here too.
        let mut tree = BodyTree::new();
        let own = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        tree.attach(own, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();
        let version = tree.version();

        let left = SlotId::center(Face::Left);
        let err = tree.attach(brick, left, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(brick));
        let err = tree.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(hinge));
        let err = tree.detach(other.root(), front()).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(other.root()));

        assert!(!tree.contains(brick));
        assert_eq!(tree.module(hinge), None);
        assert_eq!(tree.children(other.root()).count(), 0);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.version(), version);
    }

    #[test]
    fn test_clone_is_a_separate_body() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();

        let mut copy = tree.clone();
        assert_eq!(copy.to_subtree(), tree.to_subtree());
        assert!(!copy.contains(hinge));
        let err = copy.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(hinge));

        let own = copy.child(copy.root(), front()).unwrap();
        copy.attach(own, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();
        assert_eq!(copy.len(), 3);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_frozen_copies_share_ids() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        let body = tree.freeze();
        let copy = body.clone();
        assert_eq!(copy.hinge(hinge), Some(HingeId(0)));
        assert_eq!(copy.poses(), body.poses());
    }

    #[test]
    fn test_reused_slot_rejects_stale_id() {
        let mut tree = BodyTree::new();
        let old = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        tree.detach(tree.root(), front()).unwrap();
        let new = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();

        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        let err = tree.attach(old, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap_err();
        assert_eq!(err, BodyError::DetachedParent(old));
        assert!(tree.attach(new, SlotId::ATTACHMENT, Module::brick(0.0)).is_ok());
    }

    #[test]
    fn test_arena_stays_bounded_across_cycles() {
        let mut tree = BodyTree::new();
        let hinge = tree.attach(tree.root(), front(), Module::active_hinge(0.0)).unwrap();
        tree.attach(hinge, SlotId::ATTACHMENT, Module::brick(0.0)).unwrap();

        for _ in 0..1000 {
            let chain = tree.detach(tree.root(), front()).unwrap();
            tree.attach(tree.root(), front(), chain).unwrap();
        }
        assert_eq!(tree.len(), 3);
        let widest = tree.iter().map(|(id, _)| id.index()).max();
        assert_eq!(widest, Some(2));
    }

    #[test]
    fn test_long_chain_round_trips() {
        let mut chain = Subtree::new(Module::brick(0.0));
        for _ in 0..2000 {
            chain = Subtree::new(Module::active_hinge(0.0)).with(SlotId::ATTACHMENT, chain).unwrap();
        }
        assert_eq!(chain.len(), 2001);
        assert!(chain.validate().is_ok());

        let mut tree = BodyTree::new();
        tree.attach(tree.root(), front(), chain).unwrap();
        assert_eq!(tree.len(), 2002);
        assert_eq!(tree.to_subtree().len(), 2002);
        assert_eq!(tree.poses().len(), 2002);

        let detached = tree.detach(tree.root(), front()).unwrap();
        assert_eq!(detached.len(), 2001);
        assert_eq!(tree.len(), 1);
    }
}
