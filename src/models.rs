//! Core models for the tasktree library
//!
//! This module contains the node tree, its backing store, and the manager that
//! every mutation and navigation step goes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export the read-only view types from the snapshot module
pub use crate::snapshot::{AttrKey, Criteria, NodeDraft, Snapshot};

/// Largest priority a node can carry; valid priorities run from 0 up to here.
pub const MAX_PRIORITY: u8 = 10;

/// Errors surfaced by tree operations
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("priority {0} is outside the range 0..={max}", max = MAX_PRIORITY)]
    InvalidPriority(u8),

    #[error("only an empty container can become a leaf")]
    InvalidConversion,

    #[error("position {0} is out of range")]
    OutOfRange(usize),

    #[error("the target cannot receive nodes")]
    InvalidTarget,
}

/// The two kinds of node a tree can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Container,
    Leaf,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Container => write!(f, "Container"),
            Kind::Leaf => write!(f, "Leaf"),
        }
    }
}

// shorthand for the child-index path from the root to a node
pub type Path = Vec<usize>;

/// Handle to a slot in the node store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Container { children: Vec<NodeId> },
    Leaf,
}

impl NodeKind {
    fn tag(&self) -> Kind {
        match self {
            NodeKind::Container { .. } => Kind::Container,
            NodeKind::Leaf => Kind::Leaf,
        }
    }
}

/// A single work item in the tree
#[derive(Debug, Clone)]
struct Node {
    name: String,
    description: String,
    due_date: DateTime<Utc>,
    priority: u8,
    complete: bool,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    /// Creates a new node with the given name and kind; it starts incomplete,
    /// at priority 0, due now, and detached from any parent
    fn new(name: String, kind: Kind) -> Self {
        Self {
            name,
            description: String::new(),
            due_date: Utc::now(),
            priority: 0,
            complete: false,
            parent: None,
            kind: match kind {
                Kind::Container => NodeKind::Container {
                    children: Vec::new(),
                },
                Kind::Leaf => NodeKind::Leaf,
            },
        }
    }

    /// Sets the priority, rejecting values above [`MAX_PRIORITY`] and leaving
    /// the old value in place on failure
    fn set_priority(&mut self, priority: u8) -> Result<(), TreeError> {
        if priority > MAX_PRIORITY {
            return Err(TreeError::InvalidPriority(priority));
        }
        self.priority = priority;
        Ok(())
    }
}

/// Slot arena holding every node in a tree.
///
/// Freed slots go onto a free list and are handed back out by later inserts,
/// so the arena stays compact while nodes come and go.
#[derive(Debug)]
struct NodeStore {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl NodeStore {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Places a node into a free slot, or grows the arena by one
    fn insert(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn node(&self, id: NodeId) -> &Node {
        self.slots[id.0].as_ref().expect("dangling node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.0].as_mut().expect("dangling node id")
    }

    /// Returns the direct children of a node; a leaf has none
    fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Container { children } => children,
            NodeKind::Leaf => &[],
        }
    }

    /// Resolves the child at `pos` under the given node
    fn child_at(&self, id: NodeId, pos: usize) -> Result<NodeId, TreeError> {
        self.children(id)
            .get(pos)
            .copied()
            .ok_or(TreeError::OutOfRange(pos))
    }

    /// Walks a child-index path down from `from`
    fn resolve(&self, from: NodeId, path: &[usize]) -> Option<NodeId> {
        let mut current = from;
        for &pos in path {
            current = self.child_at(current, pos).ok()?;
        }
        Some(current)
    }

    /// Returns whether `id` sits inside the subtree rooted at `ancestor`
    fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id
            || self
                .children(ancestor)
                .iter()
                .any(|&child| self.contains(child, id))
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        if let NodeKind::Container { children } = &mut self.node_mut(parent).kind {
            children.push(id);
        }
        self.node_mut(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        if let NodeKind::Container { children } = &mut self.node_mut(parent).kind {
            children.retain(|child| *child != id);
        }
        self.node_mut(id).parent = None;
    }

    /// Reparents `id` under `target`, appending it at the end of the target's
    /// children. Fails when the target is a leaf; both sides of the
    /// parent/child link are updated together.
    fn move_into(&mut self, id: NodeId, target: NodeId) -> Result<(), TreeError> {
        if !matches!(self.node(target).kind, NodeKind::Container { .. }) {
            return Err(TreeError::InvalidTarget);
        }
        if let Some(old_parent) = self.node(id).parent {
            self.unlink_parent(id, old_parent);
        }
        self.link_parent(id, target);
        Ok(())
    }

    /// Removes a node and its whole subtree, children first, left to right.
    ///
    /// The walk stops at the first child that fails to go, leaving earlier
    /// removals in place and the node itself alive.
    fn delete(&mut self, id: NodeId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        while let Some(&child) = self.children(id).first() {
            if !self.delete(child) {
                return false;
            }
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        self.slots[id.0] = None;
        self.free.push(id.0);
        true
    }

    /// Swaps the kind of a node in place, keeping its slot and position.
    ///
    /// A container may only become a leaf once it has no children; converting
    /// to the present kind changes nothing.
    fn convert(&mut self, id: NodeId, kind: Kind) -> Result<(), TreeError> {
        let node = self.node_mut(id);
        match (&node.kind, kind) {
            (NodeKind::Container { children }, Kind::Leaf) if !children.is_empty() => {
                Err(TreeError::InvalidConversion)
            }
            (NodeKind::Container { .. }, Kind::Leaf) => {
                node.kind = NodeKind::Leaf;
                Ok(())
            }
            (NodeKind::Leaf, Kind::Container) => {
                node.kind = NodeKind::Container {
                    children: Vec::new(),
                };
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Folds completion over the stored flags of a node's direct children.
    ///
    /// A leaf reports its own flag; a container with no children is never
    /// complete. Grandchildren are not consulted.
    fn fold_complete(&self, id: NodeId) -> bool {
        match &self.node(id).kind {
            NodeKind::Leaf => self.node(id).complete,
            NodeKind::Container { children } => {
                !children.is_empty() && children.iter().all(|&child| self.node(child).complete)
            }
        }
    }
}

/// On-disk shape of a node and everything below it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub priority: u8,
    pub complete: bool,
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

/// Sole gateway for navigating and mutating a tree of work items.
///
/// The manager owns the store, a cursor pointing at the node operations apply
/// to, and the cached child-index path from the root to that cursor. Callers
/// only ever see detached [`Snapshot`] values, never nodes.
pub struct Manager {
    store: NodeStore,
    root: NodeId,
    cursor: NodeId,
    path: Path,
}

impl Manager {
    /// Creates a manager around a fresh tree whose root container carries the
    /// given name
    pub fn new(name: String) -> Self {
        let mut store = NodeStore::new();
        let root = store.insert(Node::new(name, Kind::Container));
        Self {
            store,
            root,
            cursor: root,
            path: Vec::new(),
        }
    }

    // Navigation

    /// Steps the cursor into the child at `pos`. An out-of-range position is
    /// logged and ignored, leaving the cursor where it was
    pub fn step_into(&mut self, pos: usize) -> bool {
        match self.store.child_at(self.cursor, pos) {
            Ok(child) => {
                self.cursor = child;
                self.path.push(pos);
                true
            }
            Err(err) => {
                tracing::warn!("Step ignored: {}", err);
                false
            }
        }
    }

    /// Steps the cursor up to its parent; at the root this does nothing
    pub fn step_up(&mut self) {
        if let Some(parent) = self.store.node(self.cursor).parent {
            self.cursor = parent;
            self.path.pop();
        }
    }

    /// Returns the cursor to the root
    pub fn home(&mut self) {
        self.cursor = self.root;
        self.path.clear();
    }

    /// Gets the child-index path from the root to the cursor
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    // Node creation

    /// Creates a child with the given name under the cursor. Returns false
    /// when the cursor is a leaf and cannot hold children
    pub fn create(&mut self, name: String, kind: Kind) -> bool {
        self.create_node(Node::new(name, kind))
    }

    /// Creates a child under the cursor from a partial draft.
    ///
    /// Missing or empty fields fall back to defaults: name "Default",
    /// description "Default Description", container kind, due now, priority
    /// 0, incomplete. An out-of-range draft priority is logged and replaced
    /// with 0 rather than failing the creation.
    pub fn create_from(&mut self, draft: NodeDraft) -> bool {
        let name = match draft.name {
            Some(name) if !name.is_empty() => name,
            _ => "Default".to_string(),
        };
        let description = match draft.description {
            Some(description) if !description.is_empty() => description,
            _ => "Default Description".to_string(),
        };
        let priority = match draft.priority {
            Some(priority) if priority <= MAX_PRIORITY => priority,
            Some(priority) => {
                tracing::warn!("Draft priority {} is out of range, using 0", priority);
                0
            }
            None => 0,
        };
        let mut node = Node::new(name, draft.kind.unwrap_or(Kind::Container));
        node.description = description;
        node.priority = priority;
        node.complete = draft.complete.unwrap_or(false);
        if let Some(due_date) = draft.due_date {
            node.due_date = due_date;
        }
        self.create_node(node)
    }

    fn create_node(&mut self, node: Node) -> bool {
        if !matches!(self.store.node(self.cursor).kind, NodeKind::Container { .. }) {
            tracing::warn!("Create ignored: the current node cannot hold children");
            return false;
        }
        tracing::debug!("Creating '{}' under the cursor", node.name);
        let id = self.store.insert(node);
        self.store.move_into(id, self.cursor).is_ok()
    }

    // Deletion

    /// Deletes the child subtree at `pos` under the cursor. An out-of-range
    /// position (or a leaf cursor) is logged and ignored
    pub fn delete_child(&mut self, pos: usize) -> bool {
        match self.store.child_at(self.cursor, pos) {
            Ok(child) => {
                tracing::debug!("Deleting child {} of the cursor", pos);
                self.store.delete(child)
            }
            Err(err) => {
                tracing::warn!("Delete ignored: {}", err);
                false
            }
        }
    }

    /// Deletes the subtree under the cursor and hands the cursor to the
    /// deleted node's parent.
    ///
    /// At the root the tree is cleared instead: the children go, the root
    /// node and the cursor stay.
    pub fn delete_cursor(&mut self) -> bool {
        if self.cursor == self.root {
            while let Some(&child) = self.store.children(self.root).first() {
                if !self.store.delete(child) {
                    return false;
                }
            }
            return true;
        }
        let parent = self.store.node(self.cursor).parent;
        if !self.store.delete(self.cursor) {
            return false;
        }
        if let Some(parent) = parent {
            self.cursor = parent;
            self.path.pop();
        }
        true
    }

    // Moves and conversions

    /// Moves the node under the cursor into the container at `target`, a
    /// child-index path from the root. The node lands at the end of the
    /// target's children and the cursor follows it.
    ///
    /// The move is refused when the target does not resolve, is a leaf, or
    /// sits inside the moving node's own subtree; the root itself never
    /// moves. Moving into the current parent re-appends the node at the end
    /// of the same child list.
    pub fn move_to(&mut self, target: Path) -> bool {
        if self.cursor == self.root {
            tracing::warn!("Move ignored: the root cannot be moved");
            return false;
        }
        let target_id = match self.store.resolve(self.root, &target) {
            Some(id) => id,
            None => {
                tracing::warn!("Move ignored: no node at {:?}", target);
                return false;
            }
        };
        if !matches!(self.store.node(target_id).kind, NodeKind::Container { .. }) {
            tracing::warn!(
                "Move ignored: the target at {:?} cannot hold children",
                target
            );
            return false;
        }
        // The target must still sit under the root
        if !self.store.contains(self.root, target_id) {
            return false;
        }
        // Reparenting a node beneath itself would detach its subtree into a cycle
        if self.store.contains(self.cursor, target_id) {
            tracing::warn!("Move ignored: {:?} is inside the moving subtree", target);
            return false;
        }
        if self.store.move_into(self.cursor, target_id).is_err() {
            return false;
        }
        // Sibling positions may have shifted; rebuild the cached path from
        // the parent links rather than patching it up
        self.path = self.path_of(self.cursor);
        true
    }

    /// Converts the node under the cursor between container and leaf, in
    /// place. A container still holding children refuses to become a leaf;
    /// converting to the present kind succeeds without changing anything
    pub fn set_kind(&mut self, kind: Kind) -> Result<(), TreeError> {
        self.store.convert(self.cursor, kind)
    }

    // Attribute mutation

    /// Renames the node under the cursor
    pub fn set_name(&mut self, name: String) {
        self.store.node_mut(self.cursor).name = name;
    }

    /// Replaces the description of the node under the cursor
    pub fn set_description(&mut self, description: String) {
        self.store.node_mut(self.cursor).description = description;
    }

    /// Replaces the due date of the node under the cursor
    pub fn set_due_date(&mut self, due_date: DateTime<Utc>) {
        self.store.node_mut(self.cursor).due_date = due_date;
    }

    /// Sets the completion flag of the node under the cursor directly
    pub fn set_complete(&mut self, complete: bool) {
        self.store.node_mut(self.cursor).complete = complete;
    }

    /// Sets the priority of the node under the cursor; values above
    /// [`MAX_PRIORITY`] are rejected and the old priority stays
    pub fn set_priority(&mut self, priority: u8) -> Result<(), TreeError> {
        self.store.node_mut(self.cursor).set_priority(priority)
    }

    // Completion

    /// Recomputes completion for the node under the cursor and stores the
    /// result on the node.
    ///
    /// A leaf reports its own flag. A container is complete when it has at
    /// least one child and every direct child's stored flag is set; deeper
    /// levels are only picked up once their own parents have been checked.
    pub fn is_complete(&mut self) -> bool {
        let complete = self.store.fold_complete(self.cursor);
        self.store.node_mut(self.cursor).complete = complete;
        complete
    }

    // Information retrieval

    /// Gets a snapshot of the node under the cursor
    pub fn cursor_snapshot(&self) -> Snapshot {
        self.snapshot(self.cursor)
    }

    /// Gets a snapshot of the cursor's parent, or `None` at the root
    pub fn parent_snapshot(&self) -> Option<Snapshot> {
        self.store
            .node(self.cursor)
            .parent
            .map(|parent| self.snapshot(parent))
    }

    /// Gets snapshots of the cursor's direct children, in order
    pub fn children_snapshots(&self) -> Vec<Snapshot> {
        self.store
            .children(self.cursor)
            .iter()
            .map(|&child| self.snapshot(child))
            .collect()
    }

    /// Gets a snapshot of the node at a child-index path from the root, or
    /// `None` when the path does not resolve
    pub fn snapshot_of(&self, path: Path) -> Option<Snapshot> {
        self.store
            .resolve(self.root, &path)
            .map(|id| self.snapshot(id))
    }

    /// Gets snapshots of the children of the node at a child-index path from
    /// the root, or `None` when the path does not resolve
    pub fn children_snapshots_of(&self, path: Path) -> Option<Vec<Snapshot>> {
        self.store.resolve(self.root, &path).map(|id| {
            self.store
                .children(id)
                .iter()
                .map(|&child| self.snapshot(child))
                .collect()
        })
    }

    /// Searches the cursor's descendants for nodes matching the criteria.
    ///
    /// The cursor itself is never a hit. Results come back in depth-first
    /// order, each parent before its own children.
    pub fn search(&self, criteria: &Criteria) -> Vec<Snapshot> {
        fn walk(manager: &Manager, id: NodeId, criteria: &Criteria, matches: &mut Vec<Snapshot>) {
            for &child in manager.store.children(id) {
                let snapshot = manager.snapshot(child);
                if criteria.matches(&snapshot) {
                    matches.push(snapshot);
                }
                walk(manager, child, criteria, matches);
            }
        }

        let mut matches = Vec::new();
        walk(self, self.cursor, criteria, &mut matches);
        matches
    }

    fn snapshot(&self, id: NodeId) -> Snapshot {
        let node = self.store.node(id);
        Snapshot::new(
            node.name.clone(),
            node.description.clone(),
            node.due_date,
            node.priority,
            node.complete,
            self.store.children(id).len(),
            node.kind.tag(),
        )
    }

    // Rebuilds the child-index path from the root to `id` from parent links
    fn path_of(&self, id: NodeId) -> Path {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.store.node(current).parent {
            if let Some(pos) = self
                .store
                .children(parent)
                .iter()
                .position(|&child| child == current)
            {
                path.push(pos);
            }
            current = parent;
        }
        path.reverse();
        path
    }

    // Persistence

    /// Renders the whole tree as a nested record, ready for serialization
    pub fn to_record(&self) -> NodeRecord {
        fn record(store: &NodeStore, id: NodeId) -> NodeRecord {
            let node = store.node(id);
            NodeRecord {
                name: node.name.clone(),
                description: node.description.clone(),
                due_date: node.due_date,
                priority: node.priority,
                complete: node.complete,
                kind: node.kind.tag(),
                children: store
                    .children(id)
                    .iter()
                    .map(|&child| record(store, child))
                    .collect(),
            }
        }

        record(&self.store, self.root)
    }

    /// Rebuilds a manager from a nested record, with the cursor at the root.
    ///
    /// Records pass through the same attach rules as live mutations, so a
    /// leaf record carrying children or an out-of-range stored priority is
    /// rejected instead of silently accepted.
    pub fn from_record(record: NodeRecord) -> Result<Self, TreeError> {
        fn insert(
            store: &mut NodeStore,
            record: NodeRecord,
            parent: Option<NodeId>,
        ) -> Result<NodeId, TreeError> {
            let mut node = Node::new(record.name, record.kind);
            node.set_priority(record.priority)?;
            node.description = record.description;
            node.due_date = record.due_date;
            node.complete = record.complete;
            let id = store.insert(node);
            if let Some(parent) = parent {
                store.move_into(id, parent)?;
            }
            for child in record.children {
                insert(store, child, Some(id))?;
            }
            Ok(id)
        }

        let mut store = NodeStore::new();
        let root = insert(&mut store, record, None)?;
        Ok(Self {
            store,
            root,
            cursor: root,
            path: Vec::new(),
        })
    }
}
