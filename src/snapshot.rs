//! Read-only node views for tasktree
//!
//! This module defines the snapshot type the manager hands out in place of live
//! node references, along with the attribute keys, search criteria, and the
//! draft payload used when creating nodes from partial input.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Kind;

/// Identifies one attribute of a node, as exposed through [`Snapshot::attr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKey {
    Name,
    Description,
    DueDate,
    Priority,
    Complete,
    Children,
    Kind,
}

/// An immutable copy of a node's attributes, detached from the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    name: String,
    description: String,
    due_date: DateTime<Utc>,
    priority: u8,
    complete: bool,
    children: usize,
    kind: Kind,
}

impl Snapshot {
    /// Creates a new snapshot
    pub fn new(
        name: String,
        description: String,
        due_date: DateTime<Utc>,
        priority: u8,
        complete: bool,
        children: usize,
        kind: Kind,
    ) -> Self {
        Self {
            name,
            description,
            due_date,
            priority,
            complete,
            children,
            kind,
        }
    }

    /// Gets the name of the node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the description of the node
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Gets the due date of the node
    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    /// Gets the priority of the node
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns whether the node was marked complete
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Gets the number of direct children the node had
    pub fn child_count(&self) -> usize {
        self.children
    }

    /// Gets the kind of the node
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Renders the attribute behind `key` as a string.
    ///
    /// Every key renders to something: due dates use RFC 3339, booleans and
    /// numbers use their display form.
    pub fn attr(&self, key: AttrKey) -> String {
        match key {
            AttrKey::Name => self.name.clone(),
            AttrKey::Description => self.description.clone(),
            AttrKey::DueDate => self.due_date.to_rfc3339(),
            AttrKey::Priority => self.priority.to_string(),
            AttrKey::Complete => self.complete.to_string(),
            AttrKey::Children => self.children.to_string(),
            AttrKey::Kind => self.kind.to_string(),
        }
    }
}

/// A conjunction of attribute filters used to search the tree.
///
/// Each entry compares the rendered attribute against the expected string,
/// ignoring ASCII case. An empty criteria matches every node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Criteria {
    fields: HashMap<AttrKey, String>,
}

impl Criteria {
    /// Creates an empty criteria
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter for `key`, replacing any previous filter on the same key
    pub fn with(mut self, key: AttrKey, expected: impl Into<String>) -> Self {
        self.fields.insert(key, expected.into());
        self
    }

    /// Returns whether no filters have been added
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns whether `snapshot` satisfies every filter
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| snapshot.attr(*key).eq_ignore_ascii_case(expected))
    }
}

/// Partial input for creating a node; every missing field gets a default.
///
/// See [`crate::models::Manager::create_from`] for the defaulting rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<u8>,
    pub complete: Option<bool>,
    pub kind: Option<Kind>,
}
