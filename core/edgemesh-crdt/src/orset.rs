//! Observed-Remove Set (OR-Set / Add-Wins Set).
//!
//! A CRDT set supporting both add and remove. Each add creates a unique
//! tag; remove erases only the tags currently observed at this replica.
//! An element is present iff it has at least one non-tombstoned tag, so
//! a concurrent add at another replica survives a remove that never saw
//! its tag (add-wins).

use edgemesh_types::NodeId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A globally unique tag identifying one add operation: the adding
/// node's id plus 96 bits of randomness. Uniqueness, not determinism,
/// is all that's required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    node: NodeId,
    nonce: [u8; 12],
}

impl Tag {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self { node, nonce }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, hex::encode(self.nonce))
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

/// An Observed-Remove Set over elements of type `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedRemoveSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    elements: HashMap<T, HashSet<Tag>>,
    tombstones: HashSet<Tag>,
}

impl<T> Default for ObservedRemoveSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObservedRemoveSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            tombstones: HashSet::new(),
        }
    }

    /// True iff `element` has at least one live tag.
    #[must_use]
    pub fn lookup(&self, element: &T) -> bool {
        self.elements
            .get(element)
            .map(|tags| !tags.is_empty())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.values().filter(|tags| !tags.is_empty()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The set of present elements.
    pub fn value(&self) -> impl Iterator<Item = &T> {
        self.elements.iter().filter(|(_, tags)| !tags.is_empty()).map(|(e, _)| e)
    }

    /// Adds `element`, generating a fresh tag attributed to `node`.
    /// Returns the new tag.
    pub fn add(&mut self, element: T, node: NodeId) -> Tag {
        let tag = Tag::new(node);
        self.add_with_tag(element, tag.clone());
        tag
    }

    /// Adds `element` under a specific tag (used when applying a remote add).
    pub fn add_with_tag(&mut self, element: T, tag: Tag) {
        if !self.tombstones.contains(&tag) {
            self.elements.entry(element).or_default().insert(tag);
        }
    }

    /// Removes all tags for `element` currently observed at this replica.
    /// Returns the tags that were tombstoned.
    pub fn remove(&mut self, element: &T) -> Vec<Tag> {
        let removed: Vec<Tag> = self
            .elements
            .get_mut(element)
            .map(|tags| tags.drain().collect())
            .unwrap_or_default();

        for tag in &removed {
            self.tombstones.insert(tag.clone());
        }
        removed
    }

    /// Merges another set into this one: per-element union of tags,
    /// then drops anything tombstoned by either replica.
    pub fn merge(&mut self, other: &Self) {
        self.tombstones.extend(other.tombstones.iter().cloned());

        for (element, other_tags) in &other.elements {
            let entry = self.elements.entry(element.clone()).or_default();
            for tag in other_tags {
                if !self.tombstones.contains(tag) {
                    entry.insert(tag.clone());
                }
            }
        }

        let tombstones = &self.tombstones;
        for tags in self.elements.values_mut() {
            tags.retain(|tag| !tombstones.contains(tag));
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    #[must_use]
    pub fn tags_for(&self, element: &T) -> Option<&HashSet<Tag>> {
        self.elements.get(element)
    }

    #[must_use]
    pub fn tombstones(&self) -> &HashSet<Tag> {
        &self.tombstones
    }
}
