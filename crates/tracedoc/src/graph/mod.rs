//! Generic keyed node store with typed, bidirectional links.
//!
//! The store owns every node value under its key and keeps, per link type,
//! a forward map `from -> [to]` and a mirrored reverse map `to -> [from]`.
//! Link value lists keep insertion order so query results are stable.
//!
//! Invariants:
//! - no edge joins a node to itself
//! - no duplicate `(type, from, to)` edge
//! - forward and reverse maps always agree
//!
//! Every failing operation returns a [`GraphError`] before mutating anything.

use crate::error::GraphError;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Pre-removal check. Returning `Err(reason)` refuses the removal.
pub type RemovalValidator<K, V, T> = Box<dyn Fn(&GraphStore<K, V, T>, &K) -> Result<(), String>>;

type LinkMap<K> = HashMap<K, Vec<K>>;

/// In-memory node/link database.
///
/// `K` is the node key, `V` the stored value and `T` the link type.
pub struct GraphStore<K, V, T> {
    nodes: HashMap<K, V>,
    links: HashMap<T, LinkMap<K>>,
    links_reverse: HashMap<T, LinkMap<K>>,
    removal_validator: Option<RemovalValidator<K, V, T>>,
}

impl<K, V, T> Default for GraphStore<K, V, T> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            links: HashMap::new(),
            links_reverse: HashMap::new(),
            removal_validator: None,
        }
    }
}

impl<K, V, T> fmt::Debug for GraphStore<K, V, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStore")
            .field("nodes", &self.nodes.len())
            .field("link_types", &self.links.keys().collect::<Vec<_>>())
            .field("has_removal_validator", &self.removal_validator.is_some())
            .finish()
    }
}

impl<K, V, T> GraphStore<K, V, T>
where
    K: Copy + Eq + Hash + fmt::Display,
    T: Copy + Eq + Hash + fmt::Debug,
{
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the check consulted by [`remove_node`](Self::remove_node).
    pub fn set_removal_validator(&mut self, validator: RemovalValidator<K, V, T>) {
        self.removal_validator = Some(validator);
    }

    // ========== Nodes ==========

    /// Insert a node.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateKey`] if `key` is already present.
    pub fn add_node(&mut self, key: K, value: V) -> Result<(), GraphError> {
        if self.nodes.contains_key(&key) {
            return Err(GraphError::DuplicateKey(key.to_string()));
        }
        self.nodes.insert(key, value);
        Ok(())
    }

    /// Look up a node.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotFound`] if `key` is absent.
    pub fn get_node(&self, key: &K) -> Result<&V, GraphError> {
        self.nodes
            .get(key)
            .ok_or_else(|| GraphError::NotFound(key.to_string()))
    }

    /// Look up a node, returning `None` if absent.
    #[must_use]
    pub fn get_node_weak(&self, key: &K) -> Option<&V> {
        self.nodes.get(key)
    }

    /// Mutable lookup.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotFound`] if `key` is absent.
    pub fn get_node_mut(&mut self, key: &K) -> Result<&mut V, GraphError> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| GraphError::NotFound(key.to_string()))
    }

    /// Whether `key` is stored.
    #[must_use]
    pub fn has_node(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes.iter()
    }

    /// Remove a node and every link it takes part in.
    ///
    /// The removal validator, if installed, runs first.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotFound`] if absent, [`GraphError::ConstraintViolation`]
    /// if the validator refuses.
    pub fn remove_node(&mut self, key: &K) -> Result<V, GraphError> {
        if !self.nodes.contains_key(key) {
            return Err(GraphError::NotFound(key.to_string()));
        }
        if let Some(validator) = &self.removal_validator {
            validator(self, key).map_err(GraphError::ConstraintViolation)?;
        }

        let link_types: Vec<T> = self.links.keys().copied().collect();
        for link_type in link_types {
            if let (Some(forward), Some(reverse)) = (
                self.links.get_mut(&link_type),
                self.links_reverse.get_mut(&link_type),
            ) {
                detach(forward, reverse, key);
                detach(reverse, forward, key);
            }
        }

        self.nodes
            .remove(key)
            .ok_or_else(|| GraphError::NotFound(key.to_string()))
    }

    // ========== Links ==========

    /// Add the edge `from -> to` of type `link_type`.
    ///
    /// # Errors
    ///
    /// [`GraphError::SelfLink`] if `from == to`, [`GraphError::DuplicateLink`]
    /// if the edge already exists.
    pub fn add_link(&mut self, link_type: T, from: K, to: K) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfLink {
                link_type: format!("{link_type:?}"),
                key: from.to_string(),
            });
        }
        if self.has_link(link_type, &from, &to) {
            return Err(GraphError::DuplicateLink {
                link_type: format!("{link_type:?}"),
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.links
            .entry(link_type)
            .or_default()
            .entry(from)
            .or_default()
            .push(to);
        self.links_reverse
            .entry(link_type)
            .or_default()
            .entry(to)
            .or_default()
            .push(from);
        Ok(())
    }

    /// Remove the edge `from -> to`.
    ///
    /// # Errors
    ///
    /// [`GraphError::LinkNotFound`] if the edge is absent.
    pub fn remove_link(&mut self, link_type: T, from: &K, to: &K) -> Result<(), GraphError> {
        if !self.has_link(link_type, from, to) {
            return Err(GraphError::LinkNotFound {
                link_type: format!("{link_type:?}"),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some(forward) = self.links.get_mut(&link_type) {
            remove_value(forward, from, to);
        }
        if let Some(reverse) = self.links_reverse.get_mut(&link_type) {
            remove_value(reverse, to, from);
        }
        Ok(())
    }

    /// Remove every `link_type` edge leaving `from`, returning the targets.
    pub fn remove_all_links(&mut self, link_type: T, from: &K) -> Vec<K> {
        let targets = self
            .links
            .get_mut(&link_type)
            .and_then(|forward| forward.remove(from))
            .unwrap_or_default();
        if let Some(reverse) = self.links_reverse.get_mut(&link_type) {
            for to in &targets {
                remove_value(reverse, to, from);
            }
        }
        targets
    }

    /// Whether the edge `from -> to` exists.
    #[must_use]
    pub fn has_link(&self, link_type: T, from: &K, to: &K) -> bool {
        self.get_link_values(link_type, from).contains(to)
    }

    /// Targets of `link_type` edges leaving `from`; empty if none.
    #[must_use]
    pub fn get_link_values(&self, link_type: T, from: &K) -> &[K] {
        values_of(&self.links, link_type, from)
    }

    /// Sources of `link_type` edges entering `to`; empty if none.
    #[must_use]
    pub fn get_link_values_reverse(&self, link_type: T, to: &K) -> &[K] {
        values_of(&self.links_reverse, link_type, to)
    }

    /// The single target of `link_type` leaving `from`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnexpectedArity`] unless exactly one target exists.
    pub fn get_link_value(&self, link_type: T, from: &K) -> Result<K, GraphError> {
        match self.get_link_values(link_type, from) {
            [only] => Ok(*only),
            values => Err(GraphError::UnexpectedArity {
                link_type: format!("{link_type:?}"),
                from: from.to_string(),
                found: values.len(),
            }),
        }
    }

    /// The single target of `link_type` leaving `from`, or `None` when the
    /// number of targets is not exactly one.
    #[must_use]
    pub fn get_link_value_weak(&self, link_type: T, from: &K) -> Option<K> {
        match self.get_link_values(link_type, from) {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Total number of `link_type` edges.
    #[must_use]
    pub fn link_count(&self, link_type: T) -> usize {
        self.links
            .get(&link_type)
            .map_or(0, |forward| forward.values().map(Vec::len).sum())
    }
}

fn values_of<'a, K, T>(map: &'a HashMap<T, LinkMap<K>>, link_type: T, key: &K) -> &'a [K]
where
    K: Eq + Hash,
    T: Eq + Hash,
{
    map.get(&link_type)
        .and_then(|by_key| by_key.get(key))
        .map_or(&[], Vec::as_slice)
}

fn remove_value<K: Eq + Hash>(map: &mut LinkMap<K>, key: &K, value: &K) {
    if let Some(values) = map.get_mut(key) {
        values.retain(|v| v != value);
        if values.is_empty() {
            map.remove(key);
        }
    }
}

/// Drop `key`'s entry from `map` and the mirrored entries in `mirror`.
fn detach<K: Eq + Hash>(map: &mut LinkMap<K>, mirror: &mut LinkMap<K>, key: &K) {
    if let Some(values) = map.remove(key) {
        for value in &values {
            remove_value(mirror, value, key);
        }
    }
}
