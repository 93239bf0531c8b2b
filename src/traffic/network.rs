use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

use crate::traffic::{Result, TrafficError};

/// Normalized key for an undirected edge. The lexicographically smaller
/// endpoint is always stored first, so `EdgeKey::new("B", "A")` and
/// `EdgeKey::new("A", "B")` address the same edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    a: String,
    b: String,
}

impl EdgeKey {
    pub fn new(u: &str, v: &str) -> Self {
        if u <= v {
            EdgeKey {
                a: u.to_string(),
                b: v.to_string(),
            }
        } else {
            EdgeKey {
                a: v.to_string(),
                b: u.to_string(),
            }
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.a, &self.b)
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub key: EdgeKey,
    /// Structural distance of the road segment, only changed by explicit edits.
    pub base_weight: f64,
    /// Effective distance used for routing: base weight plus the deltas of all
    /// active events on this edge.
    pub current_weight: f64,
}

/// Undirected weighted road network. Vertices are intersections addressed by
/// string label, edges are road segments. Adjacency is kept in BTree
/// collections so that all listings iterate in lexicographic order.
#[derive(Debug, Default)]
pub struct Network {
    adjacency: BTreeMap<String, BTreeSet<String>>,
    edges: HashMap<EdgeKey, Edge>,
}

impl Network {
    pub fn new() -> Self {
        Network {
            adjacency: BTreeMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn add_vertex(&mut self, label: &str) -> Result<()> {
        if self.adjacency.contains_key(label) {
            return Err(TrafficError::DuplicateVertex(label.to_string()));
        }
        self.adjacency.insert(label.to_string(), BTreeSet::new());
        Ok(())
    }

    pub fn add_edge(&mut self, u: &str, v: &str, base_weight: f64) -> Result<()> {
        if !(base_weight.is_finite() && base_weight > 0.0) {
            return Err(TrafficError::InvalidWeight(base_weight));
        }
        if !self.adjacency.contains_key(u) {
            return Err(TrafficError::UnknownVertex(u.to_string()));
        }
        if !self.adjacency.contains_key(v) {
            return Err(TrafficError::UnknownVertex(v.to_string()));
        }
        let key = EdgeKey::new(u, v);
        if self.edges.contains_key(&key) {
            return Err(TrafficError::DuplicateEdge(key));
        }

        self.adjacency.get_mut(u).unwrap().insert(v.to_string());
        self.adjacency.get_mut(v).unwrap().insert(u.to_string());
        self.edges.insert(
            key.clone(),
            Edge {
                key,
                base_weight,
                current_weight: base_weight,
            },
        );
        Ok(())
    }

    /// Removes an edge and returns it. Callers owning event state must cascade
    /// events that reference the removed edge.
    pub fn remove_edge(&mut self, u: &str, v: &str) -> Result<Edge> {
        let key = EdgeKey::new(u, v);
        let edge = self
            .edges
            .remove(&key)
            .ok_or_else(|| TrafficError::EdgeNotFound(key.clone()))?;
        if let Some(neighbors) = self.adjacency.get_mut(u) {
            neighbors.remove(v);
        }
        if let Some(neighbors) = self.adjacency.get_mut(v) {
            neighbors.remove(u);
        }
        Ok(edge)
    }

    /// Removes a vertex together with all of its incident edges. Returns the
    /// removed edges so event state can be cascaded.
    pub fn remove_vertex(&mut self, label: &str) -> Result<Vec<Edge>> {
        let neighbors = self
            .adjacency
            .remove(label)
            .ok_or_else(|| TrafficError::UnknownVertex(label.to_string()))?;
        let mut removed = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            if let Some(adjacent) = self.adjacency.get_mut(&neighbor) {
                adjacent.remove(label);
            }
            if let Some(edge) = self.edges.remove(&EdgeKey::new(label, &neighbor)) {
                removed.push(edge);
            }
        }
        Ok(removed)
    }

    pub fn contains_vertex(&self, label: &str) -> bool {
        self.adjacency.contains_key(label)
    }

    pub fn contains_edge(&self, u: &str, v: &str) -> bool {
        self.edges.contains_key(&EdgeKey::new(u, v))
    }

    pub fn get_edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn current_weight(&self, u: &str, v: &str) -> Result<f64> {
        let key = EdgeKey::new(u, v);
        self.edges
            .get(&key)
            .map(|e| e.current_weight)
            .ok_or(TrafficError::UnknownEdge(key))
    }

    pub fn base_weight(&self, u: &str, v: &str) -> Result<f64> {
        let key = EdgeKey::new(u, v);
        self.edges
            .get(&key)
            .map(|e| e.base_weight)
            .ok_or(TrafficError::UnknownEdge(key))
    }

    pub(crate) fn set_current_weight(&mut self, key: &EdgeKey, weight: f64) -> Result<()> {
        let edge = self
            .edges
            .get_mut(key)
            .ok_or_else(|| TrafficError::UnknownEdge(key.clone()))?;
        edge.current_weight = weight;
        Ok(())
    }

    /// Neighbor labels of a vertex in lexicographic order.
    pub fn adjacent<'a>(&'a self, vertex: &str) -> Result<impl Iterator<Item = &'a str> + 'a> {
        self.adjacency
            .get(vertex)
            .map(|neighbors| neighbors.iter().map(String::as_str))
            .ok_or_else(|| TrafficError::UnknownVertex(vertex.to_string()))
    }

    /// Neighbors together with the current weight of the connecting edge.
    pub fn neighbors<'a>(
        &'a self,
        vertex: &str,
    ) -> Result<impl Iterator<Item = (&'a str, f64)> + 'a> {
        let vertex = vertex.to_string();
        let neighbors = self
            .adjacency
            .get(&vertex)
            .ok_or_else(|| TrafficError::UnknownVertex(vertex.clone()))?;
        Ok(neighbors.iter().map(move |n| {
            let key = EdgeKey::new(&vertex, n);
            let weight = self.edges[&key].current_weight;
            (n.as_str(), weight)
        }))
    }

    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Snapshot of all unique edges, ordered by key.
    pub fn edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<_> = self.edges.values().collect();
        edges.sort_by(|a, b| a.key.cmp(&b.key));
        edges
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn total_base_distance(&self) -> f64 {
        self.edges.values().map(|e| e.base_weight).sum()
    }
}
