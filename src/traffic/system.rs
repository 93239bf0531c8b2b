use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use ahash::{HashMap, HashMapExt};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::traffic::config::Config;
use crate::traffic::events::avl::EventIndex;
use crate::traffic::events::{Event, EventKey, EventType};
use crate::traffic::network::{EdgeKey, Network};
use crate::traffic::router::{Route, Router, WeightMode};
use crate::traffic::{io, Result, TrafficError};

/// Result of the "ideal vs actual" route comparison. `ideal` is computed over
/// base weights as if no event were active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteComparison {
    pub actual: Route,
    pub ideal: Route,
    /// Extra cost caused by active events, `actual.total - ideal.total`.
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    pub vertices: usize,
    pub edges: usize,
    pub active_events: usize,
    pub events_by_type: BTreeMap<EventType, usize>,
    pub total_base_distance: f64,
}

/// Integration layer owning the road network and the event index. It is the
/// only place that mutates both, and it upholds the invariant that every
/// active event's delta is reflected in exactly one edge's current weight.
///
/// Single logical actor: no internal locking. Wrap the whole instance in one
/// exclusive lock if shared across threads.
#[derive(Debug)]
pub struct TrafficSystem {
    network: Network,
    index: EventIndex,
    // The tree is keyed by timestamp, so removal by id needs this mapping.
    timestamps: HashMap<u64, i64>,
    next_event_id: u64,
}

impl Default for TrafficSystem {
    fn default() -> Self {
        TrafficSystem::new()
    }
}

impl TrafficSystem {
    pub fn new() -> Self {
        TrafficSystem {
            network: Network::new(),
            index: EventIndex::new(),
            timestamps: HashMap::new(),
            next_event_id: 1,
        }
    }

    /// Read-only view of the network. All mutation goes through the system so
    /// the event/weight invariant can't be bypassed.
    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn add_vertex(&mut self, label: &str) -> Result<()> {
        self.network.add_vertex(label)?;
        debug!(vertex = label, "added vertex");
        Ok(())
    }

    pub fn add_edge(&mut self, u: &str, v: &str, base_weight: f64) -> Result<()> {
        self.network.add_edge(u, v, base_weight)?;
        debug!(edge = %EdgeKey::new(u, v), base_weight, "added edge");
        Ok(())
    }

    /// Removes a vertex with all incident edges; events referencing those
    /// edges are cascade-deleted like in [`Self::remove_edge`].
    pub fn remove_vertex(&mut self, label: &str) -> Result<Vec<Event>> {
        let edges = self.network.remove_vertex(label)?;
        let edge_keys: HashSet<EdgeKey> = edges.into_iter().map(|e| e.key).collect();
        let keys: Vec<EventKey> = self
            .index
            .in_order()
            .filter(|e| edge_keys.contains(&e.edge))
            .map(Event::key)
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            let event = self.index.remove(key)?;
            self.timestamps.remove(&event.id);
            removed.push(event);
        }
        debug!(vertex = label, events = removed.len(), "removed vertex");
        Ok(removed)
    }

    /// Removes an edge and cascade-deletes every active event that references
    /// it. Returns the removed events. Leaving dangling event references
    /// would corrupt the weight invariant, so the cascade is not optional.
    pub fn remove_edge(&mut self, u: &str, v: &str) -> Result<Vec<Event>> {
        let edge = self.network.remove_edge(u, v)?;
        let keys: Vec<EventKey> = self
            .index
            .in_order()
            .filter(|e| e.edge == edge.key)
            .map(Event::key)
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            let event = self.index.remove(key)?;
            self.timestamps.remove(&event.id);
            removed.push(event);
        }
        if !removed.is_empty() {
            info!(
                edge = %edge.key,
                count = removed.len(),
                "cascade-removed events of deleted edge"
            );
        }
        Ok(removed)
    }

    /// Registers a traffic event on an edge and applies its delta to the
    /// edge's current weight. All validation happens before any mutation, so
    /// a failure never leaves partial state behind.
    pub fn register_event(
        &mut self,
        event_type: EventType,
        u: &str,
        v: &str,
        delta: f64,
        timestamp: i64,
    ) -> Result<u64> {
        let id = self.next_event_id;
        let event = Event {
            id,
            timestamp,
            event_type,
            edge: EdgeKey::new(u, v),
            delta,
        };
        self.apply_event(event)?;
        self.next_event_id += 1;
        Ok(id)
    }

    /// Shared commit path for registration and persistence replay. Validates
    /// first, then mutates index, mapping and weight together.
    fn apply_event(&mut self, event: Event) -> Result<()> {
        let current = self
            .network
            .get_edge(&event.edge)
            .map(|e| e.current_weight)
            .ok_or_else(|| TrafficError::UnknownEdge(event.edge.clone()))?;
        // A traffic event must never make a road free or negative.
        if !event.delta.is_finite() || current + event.delta <= 0.0 {
            return Err(TrafficError::InvalidImpact {
                edge: event.edge,
                delta: event.delta,
                current,
            });
        }

        let key = event.edge.clone();
        let new_weight = current + event.delta;
        info!(
            id = event.id,
            event_type = %event.event_type,
            edge = %key,
            delta = event.delta,
            "registered event"
        );
        self.timestamps.insert(event.id, event.timestamp);
        self.index.insert(event);
        // Edge presence was validated above, this cannot fail anymore.
        self.network.set_current_weight(&key, new_weight)
    }

    /// Removes an event and reverses its weight contribution exactly.
    /// Validation happens up front, the index and the weight are only touched
    /// once the whole operation is known to succeed.
    pub fn remove_event(&mut self, id: u64) -> Result<Event> {
        let timestamp = *self
            .timestamps
            .get(&id)
            .ok_or(TrafficError::EventNotFound(id))?;
        let key = EventKey { timestamp, id };
        let event = self
            .index
            .get(key)
            .ok_or(TrafficError::EventNotFound(id))?;
        let current = self
            .network
            .get_edge(&event.edge)
            .map(|e| e.current_weight)
            .ok_or_else(|| TrafficError::UnknownEdge(event.edge.clone()))?;
        let new_weight = current - event.delta;

        let event = self.index.remove(key)?;
        self.timestamps.remove(&id);
        self.network.set_current_weight(&event.edge, new_weight)?;
        info!(id, edge = %event.edge, "removed event");
        Ok(event)
    }

    /// All active events in chronological `(timestamp, id)` order.
    pub fn active_events(&self) -> Vec<Event> {
        self.index.in_order().cloned().collect()
    }

    pub fn active_event_count(&self) -> usize {
        self.index.len()
    }

    pub fn active_events_for_edge(&self, u: &str, v: &str) -> Vec<Event> {
        let key = EdgeKey::new(u, v);
        self.index
            .in_order()
            .filter(|e| e.edge == key)
            .cloned()
            .collect()
    }

    /// Events affecting any segment of the given path, chronologically.
    pub fn events_on_route(&self, path: &[String]) -> Vec<Event> {
        let segments: HashSet<EdgeKey> = path
            .iter()
            .tuple_windows()
            .map(|(u, v)| EdgeKey::new(u, v))
            .collect();
        self.index
            .in_order()
            .filter(|e| segments.contains(&e.edge))
            .cloned()
            .collect()
    }

    /// Shortest path over current (event-affected) weights.
    pub fn shortest_path(&self, origin: &str, dest: &str) -> Result<Route> {
        Router::shortest_path(&self.network, origin, dest, WeightMode::Current)
    }

    /// Computes the route twice, over current and over base weights, to
    /// report how much the active events cost on this relation.
    pub fn compare_routes(&self, origin: &str, dest: &str) -> Result<RouteComparison> {
        let actual = Router::shortest_path(&self.network, origin, dest, WeightMode::Current)?;
        let ideal = Router::shortest_path(&self.network, origin, dest, WeightMode::Base)?;
        let delay = actual.total - ideal.total;
        Ok(RouteComparison {
            actual,
            ideal,
            delay,
        })
    }

    /// Removes all events older than `max_age` relative to `now` and returns
    /// how many were swept.
    pub fn expire_events(&mut self, now: i64, max_age: i64) -> Result<usize> {
        let expired: Vec<u64> = self
            .index
            .in_order()
            .filter(|e| now - e.timestamp > max_age)
            .map(|e| e.id)
            .collect();
        let count = expired.len();
        for id in expired {
            self.remove_event(id)?;
        }
        if count > 0 {
            info!(count, "expired events");
        }
        Ok(count)
    }

    pub fn statistics(&self) -> SystemStats {
        let events_by_type: BTreeMap<EventType, usize> = self
            .index
            .in_order()
            .map(|e| e.event_type)
            .counts()
            .into_iter()
            .collect();
        SystemStats {
            vertices: self.network.vertex_count(),
            edges: self.network.edge_count(),
            active_events: self.index.len(),
            events_by_type,
            total_base_distance: self.network.total_base_distance(),
        }
    }

    pub fn save(&self, network_path: &Path, events_path: &Path) -> Result<()> {
        io::save(self, network_path, events_path)
    }

    pub fn load(network_path: &Path, events_path: &Path) -> Result<Self> {
        io::load(network_path, events_path)
    }

    pub fn save_to_config(&self, config: &Config) -> Result<()> {
        self.save(&config.network_file, &config.events_file)
    }

    pub fn load_from_config(config: &Config) -> Result<Self> {
        Self::load(&config.network_file, &config.events_file)
    }

    /// Replays a persisted event with its original id and timestamp.
    pub(crate) fn restore_event(&mut self, event: Event) -> Result<()> {
        let id = event.id;
        self.apply_event(event)?;
        self.next_event_id = self.next_event_id.max(id + 1);
        Ok(())
    }
}
