use std::cmp::Ordering;

use ahash::{HashMap, HashMapExt};
use keyed_priority_queue::{Entry, KeyedPriorityQueue};
use serde::Serialize;

use crate::traffic::network::Network;
use crate::traffic::{Result, TrafficError};

/// Which weight the relaxation reads. `Base` exists only for the
/// "ideal vs actual" route comparison; regular routing always uses `Current`
/// so that active events are transparent to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    Current,
    Base,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub path: Vec<String>,
    pub total: f64,
}

/// Priority wrapper with reversed ordering, so the max-oriented queue pops
/// the smallest tentative distance first.
#[derive(PartialEq)]
struct Distance(f64);

impl Eq for Distance {}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).reverse()
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stateless single-source shortest path over the network's weights. Borrows
/// the network for the duration of one query and holds nothing between calls.
pub struct Router;

impl Router {
    pub fn shortest_path(
        network: &Network,
        origin: &str,
        dest: &str,
        mode: WeightMode,
    ) -> Result<Route> {
        if !network.contains_vertex(origin) {
            return Err(TrafficError::UnknownVertex(origin.to_string()));
        }
        if !network.contains_vertex(dest) {
            return Err(TrafficError::UnknownVertex(dest.to_string()));
        }
        if origin == dest {
            return Ok(Route {
                path: vec![origin.to_string()],
                total: 0.0,
            });
        }

        let (mut queue, mut distances) = Self::initial_queue(network, origin);
        let mut predecessors: HashMap<String, String> = HashMap::new();

        while let Some((current, distance)) = queue.pop() {
            if distance.0.is_infinite() {
                // The smallest remaining entry is unreachable, so all are.
                break;
            }
            if current == dest {
                break;
            }

            for neighbor in network.adjacent(&current)? {
                let weight = match mode {
                    WeightMode::Current => network.current_weight(&current, neighbor)?,
                    WeightMode::Base => network.base_weight(&current, neighbor)?,
                };
                let candidate = distance.0 + weight;
                // Vertices no longer in the queue are settled.
                if let Entry::Occupied(entry) = queue.entry(neighbor.to_string()) {
                    let best = distances[neighbor];
                    if candidate < best {
                        entry.set_priority(Distance(candidate));
                        distances.insert(neighbor.to_string(), candidate);
                        predecessors.insert(neighbor.to_string(), current.clone());
                    } else if candidate == best {
                        // Equal-cost paths keep the lexicographically smaller
                        // predecessor, which makes results deterministic.
                        if predecessors
                            .get(neighbor)
                            .is_some_and(|existing| current < *existing)
                        {
                            predecessors.insert(neighbor.to_string(), current.clone());
                        }
                    }
                }
            }
        }

        let total = distances[dest];
        if total.is_infinite() {
            return Err(TrafficError::UnreachableDestination {
                from: origin.to_string(),
                to: dest.to_string(),
            });
        }

        Ok(Route {
            path: Self::reconstruct_path(&predecessors, origin, dest),
            total,
        })
    }

    fn initial_queue(
        network: &Network,
        origin: &str,
    ) -> (KeyedPriorityQueue<String, Distance>, HashMap<String, f64>) {
        let mut queue = KeyedPriorityQueue::new();
        let mut distances = HashMap::new();
        for vertex in network.vertices() {
            let cost = if vertex == origin { 0.0 } else { f64::INFINITY };
            distances.insert(vertex.to_string(), cost);
            queue.push(vertex.to_string(), Distance(cost));
        }
        (queue, distances)
    }

    fn reconstruct_path(
        predecessors: &HashMap<String, String>,
        origin: &str,
        dest: &str,
    ) -> Vec<String> {
        let mut path = vec![dest.to_string()];
        let mut current = dest;
        while current != origin {
            let previous = &predecessors[current];
            path.push(previous.clone());
            current = previous;
        }
        path.reverse();
        path
    }
}
