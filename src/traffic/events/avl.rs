use std::cmp::Ordering;

use crate::traffic::events::{Event, EventKey};
use crate::traffic::{Result, TrafficError};

/// Height-balanced binary search tree over events, keyed by
/// `(timestamp, id)`. Each node exclusively owns its children; rotations
/// rewire the boxes instead of copying events around.
#[derive(Debug, Default)]
pub struct EventIndex {
    root: Option<Box<AvlNode>>,
    len: usize,
}

#[derive(Debug)]
struct AvlNode {
    event: Event,
    height: u32,
    left: Option<Box<AvlNode>>,
    right: Option<Box<AvlNode>>,
}

fn height(node: &Option<Box<AvlNode>>) -> u32 {
    node.as_ref().map_or(0, |n| n.height)
}

impl AvlNode {
    fn new(event: Event) -> Box<AvlNode> {
        Box::new(AvlNode {
            event,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) as i32 - height(&self.right) as i32
    }
}

fn rotate_right(mut node: Box<AvlNode>) -> Box<AvlNode> {
    let mut pivot = node.left.take().expect("right rotation needs a left child");
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    pivot
}

fn rotate_left(mut node: Box<AvlNode>) -> Box<AvlNode> {
    let mut pivot = node.right.take().expect("left rotation needs a right child");
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    pivot
}

/// Recomputes the height of `node` and applies the rotation pattern for its
/// balance factor, if any. The double rotations are composed from the two
/// single ones.
fn rebalance(mut node: Box<AvlNode>) -> Box<AvlNode> {
    node.update_height();
    let balance = node.balance_factor();
    if balance > 1 {
        if node.left.as_ref().expect("left-heavy node").balance_factor() < 0 {
            node.left = Some(rotate_left(node.left.take().unwrap()));
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if node.right.as_ref().expect("right-heavy node").balance_factor() > 0 {
            node.right = Some(rotate_right(node.right.take().unwrap()));
        }
        return rotate_left(node);
    }
    node
}

impl EventIndex {
    pub fn new() -> Self {
        EventIndex::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> u32 {
        height(&self.root)
    }

    /// Inserts an event. Event keys are unique because ids are unique, so a
    /// colliding key indicates a bug in the caller.
    pub fn insert(&mut self, event: Event) {
        let root = self.root.take();
        self.root = Some(Self::insert_at(root, event));
        self.len += 1;
    }

    fn insert_at(node: Option<Box<AvlNode>>, event: Event) -> Box<AvlNode> {
        let Some(mut node) = node else {
            return AvlNode::new(event);
        };
        debug_assert_ne!(event.key(), node.event.key(), "event keys must be unique");
        if event.key() < node.event.key() {
            node.left = Some(Self::insert_at(node.left.take(), event));
        } else {
            node.right = Some(Self::insert_at(node.right.take(), event));
        }
        rebalance(node)
    }

    /// Removes the event with the given key and returns it. Unlike insertion,
    /// deletion rebalances at every ancestor on the way back up.
    pub fn remove(&mut self, key: EventKey) -> Result<Event> {
        let (root, removed) = Self::remove_at(self.root.take(), key);
        self.root = root;
        match removed {
            Some(event) => {
                self.len -= 1;
                Ok(event)
            }
            None => Err(TrafficError::EventNotFound(key.id)),
        }
    }

    fn remove_at(
        node: Option<Box<AvlNode>>,
        key: EventKey,
    ) -> (Option<Box<AvlNode>>, Option<Event>) {
        let Some(mut node) = node else {
            return (None, None);
        };

        let removed = match key.cmp(&node.event.key()) {
            Ordering::Less => {
                let (left, removed) = Self::remove_at(node.left.take(), key);
                node.left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = Self::remove_at(node.right.take(), key);
                node.right = right;
                removed
            }
            Ordering::Equal => {
                return match (node.left.take(), node.right.take()) {
                    (None, None) => (None, Some(node.event)),
                    (Some(child), None) | (None, Some(child)) => (Some(child), Some(node.event)),
                    (Some(left), Some(right)) => {
                        // Two children: replace with the in-order successor.
                        let (right, successor) = Self::pop_min(right);
                        let event = std::mem::replace(&mut node.event, successor);
                        node.left = Some(left);
                        node.right = right;
                        (Some(rebalance(node)), Some(event))
                    }
                };
            }
        };

        if removed.is_none() {
            return (Some(node), None);
        }
        (Some(rebalance(node)), removed)
    }

    fn pop_min(mut node: Box<AvlNode>) -> (Option<Box<AvlNode>>, Event) {
        match node.left.take() {
            None => (node.right.take(), node.event),
            Some(left) => {
                let (left, min) = Self::pop_min(left);
                node.left = left;
                (Some(rebalance(node)), min)
            }
        }
    }

    pub fn get(&self, key: EventKey) -> Option<&Event> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            node = match key.cmp(&n.event.key()) {
                Ordering::Less => n.left.as_deref(),
                Ordering::Greater => n.right.as_deref(),
                Ordering::Equal => return Some(&n.event),
            };
        }
        None
    }

    /// Lazy in-order walk, ascending by `(timestamp, id)`. Restartable: each
    /// call produces a fresh iterator.
    pub fn in_order(&self) -> InOrder<'_> {
        InOrder::new(&self.root)
    }
}

pub struct InOrder<'a> {
    stack: Vec<&'a AvlNode>,
}

impl<'a> InOrder<'a> {
    fn new(root: &'a Option<Box<AvlNode>>) -> Self {
        let mut iter = InOrder { stack: Vec::new() };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut node: &'a Option<Box<AvlNode>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = &n.left;
        }
    }
}

impl<'a> Iterator for InOrder<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(&node.right);
        Some(&node.event)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::{height, AvlNode, EventIndex};
    use crate::traffic::events::{Event, EventKey, EventType};
    use crate::traffic::network::EdgeKey;
    use crate::traffic::TrafficError;

    fn event(id: u64, timestamp: i64) -> Event {
        Event {
            id,
            timestamp,
            event_type: EventType::Accident,
            edge: EdgeKey::new("A", "B"),
            delta: 1.0,
        }
    }

    /// Checks the AVL invariant and the BST ordering for every node and
    /// returns the verified height.
    fn assert_well_formed(node: &Option<Box<AvlNode>>) -> u32 {
        let Some(n) = node else { return 0 };
        let left = assert_well_formed(&n.left);
        let right = assert_well_formed(&n.right);
        assert!(
            (left as i32 - right as i32).abs() <= 1,
            "balance factor out of range at id {}",
            n.event.id
        );
        assert_eq!(n.height, 1 + left.max(right), "stale cached height");
        if let Some(l) = &n.left {
            assert!(l.event.key() < n.event.key());
        }
        if let Some(r) = &n.right {
            assert!(r.event.key() > n.event.key());
        }
        1 + left.max(right)
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut index = EventIndex::new();
        for i in 0..64 {
            index.insert(event(i, i as i64));
            assert_well_formed(&index.root);
        }
        assert_eq!(index.len(), 64);
        // A balanced tree of 64 nodes must not be deeper than 7.
        assert!(index.height() <= 7, "height was {}", index.height());
    }

    #[test]
    fn descending_inserts_stay_balanced() {
        let mut index = EventIndex::new();
        for i in (0..64).rev() {
            index.insert(event(i, i as i64));
            assert_well_formed(&index.root);
        }
        assert!(index.height() <= 7, "height was {}", index.height());
    }

    #[test]
    fn in_order_yields_ascending_keys() {
        let mut index = EventIndex::new();
        for (id, timestamp) in [(1, 50), (2, 10), (3, 70), (4, 10), (5, 30)] {
            index.insert(event(id, timestamp));
        }
        let keys: Vec<EventKey> = index.in_order().map(Event::key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        // Equal timestamps are ordered by id.
        assert_eq!(keys[0], EventKey { timestamp: 10, id: 2 });
        assert_eq!(keys[1], EventKey { timestamp: 10, id: 4 });
    }

    #[test]
    fn in_order_is_restartable() {
        let mut index = EventIndex::new();
        for i in 0..5 {
            index.insert(event(i, i as i64));
        }
        let first: Vec<u64> = index.in_order().map(|e| e.id).collect();
        let second: Vec<u64> = index.in_order().map(|e| e.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn remove_leaf_single_child_and_two_children() {
        let mut index = EventIndex::new();
        for i in [4, 2, 6, 1, 3, 5, 7] {
            index.insert(event(i, i as i64));
        }

        // leaf
        let removed = index.remove(EventKey { timestamp: 1, id: 1 }).unwrap();
        assert_eq!(removed.id, 1);
        assert_well_formed(&index.root);

        // node with a single child (2 now only has right child 3)
        index.remove(EventKey { timestamp: 2, id: 2 }).unwrap();
        assert_well_formed(&index.root);

        // root with two children
        index.remove(EventKey { timestamp: 4, id: 4 }).unwrap();
        assert_well_formed(&index.root);

        let remaining: Vec<u64> = index.in_order().map(|e| e.id).collect();
        assert_eq!(remaining, vec![3, 5, 6, 7]);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn remove_unknown_key_fails() {
        let mut index = EventIndex::new();
        index.insert(event(1, 1));
        let result = index.remove(EventKey { timestamp: 2, id: 2 });
        assert!(matches!(result, Err(TrafficError::EventNotFound(2))));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn get_finds_exact_key_only() {
        let mut index = EventIndex::new();
        for i in 0..10 {
            index.insert(event(i, 100 + i as i64));
        }
        let found = index.get(EventKey { timestamp: 103, id: 3 }).unwrap();
        assert_eq!(found.id, 3);
        assert!(index.get(EventKey { timestamp: 103, id: 4 }).is_none());
    }

    #[test]
    fn randomized_inserts_and_removals_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut index = EventIndex::new();
        let mut live: Vec<EventKey> = Vec::new();

        for id in 0..500u64 {
            let timestamp = rng.random_range(0..100);
            let e = event(id, timestamp);
            live.push(e.key());
            index.insert(e);
        }
        assert_well_formed(&index.root);
        assert_eq!(index.len(), 500);

        live.shuffle(&mut rng);
        for key in live.drain(..250) {
            index.remove(key).unwrap();
            assert_well_formed(&index.root);
        }
        assert_eq!(index.len(), 250);

        let keys: Vec<EventKey> = index.in_order().map(Event::key).collect();
        assert_eq!(keys.len(), 250);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(index.height(), height(&index.root));
    }
}
