//! Node registry
//!
//! The client's eventually-consistent view of who serves which slots. An
//! insertion-ordered set of nodes keyed by endpoint identity; the stable
//! order matters because scatter-gather and the distributed scan cursor both
//! index into it. Topology discovery is the sole writer.

use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::IndexedRandom;

use crate::connection::Connection;
use crate::node::Node;
use redroute_core::{Endpoint, Slot, SlotRange};

/// Ordered collection of known cluster members.
pub struct NodeRegistry<C: Connection> {
    nodes: RwLock<Vec<Arc<Node<C>>>>,
}

impl<C: Connection> NodeRegistry<C> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Replace the whole node set in one step. A concurrent reader sees
    /// either the previous topology or the new one, never a partial rebuild.
    ///
    /// A surviving endpoint keeps its node (and with it the live connection),
    /// with its ranges replaced wholesale; endpoints absent from
    /// `assignments` are dropped.
    pub(crate) fn rebuild(&self, assignments: Vec<(Endpoint, Vec<SlotRange>)>) {
        let mut nodes = self.nodes.write();
        let rebuilt = assignments
            .into_iter()
            .map(
                |(endpoint, ranges)| match nodes.iter().find(|n| *n.endpoint() == endpoint) {
                    Some(existing) => {
                        existing.set_ranges(ranges);
                        Arc::clone(existing)
                    }
                    None => Arc::new(Node::new(endpoint, ranges)),
                },
            )
            .collect();
        *nodes = rebuilt;
    }

    /// Fetch the node for `endpoint`, inserting one with no ranges if absent.
    ///
    /// Used for ASK targets: a temporary redirect does not imply ownership,
    /// so an existing node's ranges are left untouched.
    pub(crate) fn find_or_insert(&self, endpoint: Endpoint) -> Arc<Node<C>> {
        let mut nodes = self.nodes.write();
        if let Some(node) = nodes.iter().find(|n| *n.endpoint() == endpoint) {
            return Arc::clone(node);
        }
        let node = Arc::new(Node::new(endpoint, Vec::new()));
        nodes.push(Arc::clone(&node));
        node
    }

    /// First node whose range set contains `slot`.
    pub(crate) fn locate(&self, slot: Slot) -> Option<Arc<Node<C>>> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.has_slot(slot))
            .map(Arc::clone)
    }

    /// A uniformly random node, used when the originally computed target may
    /// have just become unreachable.
    pub(crate) fn random(&self) -> Option<Arc<Node<C>>> {
        self.nodes.read().choose(&mut rand::rng()).map(Arc::clone)
    }

    /// All nodes in stable registry order.
    pub(crate) fn all(&self) -> Vec<Arc<Node<C>>> {
        self.nodes.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Forget every node. Connections must be closed by the caller first.
    pub(crate) fn clear(&self) {
        self.nodes.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SlotAssignment;
    use crate::error::Result;
    use crate::value::Value;

    struct FakeConn;

    impl Connection for FakeConn {
        fn execute(&mut self, _command: &str, _args: &[String]) -> Result<Value> {
            Ok(Value::ok())
        }

        fn topology(&mut self) -> Result<Vec<SlotAssignment>> {
            Ok(Vec::new())
        }

        fn close(&mut self) {}
    }

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    fn registry() -> NodeRegistry<FakeConn> {
        let registry = NodeRegistry::new();
        registry.rebuild(vec![
            (ep(7000), vec![SlotRange::new(1, 1000)]),
            (ep(7001), vec![SlotRange::new(1001, 2000)]),
        ]);
        registry
    }

    #[test]
    fn test_rebuild_replaces_ranges_wholesale() {
        let registry = registry();
        registry.rebuild(vec![
            (ep(7000), vec![SlotRange::new(5000, 6000)]),
            (ep(7001), vec![SlotRange::new(1001, 2000)]),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.locate(888).is_none());
        assert!(registry.locate(5500).is_some());
    }

    #[test]
    fn test_rebuild_drops_retired_owners() {
        let registry = registry();
        registry.rebuild(vec![(ep(7000), vec![SlotRange::new(1, 2000)])]);

        assert_eq!(registry.len(), 1);
        assert!(registry.locate(1888).is_some());
        assert_eq!(*registry.locate(1888).unwrap().endpoint(), ep(7000));
    }

    #[test]
    fn test_rebuild_reuses_surviving_nodes() {
        let registry = registry();
        let before = registry.locate(888).unwrap();

        registry.rebuild(vec![
            (ep(7000), vec![SlotRange::new(1, 1000)]),
            (ep(7002), vec![SlotRange::new(2001, 3000)]),
        ]);

        let after = registry.locate(888).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(*registry.locate(2500).unwrap().endpoint(), ep(7002));
        assert!(registry.locate(1500).is_none());
    }

    #[test]
    fn test_rebuild_is_atomic_for_readers() {
        let registry = Arc::new(registry());
        let writer = Arc::clone(&registry);

        // Slot 500 is owned in both topologies; a reader must always find an
        // owner, no matter where the writer is in a rebuild.
        let handle = std::thread::spawn(move || {
            for i in 0..500 {
                if i % 2 == 0 {
                    writer.rebuild(vec![
                        (ep(7000), vec![SlotRange::new(1, 1000)]),
                        (ep(7001), vec![SlotRange::new(1001, 2000)]),
                    ]);
                } else {
                    writer.rebuild(vec![(ep(7002), vec![SlotRange::new(1, 2000)])]);
                }
            }
        });
        for _ in 0..500 {
            assert!(registry.locate(500).is_some());
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_locate_resolves_owner() {
        let registry = registry();
        assert_eq!(*registry.locate(888).unwrap().endpoint(), ep(7000));
        assert_eq!(*registry.locate(1500).unwrap().endpoint(), ep(7001));
        assert!(registry.locate(0).is_none());
    }

    #[test]
    fn test_find_or_insert_leaves_ranges_alone() {
        let registry = registry();
        let node = registry.find_or_insert(ep(7000));
        assert!(node.has_slot(888));

        let fresh = registry.find_or_insert(ep(7009));
        assert!(fresh.ranges().is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_random_picks_known_node() {
        let registry = registry();
        for _ in 0..16 {
            let node = registry.random().unwrap();
            assert!(registry.all().iter().any(|n| n.endpoint() == node.endpoint()));
        }
    }

    #[test]
    fn test_rebuild_order_is_assignment_order() {
        let registry = registry();
        registry.rebuild(vec![
            (ep(7000), vec![SlotRange::new(1, 1000)]),
            (ep(7001), vec![SlotRange::new(1001, 2000)]),
            (ep(7002), vec![]),
        ]);

        let ports: Vec<u16> = registry.all().iter().map(|n| n.endpoint().port).collect();
        assert_eq!(ports, vec![7000, 7001, 7002]);
    }

    #[test]
    fn test_clear_empties() {
        let registry = registry();
        registry.clear();
        assert_eq!(registry.len(), 0);
        assert!(registry.random().is_none());
    }
}
