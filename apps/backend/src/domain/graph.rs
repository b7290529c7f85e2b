//! Transport graph queries.
//!
//! The map itself is an external collaborator; the core only asks "from this
//! node, where can I go by this transport". `StaticGraph` is an in-process
//! adjacency map for embedding and tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::domain::tickets::{TicketKind, Transport};
use crate::errors::domain::{DomainError, InfraErrorKind};

pub type NodeId = u32;

/// Pure reachability query over the board.
pub trait TransportGraph: Send + Sync {
    fn reachable(&self, from: NodeId, transport: Transport) -> BTreeSet<NodeId>;

    fn contains(&self, node: NodeId) -> bool;
}

/// Candidate destinations for a ticket: a single transport, or for `Special`
/// the union of taxi, bus and underground.
pub fn candidate_destinations(
    graph: &dyn TransportGraph,
    from: NodeId,
    ticket: TicketKind,
) -> BTreeSet<NodeId> {
    ticket
        .transports()
        .iter()
        .flat_map(|t| graph.reachable(from, *t))
        .collect()
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    pub transport: Transport,
}

#[derive(Debug, Deserialize)]
struct EdgeList {
    edges: Vec<Edge>,
}

/// Undirected adjacency map keyed by node then transport.
#[derive(Debug, Clone, Default)]
pub struct StaticGraph {
    adjacency: BTreeMap<NodeId, BTreeMap<Transport, BTreeSet<NodeId>>>,
}

impl StaticGraph {
    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut adjacency: BTreeMap<NodeId, BTreeMap<Transport, BTreeSet<NodeId>>> =
            BTreeMap::new();
        for edge in edges {
            adjacency
                .entry(edge.a)
                .or_default()
                .entry(edge.transport)
                .or_default()
                .insert(edge.b);
            adjacency
                .entry(edge.b)
                .or_default()
                .entry(edge.transport)
                .or_default()
                .insert(edge.a);
        }
        Self { adjacency }
    }

    /// Parse `{"edges": [{"a": 1, "b": 8, "transport": "taxi"}, ...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, DomainError> {
        let list: EdgeList = serde_json::from_str(json).map_err(|e| {
            DomainError::infra(
                InfraErrorKind::DataCorruption,
                format!("invalid graph definition: {e}"),
            )
        })?;
        Ok(Self::from_edges(list.edges))
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }
}

impl TransportGraph for StaticGraph {
    fn reachable(&self, from: NodeId, transport: Transport) -> BTreeSet<NodeId> {
        self.adjacency
            .get(&from)
            .and_then(|by_transport| by_transport.get(&transport))
            .cloned()
            .unwrap_or_default()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StaticGraph {
        StaticGraph::from_edges([
            Edge { a: 10, b: 15, transport: Transport::Taxi },
            Edge { a: 10, b: 11, transport: Transport::Taxi },
            Edge { a: 10, b: 30, transport: Transport::Bus },
            Edge { a: 10, b: 60, transport: Transport::Underground },
            Edge { a: 15, b: 30, transport: Transport::Taxi },
        ])
    }

    #[test]
    fn edges_are_undirected() {
        let g = sample();
        assert!(g.reachable(15, Transport::Taxi).contains(&10));
        assert!(g.reachable(60, Transport::Underground).contains(&10));
    }

    #[test]
    fn special_unions_all_base_transports() {
        let g = sample();
        let special = candidate_destinations(&g, 10, TicketKind::Special);
        assert_eq!(special, BTreeSet::from([11, 15, 30, 60]));
        let bus = candidate_destinations(&g, 10, TicketKind::Bus);
        assert_eq!(bus, BTreeSet::from([30]));
    }

    #[test]
    fn unknown_node_has_no_destinations() {
        let g = sample();
        assert!(!g.contains(999));
        assert!(candidate_destinations(&g, 999, TicketKind::Special).is_empty());
    }

    #[test]
    fn parses_json_edge_list() {
        let g = StaticGraph::from_json_str(
            r#"{"edges": [{"a": 1, "b": 8, "transport": "taxi"}, {"a": 1, "b": 46, "transport": "underground"}]}"#,
        )
        .unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.reachable(1, Transport::Underground), BTreeSet::from([46]));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = StaticGraph::from_json_str(r#"{"edges": [{"a": 1}]}"#).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Infra(InfraErrorKind::DataCorruption, _)
        ));
    }
}
