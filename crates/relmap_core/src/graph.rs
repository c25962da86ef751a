//! Reference graph builder.
//!
//! Expands a set of root objects along cascade-eligible reference edges
//! into an explicit directed graph keyed by identity. The graph is a
//! general digraph: self-loops and multi-hop cycles are recorded exactly
//! once thanks to the visited set, so expansion can never loop or
//! overflow on circular object graphs.

use crate::identity::Identity;
use crate::metadata::{CascadePolicy, MetadataRepository};
use crate::reference::ObjectRef;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Operation direction driving cascade-policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Writing objects (insert/update).
    Insert,
    /// Removing objects.
    Delete,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One directed reference edge between two graph nodes.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Identity of the owning (referencing) object.
    pub from: Identity,
    /// Identity of the referenced object.
    pub to: Identity,
    /// True if the store enforces a foreign-key constraint on the edge.
    pub constrained: bool,
    /// Declared reference name, for diagnostics.
    pub reference: String,
}

/// Directed graph of identities discovered by expansion.
///
/// Nodes are kept in discovery order; the orderer relies on this for its
/// stable tie-break.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    nodes: Vec<Identity>,
    index: HashMap<Identity, usize>,
    edges: Vec<GraphEdge>,
}

impl ReferenceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, returning its discovery index.
    ///
    /// Re-adding an existing node returns the original index.
    pub fn add_node(&mut self, identity: Identity) -> usize {
        if let Some(&index) = self.index.get(&identity) {
            return index;
        }
        let index = self.nodes.len();
        self.index.insert(identity.clone(), index);
        self.nodes.push(identity);
        index
    }

    /// Adds an edge. Both endpoints must already be nodes; an edge with
    /// an unknown endpoint names no orderable pair and is dropped.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        if self.index.contains_key(&edge.from) && self.index.contains_key(&edge.to) {
            self.edges.push(edge);
        }
    }

    /// Returns true if the identity is a node.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    /// Returns the discovery index of a node.
    #[must_use]
    pub fn index_of(&self, identity: &Identity) -> Option<usize> {
        self.index.get(identity).copied()
    }

    /// Returns the nodes in discovery order.
    #[must_use]
    pub fn nodes(&self) -> &[Identity] {
        &self.nodes
    }

    /// Returns all edges in discovery order.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Supplies the recorded reference links of tracked objects.
///
/// Implemented by the transaction over its tracked-object side table.
/// Untracked identities simply have no links; their own references are
/// never loaded during expansion (ordering works on identities alone).
pub trait LinkSource {
    /// Returns the link targets of one declared reference of an object.
    fn links_of(&self, identity: &Identity, reference: &str) -> Vec<ObjectRef>;
}

/// Expands roots along cascade-eligible edges into a reference graph.
///
/// An edge is followed (its target joins the graph) only if its cascade
/// policy for `direction` is OBJECT. LINK edges do not cascade, but they
/// still order writes: a LINK edge whose target independently ends up in
/// the graph is recorded so the orderer sees its constraint. NONE edges
/// are ignored entirely.
///
/// Policies are read fresh from `metadata` on every call.
pub fn expand(
    roots: &[Identity],
    direction: Direction,
    metadata: &MetadataRepository,
    source: &impl LinkSource,
) -> ReferenceGraph {
    let mut graph = ReferenceGraph::new();
    let mut queue: VecDeque<Identity> = VecDeque::new();
    // LINK edges seen during the walk; kept only if both endpoints end
    // up in the graph.
    let mut deferred: Vec<GraphEdge> = Vec::new();

    for root in roots {
        if !graph.contains(root) {
            graph.add_node(root.clone());
            queue.push_back(root.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        for template in metadata.references_of(current.table()) {
            let policy = template.policy_for(direction);
            if policy == CascadePolicy::None {
                continue;
            }
            for target in source.links_of(&current, &template.name) {
                let target_identity = target.identity().clone();
                match policy {
                    CascadePolicy::Object => {
                        let newly_added = !graph.contains(&target_identity);
                        graph.add_node(target_identity.clone());
                        graph.add_edge(GraphEdge {
                            from: current.clone(),
                            to: target_identity.clone(),
                            constrained: template.constrained,
                            reference: template.name.clone(),
                        });
                        // Previously-visited nodes (and self-loops) are
                        // recorded but not re-expanded.
                        if newly_added {
                            queue.push_back(target_identity);
                        }
                    }
                    CascadePolicy::Link => {
                        deferred.push(GraphEdge {
                            from: current.clone(),
                            to: target_identity,
                            constrained: template.constrained,
                            reference: template.name.clone(),
                        });
                    }
                    CascadePolicy::None => unreachable!(),
                }
            }
        }
    }

    for edge in deferred {
        if graph.contains(&edge.to) {
            graph.add_edge(edge);
        }
    }

    graph
}
