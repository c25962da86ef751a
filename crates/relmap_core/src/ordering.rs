//! Dependency orderer.
//!
//! Linearizes a reference graph into a constraint-safe sequence: for
//! every constrained edge `a -> b`, inserts put the referenced row `b`
//! first, deletes put the referencing row `a` first. Unconstrained edges
//! carry no ordering obligation and are excluded from the sort entirely -
//! which is why fully-unconstrained circular graphs order successfully.
//!
//! The sort is a stable Kahn topological sort: among nodes with no
//! constraint between them, discovery order wins, so repeated runs over
//! the same input produce the same output. The delete sequence is always
//! the exact reverse of the insert sequence over the same graph, tie-break
//! included, so inserting and then deleting a graph undoes it row by row.

use crate::error::{CoreError, CoreResult};
use crate::graph::{Direction, ReferenceGraph};
use crate::identity::Identity;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Orders a reference graph into a flush-safe sequence of identities.
///
/// # Errors
///
/// Returns [`CoreError::UnorderableCycle`] when at least one constrained
/// edge participates in a cycle; no valid total order exists then. The
/// caller can break the cycle by nulling one reference and re-issuing
/// the operation with that edge absent.
pub fn order(graph: &ReferenceGraph, direction: Direction) -> CoreResult<Vec<Identity>> {
    // Deletes must undo inserts row by row, so both directions sort the
    // same oriented graph and deletes read the result backwards. Sorting
    // the reversed edges instead would flip the edge obligations but not
    // the tie-break, breaking the reversal on graphs with ties.
    let mut sequence = insert_order(graph)?;
    if direction == Direction::Delete {
        sequence.reverse();
    }
    Ok(sequence)
}

/// Topological sort in insert orientation: for every constrained edge
/// `a -> b`, the referenced row `b` precedes `a`.
fn insert_order(graph: &ReferenceGraph) -> CoreResult<Vec<Identity>> {
    let node_count = graph.node_count();
    let mut indegree = vec![0usize; node_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];

    for edge in graph.edges() {
        if !edge.constrained {
            continue;
        }
        // Edges with endpoints outside the node set carry no obligation;
        // the graph builder drops them on entry.
        let (Some(from), Some(to)) = (graph.index_of(&edge.from), graph.index_of(&edge.to))
        else {
            continue;
        };
        if from == to {
            // A constrained self-loop can never be satisfied.
            return Err(CoreError::UnorderableCycle {
                members: vec![graph.nodes()[from].clone()],
            });
        }
        successors[to].push(from);
        indegree[from] += 1;
    }

    // Min-heap on discovery index keeps the tie-break stable.
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut sequence = Vec::with_capacity(node_count);
    let mut emitted = vec![false; node_count];

    while let Some(Reverse(index)) = ready.pop() {
        emitted[index] = true;
        sequence.push(graph.nodes()[index].clone());
        for &next in &successors[index] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if sequence.len() != node_count {
        let members: Vec<Identity> = emitted
            .iter()
            .enumerate()
            .filter(|&(_, done)| !done)
            .map(|(index, _)| graph.nodes()[index].clone())
            .collect();
        return Err(CoreError::UnorderableCycle { members });
    }

    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;
    use relmap_store::{RowKey, TableId};

    fn identity(n: i64) -> Identity {
        Identity::new(TableId::new(1), RowKey::from_i64(n))
    }

    fn edge(from: i64, to: i64, constrained: bool) -> GraphEdge {
        GraphEdge {
            from: identity(from),
            to: identity(to),
            constrained,
            reference: "next".to_owned(),
        }
    }

    fn graph(nodes: &[i64], edges: &[(i64, i64, bool)]) -> ReferenceGraph {
        let mut graph = ReferenceGraph::new();
        for &n in nodes {
            graph.add_node(identity(n));
        }
        for &(from, to, constrained) in edges {
            graph.add_edge(edge(from, to, constrained));
        }
        graph
    }

    #[test]
    fn constrained_insert_puts_referenced_row_first() {
        // 1 references 2; 2's row must exist before 1's.
        let g = graph(&[1, 2], &[(1, 2, true)]);
        let sequence = order(&g, Direction::Insert).unwrap();
        assert_eq!(sequence, vec![identity(2), identity(1)]);
    }

    #[test]
    fn constrained_delete_puts_referencing_row_first() {
        let g = graph(&[1, 2], &[(1, 2, true)]);
        let sequence = order(&g, Direction::Delete).unwrap();
        assert_eq!(sequence, vec![identity(1), identity(2)]);
    }

    #[test]
    fn unconstrained_cycle_orders_in_discovery_order() {
        let g = graph(
            &[1, 2, 3, 4],
            &[(1, 2, false), (2, 3, false), (3, 4, false), (4, 1, false)],
        );
        let sequence = order(&g, Direction::Insert).unwrap();
        assert_eq!(sequence, vec![identity(1), identity(2), identity(3), identity(4)]);
    }

    #[test]
    fn ordering_is_deterministic_across_runs() {
        let g = graph(
            &[7, 3, 9, 1],
            &[(7, 3, false), (9, 1, true)],
        );
        let first = order(&g, Direction::Insert).unwrap();
        let second = order(&g, Direction::Insert).unwrap();
        assert_eq!(first, second);
        // 1 must precede 9; the rest keep discovery order.
        assert_eq!(first, vec![identity(7), identity(3), identity(1), identity(9)]);
    }

    #[test]
    fn constrained_cycle_is_unorderable() {
        let g = graph(
            &[1, 2, 3, 4],
            &[(1, 2, true), (2, 3, false), (3, 4, false), (4, 1, false)],
        );
        // One constrained edge in the cycle is fine on its own...
        assert!(order(&g, Direction::Insert).is_ok());

        // ...but a fully-constrained cycle cannot be ordered.
        let g = graph(
            &[1, 2, 3, 4],
            &[(1, 2, true), (2, 3, true), (3, 4, true), (4, 1, true)],
        );
        let err = order(&g, Direction::Insert).unwrap_err();
        match err {
            CoreError::UnorderableCycle { members } => {
                assert_eq!(members.len(), 4);
            }
            other => panic!("expected UnorderableCycle, got {other}"),
        }
    }

    #[test]
    fn constrained_self_loop_is_unorderable() {
        let g = graph(&[1], &[(1, 1, true)]);
        let err = order(&g, Direction::Insert).unwrap_err();
        assert!(matches!(err, CoreError::UnorderableCycle { members } if members.len() == 1));
    }

    #[test]
    fn unconstrained_self_loop_is_fine() {
        let g = graph(&[1], &[(1, 1, false)]);
        assert_eq!(order(&g, Direction::Insert).unwrap(), vec![identity(1)]);
    }

    #[test]
    fn insert_and_delete_orders_are_reverses_on_acyclic_graphs() {
        // Diamond 1 -> {2, 4} -> 3: nodes 2 and 4 are tied, so only a
        // shared tie-break keeps the two directions mutual reverses.
        let g = graph(
            &[1, 2, 3, 4],
            &[(1, 2, true), (2, 3, true), (1, 4, true), (4, 3, true)],
        );
        let insert = order(&g, Direction::Insert).unwrap();
        let delete = order(&g, Direction::Delete).unwrap();
        assert_eq!(insert, vec![identity(3), identity(2), identity(4), identity(1)]);
        assert_eq!(
            delete,
            vec![identity(1), identity(4), identity(2), identity(3)]
        );
        let mut reversed = delete;
        reversed.reverse();
        assert_eq!(insert, reversed);
    }

    #[test]
    fn breaking_a_cycle_makes_it_orderable() {
        let g = graph(&[1, 2, 3], &[(1, 2, true), (2, 3, true), (3, 1, true)]);
        assert!(order(&g, Direction::Delete).is_err());

        // The documented workaround: null one reference and re-issue
        // with that edge absent.
        let g = graph(&[1, 2, 3], &[(1, 2, true), (2, 3, true)]);
        let sequence = order(&g, Direction::Delete).unwrap();
        assert_eq!(sequence, vec![identity(1), identity(2), identity(3)]);
    }
}
