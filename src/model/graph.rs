//! Shape Dependency Graph
//!
//! Directed graph of every reference between shapes, built with petgraph.
//! Used for:
//! - Service closures (which shapes a client has to generate)
//! - Recursion analysis: strongly connected components over member edges,
//!   deciding which members need `Box<T>` in the generated types

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{Shape, ShapeId, ShapeType};

/// Kinds of edges in the shape graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// Aggregate member → target
    Member,
    /// Operation → input structure
    Input,
    /// Operation → output structure
    Output,
    /// Operation/service → error structure
    Error,
    /// Service/resource → operation
    Operation,
    /// Service/resource → resource
    Resource,
    /// Resource → identifier target
    Identifier,
}

// =============================================================================
// Recursion Analysis
// =============================================================================

/// A member that must be boxed because it closes a cycle of direct
/// structure/union containment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BoxedMember {
    pub container: ShapeId,
    pub member: String,
    pub target: ShapeId,
    /// SCC this member belongs to
    pub scc_id: usize,
}

/// A strongly connected component of the member graph
#[derive(Debug, Clone, Serialize)]
pub struct RecursiveGroup {
    pub id: usize,
    pub members: Vec<ShapeId>,
    pub is_self_referential: bool,
}

// =============================================================================
// Shape Graph
// =============================================================================

/// Reference graph over all shapes of a model
#[derive(Debug, Clone)]
pub struct ShapeGraph {
    graph: DiGraph<ShapeId, EdgeKind>,
    node_indices: BTreeMap<ShapeId, NodeIndex>,
    recursive_groups: Vec<RecursiveGroup>,
    boxed_members: BTreeSet<BoxedMember>,
}

impl ShapeGraph {
    /// Build the graph. Nodes are inserted in `ShapeId` order so node indices,
    /// and everything derived from them, are stable across runs.
    pub fn build(shapes: &BTreeMap<ShapeId, Shape>) -> Self {
        let mut graph = DiGraph::with_capacity(shapes.len(), shapes.len() * 2);
        let mut node_indices = BTreeMap::new();

        for id in shapes.keys() {
            let idx = graph.add_node(id.clone());
            node_indices.insert(id.clone(), idx);
        }

        for shape in shapes.values() {
            let from = node_indices[&shape.id];
            for (kind, target) in shape.references() {
                // Unknown targets are reported by the loader; the graph only
                // records edges between defined shapes.
                if let Some(&to) = node_indices.get(target) {
                    graph.add_edge(from, to, kind);
                }
            }
        }

        let (recursive_groups, boxed_members) = analyze_recursion(shapes);

        Self {
            graph,
            node_indices,
            recursive_groups,
            boxed_members,
        }
    }

    /// All shapes reachable from `root` (including `root`), ordered by id
    pub fn closure(&self, root: &ShapeId) -> BTreeSet<ShapeId> {
        let mut result = BTreeSet::new();
        let Some(&start) = self.node_indices.get(root) else {
            return result;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if let Some(id) = self.graph.node_weight(idx) {
                result.insert(id.clone());
            }
        }
        result
    }

    /// Direct outgoing references of a shape
    pub fn refs_out(&self, id: &ShapeId) -> Vec<(EdgeKind, &ShapeId)> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut refs: Vec<(EdgeKind, &ShapeId)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| self.graph.node_weight(e.target()).map(|t| (*e.weight(), t)))
            .collect();
        refs.sort_by(|a, b| a.1.cmp(b.1));
        refs
    }

    /// Shapes referring to `id`
    pub fn refs_in(&self, id: &ShapeId) -> Vec<&ShapeId> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut refs: Vec<&ShapeId> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n))
            .collect();
        refs.sort();
        refs.dedup();
        refs
    }

    pub fn needs_boxing(&self, container: &ShapeId, member: &str) -> bool {
        self.boxed_members
            .iter()
            .any(|b| &b.container == container && b.member == member)
    }

    pub fn boxed_members(&self) -> impl Iterator<Item = &BoxedMember> {
        self.boxed_members.iter()
    }

    pub fn recursive_groups(&self) -> &[RecursiveGroup] {
        &self.recursive_groups
    }

    pub fn is_recursive(&self, id: &ShapeId) -> bool {
        self.recursive_groups.iter().any(|g| g.members.contains(id))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Compute SCCs over member edges only and pick the members to box.
///
/// Lists and maps are part of the member graph (a cycle may run through a
/// `Vec`), but only direct structure/union → structure/union members are
/// boxed, since collections already provide indirection.
fn analyze_recursion(
    shapes: &BTreeMap<ShapeId, Shape>,
) -> (Vec<RecursiveGroup>, BTreeSet<BoxedMember>) {
    let mut graph: DiGraph<ShapeId, String> = DiGraph::new();
    let mut indices = BTreeMap::new();

    let is_container = |shape: &Shape| {
        matches!(
            shape.shape_type,
            ShapeType::Structure | ShapeType::Union | ShapeType::List | ShapeType::Set | ShapeType::Map
        )
    };

    for shape in shapes.values().filter(|s| is_container(s)) {
        indices.insert(shape.id.clone(), graph.add_node(shape.id.clone()));
    }
    for shape in shapes.values().filter(|s| is_container(s)) {
        let from = indices[&shape.id];
        for member in &shape.members {
            if let Some(&to) = indices.get(&member.target) {
                graph.add_edge(from, to, member.name.clone());
            }
        }
    }

    let mut sccs = kosaraju_scc(&graph);
    // kosaraju order depends on traversal; sort members and groups by id for stable numbering
    for scc in &mut sccs {
        scc.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    }
    sccs.sort_by(|a, b| graph[a[0]].cmp(&graph[b[0]]));

    let mut groups = Vec::new();
    let mut boxed = BTreeSet::new();

    for scc in sccs {
        let is_self_referential = scc.len() == 1
            && graph
                .edges_directed(scc[0], Direction::Outgoing)
                .any(|e| e.target() == scc[0]);
        if scc.len() == 1 && !is_self_referential {
            continue;
        }

        let scc_id = groups.len();
        let member_set: BTreeSet<NodeIndex> = scc.iter().copied().collect();

        for &node in &scc {
            let container = &shapes[&graph[node]];
            if !matches!(container.shape_type, ShapeType::Structure | ShapeType::Union) {
                continue;
            }
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                if !member_set.contains(&edge.target()) {
                    continue;
                }
                let target = &shapes[&graph[edge.target()]];
                if matches!(target.shape_type, ShapeType::Structure | ShapeType::Union) {
                    boxed.insert(BoxedMember {
                        container: container.id.clone(),
                        member: edge.weight().clone(),
                        target: target.id.clone(),
                        scc_id,
                    });
                }
            }
        }

        groups.push(RecursiveGroup {
            id: scc_id,
            members: scc.iter().map(|idx| graph[*idx].clone()).collect(),
            is_self_referential,
        });
    }

    (groups, boxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, Traits};

    fn id(s: &str) -> ShapeId {
        ShapeId::parse(s).unwrap()
    }

    fn structure(name: &str, members: &[(&str, &str)]) -> Shape {
        let mut shape = Shape::new(id(name), ShapeType::Structure, Traits::default());
        shape.members = members
            .iter()
            .map(|(m, t)| Member {
                name: m.to_string(),
                target: id(t),
                traits: Traits::default(),
            })
            .collect();
        shape
    }

    fn list(name: &str, target: &str) -> Shape {
        let mut shape = Shape::new(id(name), ShapeType::List, Traits::default());
        shape.members.push(Member {
            name: "member".to_string(),
            target: id(target),
            traits: Traits::default(),
        });
        shape
    }

    fn shapes(list: Vec<Shape>) -> BTreeMap<ShapeId, Shape> {
        list.into_iter().map(|s| (s.id.clone(), s)).collect()
    }

    #[test]
    fn test_self_recursive_member_is_boxed() {
        let graph = ShapeGraph::build(&shapes(vec![structure("ns#Node", &[("next", "ns#Node")])]));
        assert!(graph.needs_boxing(&id("ns#Node"), "next"));
        assert_eq!(graph.recursive_groups().len(), 1);
        assert!(graph.recursive_groups()[0].is_self_referential);
    }

    #[test]
    fn test_mutual_recursion_boxes_both_edges() {
        let graph = ShapeGraph::build(&shapes(vec![
            structure("ns#A", &[("b", "ns#B")]),
            structure("ns#B", &[("a", "ns#A")]),
        ]));
        assert!(graph.needs_boxing(&id("ns#A"), "b"));
        assert!(graph.needs_boxing(&id("ns#B"), "a"));
        assert!(graph.is_recursive(&id("ns#A")));
    }

    #[test]
    fn test_recursion_through_list_is_not_boxed() {
        let graph = ShapeGraph::build(&shapes(vec![
            structure("ns#Tree", &[("children", "ns#TreeList")]),
            list("ns#TreeList", "ns#Tree"),
        ]));
        assert!(graph.is_recursive(&id("ns#Tree")));
        assert!(!graph.needs_boxing(&id("ns#Tree"), "children"));
        assert_eq!(graph.boxed_members().count(), 0);
    }

    #[test]
    fn test_closure_follows_references() {
        let graph = ShapeGraph::build(&shapes(vec![
            structure("ns#Root", &[("child", "ns#Child")]),
            structure("ns#Child", &[]),
            structure("ns#Unrelated", &[]),
        ]));
        let closure = graph.closure(&id("ns#Root"));
        assert!(closure.contains(&id("ns#Child")));
        assert!(!closure.contains(&id("ns#Unrelated")));
        assert_eq!(graph.refs_in(&id("ns#Child")), vec![&id("ns#Root")]);
    }
}
