//! Intra-artifact call graph.
//!
//! Nodes are method keys (`owner#name:descriptor`); edges only exist between methods that
//! are both defined inside the artifact, so external and platform callees never appear.
//! Adjacency is held in sorted maps and sets, making iteration order deterministic for the
//! refinement stage.

use std::collections::{BTreeMap, BTreeSet};

use crate::assembly::{MethodBody, Operand};

/// Directed call graph over the methods of one artifact.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from decoded method bodies. Every body becomes a node; a call edge
    /// is kept only when the callee is itself one of the given bodies.
    #[must_use]
    pub fn build(bodies: &[MethodBody]) -> Self {
        let mut graph = Self::new();
        let keys: BTreeSet<String> = bodies.iter().map(MethodBody::key).collect();
        for body in bodies {
            graph.add_node(body.key());
            for insn in &body.instructions {
                if let Operand::Call(call) = &insn.operand {
                    let callee = call.token();
                    if keys.contains(&callee) {
                        graph.add_edge(body.key(), callee);
                    }
                }
            }
        }
        graph
    }

    /// Adds a node with no edges. Idempotent.
    pub fn add_node(&mut self, key: String) {
        self.edges.entry(key).or_default();
    }

    /// Adds a directed edge, creating both endpoints as needed.
    pub fn add_edge(&mut self, from: String, to: String) {
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from).or_default().insert(to);
    }

    /// Whether `key` is a node of the graph.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.edges.contains_key(key)
    }

    /// Out-neighbors of `key`, in sorted order. Empty for unknown keys.
    pub fn callees(&self, key: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(key)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// All node keys, sorted.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{CallRef, FlowType, Instruction};

    fn call(owner: &str, name: &str, desc: &str) -> Instruction {
        Instruction {
            opcode: 0xB6,
            operand: Operand::Call(CallRef {
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor: desc.to_string(),
            }),
            flow: FlowType::Sequential,
        }
    }

    fn body(owner: &str, name: &str, instructions: Vec<Instruction>) -> MethodBody {
        MethodBody {
            instructions,
            ..MethodBody::new(owner, name, "()V")
        }
    }

    #[test]
    fn test_external_callees_excluded() {
        let bodies = vec![
            body("a/A", "f", vec![call("a/A", "g", "()V"), call("java/lang/Object", "toString", "()Ljava/lang/String;")]),
            body("a/A", "g", vec![]),
        ];
        let graph = CallGraph::build(&bodies);
        assert_eq!(graph.node_count(), 2);
        let callees: Vec<&str> = graph.callees("a/A#f:()V").collect();
        assert_eq!(callees, vec!["a/A#g:()V"]);
    }

    #[test]
    fn test_edges_sorted_and_deduplicated() {
        let mut graph = CallGraph::new();
        graph.add_edge("m".into(), "b".into());
        graph.add_edge("m".into(), "a".into());
        graph.add_edge("m".into(), "b".into());
        let callees: Vec<&str> = graph.callees("m").collect();
        assert_eq!(callees, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_key_has_no_callees() {
        let graph = CallGraph::new();
        assert_eq!(graph.callees("nope").count(), 0);
        assert!(!graph.contains("nope"));
    }
}
