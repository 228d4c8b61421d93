use petgraph::graph::{Graph, NodeIndex};
use petgraph::Direction;

use crate::task::{TaskNode, TaskState};

/// A DAG's dependency graph: nodes are tasks, edges mean "must precede".
pub type TaskGraph = Graph<TaskNode, ()>;

/// Extensions over a plain `petgraph::Graph` needed by the manager loop:
/// no dummy source/sink nodes, no critical path, no parallel-provider
/// analysis — just source-node enumeration, readiness, and retirement.
pub trait GraphExtension {
    /// Nodes with in-degree zero, in graph iteration order.
    fn source_nodes(&self) -> Vec<NodeIndex>;

    /// A node is ready when it has in-degree zero and is still unscheduled.
    fn is_ready(&self, node: NodeIndex) -> bool;

    /// Remove a retired node from the graph.
    fn retire_node(&mut self, node: NodeIndex);
}

impl GraphExtension for TaskGraph {
    fn source_nodes(&self) -> Vec<NodeIndex> {
        self.node_indices()
            .filter(|&n| self.edges_directed(n, Direction::Incoming).next().is_none())
            .collect()
    }

    fn is_ready(&self, node: NodeIndex) -> bool {
        self[node].state == TaskState::Unscheduled
            && self.edges_directed(node, Direction::Incoming).next().is_none()
    }

    fn retire_node(&mut self, node: NodeIndex) {
        self.remove_node(node);
    }
}
