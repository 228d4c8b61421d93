use petgraph::graph::NodeIndex;

use crate::dag_graph::TaskGraph;

/// A single job: a `dag_type` tag, its arrival bookkeeping, and the
/// dependency graph of its not-yet-retired tasks.
#[derive(Debug, Clone)]
pub struct Dag {
    pub dag_id: i32,
    pub dag_type: String,
    pub arrival_time: i64,
    pub ready_time: i64,
    pub resp_time: i64,
    pub graph: TaskGraph,
}

impl Dag {
    pub fn new(dag_id: i32, dag_type: String, arrival_time: i64, graph: TaskGraph) -> Self {
        Self {
            dag_id,
            dag_type,
            arrival_time,
            ready_time: arrival_time,
            resp_time: 0,
            graph,
        }
    }

    /// A DAG is terminal once every task in it has retired.
    pub fn is_terminal(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn find_node(&self, tid: i32) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&n| self.graph[n].tid == tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag_graph::TaskGraph;
    use crate::task::TaskNode;

    #[test]
    fn new_dag_starts_with_ready_time_equal_to_arrival() {
        let dag = Dag::new(7, "T".into(), 42, TaskGraph::new());
        assert_eq!(dag.ready_time, dag.arrival_time);
        assert!(dag.is_terminal());
    }

    #[test]
    fn find_node_matches_by_tid_not_index() {
        let mut graph = TaskGraph::new();
        graph.add_node(TaskNode::new(5, 1.0, vec![]));
        let dag = Dag::new(0, "T".into(), 0, graph);
        assert!(dag.find_node(5).is_some());
        assert!(dag.find_node(6).is_none());
    }
}
