use std::collections::HashMap;

use crate::dag::Dag;

/// Owns all active DAGs. Iteration order of the active list is the manager
/// loop's tick order.
#[derive(Default)]
pub struct DagRegistry {
    dags: HashMap<i32, Dag>,
    active: Vec<i32>,
}

impl DagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, dag: Dag) {
        let dag_id = dag.dag_id;
        self.dags.insert(dag_id, dag);
        self.active.push(dag_id);
    }

    pub fn lookup(&self, dag_id: i32) -> Option<&Dag> {
        self.dags.get(&dag_id)
    }

    pub fn lookup_mut(&mut self, dag_id: i32) -> Option<&mut Dag> {
        self.dags.get_mut(&dag_id)
    }

    /// Removes a DAG from both the map and the active list. Returns it so
    /// the caller can record its terminal response time.
    pub fn retire(&mut self, dag_id: i32) -> Option<Dag> {
        self.active.retain(|&id| id != dag_id);
        self.dags.remove(&dag_id)
    }

    pub fn iter_active(&self) -> impl Iterator<Item = i32> + '_ {
        self.active.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag_graph::TaskGraph;

    fn dag(id: i32) -> Dag {
        Dag::new(id, "T".into(), 0, TaskGraph::new())
    }

    #[test]
    fn admit_then_retire_keeps_map_and_list_in_sync() {
        let mut reg = DagRegistry::new();
        reg.admit(dag(1));
        reg.admit(dag(2));
        assert_eq!(reg.iter_active().collect::<Vec<_>>(), vec![1, 2]);

        let retired = reg.retire(1).unwrap();
        assert_eq!(retired.dag_id, 1);
        assert!(reg.lookup(1).is_none());
        assert_eq!(reg.iter_active().collect::<Vec<_>>(), vec![2]);
        assert!(!reg.is_empty());

        reg.retire(2);
        assert!(reg.is_empty());
    }
}
