use serde_derive::{Deserialize, Serialize};

/// A category of execution unit. Listed in the fixed declared order used to
/// read positional columns out of a compute-time matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServerType {
    CpuCore,
    Gpu,
    Accel,
}

impl ServerType {
    pub const ALL: [ServerType; 3] = [ServerType::CpuCore, ServerType::Gpu, ServerType::Accel];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::CpuCore => "cpu_core",
            ServerType::Gpu => "gpu",
            ServerType::Accel => "accel",
        }
    }
}

/// Scheduling flag carried by a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unscheduled,
    Enqueued,
    Running,
}

/// Mean/stdev service time on one server type, as drawn from the compute
/// matrix and the server-type configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostEntry {
    pub server_type: ServerType,
    pub mean: f32,
    pub stdev: f32,
}

/// A task node. No back-pointer to its owning DAG — identity outside the
/// graph is the `(dag_id, tid)` pair the manager loop carries around and
/// resolves through the registry.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub tid: i32,
    pub state: TaskState,
    pub base_cost: f32,
    pub costs: Vec<CostEntry>,
}

impl TaskNode {
    pub fn new(tid: i32, base_cost: f32, costs: Vec<CostEntry>) -> Self {
        Self {
            tid,
            state: TaskState::Unscheduled,
            base_cost,
            costs,
        }
    }

    pub fn cost_for(&self, server_type: ServerType) -> Option<CostEntry> {
        self.costs.iter().copied().find(|c| c.server_type == server_type)
    }
}
