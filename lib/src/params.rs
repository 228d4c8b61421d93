use std::collections::HashMap;

use crate::task::ServerType;

/// Runtime parameters handed to the policy and the simulator loop.
/// Distinct from `SimConfig` (the on-disk, serde-deserialized shape): this
/// is the resolved, typed form the rest of the crate operates on.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub server_counts: HashMap<ServerType, usize>,
    pub server_stdev: HashMap<ServerType, f32>,
    pub max_tasks_simulated: u64,
    pub max_queue_size: usize,
    pub mean_arrival_time: f64,
    pub power_mgmt_enabled: bool,
    pub histogram_bin_size: usize,
    pub random_seed: u64,
}
