use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_derive::Deserialize;

use crate::error::SimError;
use crate::params::SimParams;
use crate::task::ServerType;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerTypeConfig {
    pub count: usize,
    pub mean_service_time: f32,
    pub stdev_service_time: f32,
}

/// On-disk configuration shape (YAML) for a simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub working_dir: String,
    pub arrival_trace_file: String,
    pub arrival_time_scale: i64,
    pub stdev_factor: String,
    pub server_types: HashMap<String, ServerTypeConfig>,
    #[serde(default = "default_max_tasks_simulated")]
    pub max_tasks_simulated: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_mean_arrival_time")]
    pub mean_arrival_time: f64,
    #[serde(default)]
    pub power_mgmt_enabled: bool,
    #[serde(default = "default_histogram_bin_size")]
    pub histogram_bin_size: usize,
    #[serde(default)]
    pub random_seed: u64,
}

fn default_max_tasks_simulated() -> u64 {
    u64::MAX
}

fn default_max_queue_size() -> usize {
    usize::MAX
}

fn default_mean_arrival_time() -> f64 {
    1.0
}

fn default_histogram_bin_size() -> usize {
    1
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_yaml::from_str(&text)
            .map_err(|e| SimError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    fn server_type_by_name(name: &str) -> Result<ServerType, SimError> {
        ServerType::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| SimError::Config(format!("unknown server_type: {name}")))
    }

    pub fn to_params(&self) -> Result<SimParams, SimError> {
        let mut server_counts = HashMap::new();
        let mut server_stdev = HashMap::new();

        for (name, cfg) in &self.server_types {
            let server_type = Self::server_type_by_name(name)?;
            server_counts.insert(server_type, cfg.count);
            server_stdev.insert(server_type, cfg.stdev_service_time);
        }

        Ok(SimParams {
            server_counts,
            server_stdev,
            max_tasks_simulated: self.max_tasks_simulated,
            max_queue_size: self.max_queue_size,
            mean_arrival_time: self.mean_arrival_time,
            power_mgmt_enabled: self.power_mgmt_enabled,
            histogram_bin_size: self.histogram_bin_size,
            random_seed: self.random_seed,
        })
    }
}
