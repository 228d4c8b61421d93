use std::sync::Arc;
use std::thread;

use chrono::Utc;
use log::info;

use crate::bridge::Bridge;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::manager::run_manager;
use crate::policies::FirstFitPolicy;
use crate::policy::SchedulingPolicy;
use crate::pool::ServerPool;
use crate::registry::DagRegistry;
use crate::result::{write_out_csv, ResultRow};
use crate::simulator::Simulator;
use crate::trace::TraceSink;
use crate::workload::load_workload;

/// Runs a complete simulation from a loaded `SimConfig`: loads the
/// workload, admits every DAG into a fresh registry, then runs the manager
/// and simulator contexts concurrently on their own OS threads,
/// communicating only through a shared `Bridge`. Returns the sorted
/// result rows; the caller is responsible for writing them to `out.csv`
/// via [`write_out_csv`].
///
/// `policy_name` selects a built-in scheduling policy by name from a
/// small name → constructor table; currently only `"first_fit"` is
/// registered.
pub fn run_simulation(config: &SimConfig, policy_name: &str) -> Result<Vec<ResultRow>, SimError> {
    let dags = load_workload(config)?;
    info!("loaded {} dags from {}", dags.len(), config.arrival_trace_file);

    let mut registry = DagRegistry::new();
    for dag in dags {
        registry.admit(dag);
    }

    let params = config.to_params()?;
    let pool = ServerPool::new(&params.server_counts);
    let policy = make_policy(policy_name)?;
    let trace = TraceSink::new(std::path::Path::new(&config.working_dir), "run", Utc::now())?;

    let bridge = Arc::new(Bridge::new());
    let max_queue_size = params.max_queue_size;

    let mut simulator = Simulator::new(bridge.clone(), pool, policy, trace, params)?;

    let manager_bridge = bridge.clone();
    let manager_handle = thread::spawn(move || run_manager(manager_bridge, registry, max_queue_size));

    let final_sim_time = simulator.run()?;
    info!("simulator finished at sim_time={final_sim_time}");

    let results = manager_handle
        .join()
        .map_err(|_| SimError::Invariant("manager thread panicked".into()))?;

    Ok(results)
}

/// Loads config, runs the simulation, and writes `out.csv` into
/// `output_dir`. This is the top-level entry point the `simulator`
/// binary crate calls from `main`.
pub fn run_and_write_results(config: &SimConfig, policy_name: &str, output_dir: &std::path::Path) -> Result<(), SimError> {
    let results = run_simulation(config, policy_name)?;
    let out_path = output_dir.join("out.csv");
    write_out_csv(&out_path, results)?;
    info!("wrote results to {}", out_path.display());
    Ok(())
}

fn make_policy(name: &str) -> Result<Box<dyn SchedulingPolicy>, SimError> {
    match name {
        "first_fit" => Ok(Box::new(FirstFitPolicy)),
        other => Err(SimError::Config(format!("unknown scheduling policy: {other}"))),
    }
}
