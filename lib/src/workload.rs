use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;

use crate::config::SimConfig;
use crate::dag::Dag;
use crate::dag_graph::TaskGraph;
use crate::error::SimError;
use crate::task::{CostEntry, ServerType, TaskNode};

/// One line of the DAG arrival trace: `arrival_time, dag_id, dag_type`,
/// with `arrival_time` already multiplied by `arrival_time_scale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalRecord {
    pub arrival_time: i64,
    pub dag_id: i32,
    pub dag_type: String,
}

/// Reads the DAG arrival trace. Blank lines and a non-numeric header line
/// are tolerated; a missing file is a fatal `TraceError`.
pub fn load_arrival_trace(path: &Path, arrival_time_scale: i64) -> Result<Vec<ArrivalRecord>, SimError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SimError::Trace(format!("cannot read arrival trace {}: {e}", path.display())))?;

    let mut records = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(SimError::Trace(format!("malformed arrival trace line: {line:?}")));
        }
        let Ok(raw_arrival_time) = fields[0].parse::<i64>() else {
            continue; // header row
        };
        let dag_id = fields[1]
            .parse::<i32>()
            .map_err(|e| SimError::Trace(format!("bad dag_id in {line:?}: {e}")))?;
        records.push(ArrivalRecord {
            arrival_time: raw_arrival_time * arrival_time_scale,
            dag_id,
            dag_type: fields[2].to_string(),
        });
    }
    Ok(records)
}

/// Reads `random_comp_<dag_type>_<stdev_factor>.txt`: a CSV with a header
/// row, then one row per task `tid, base_cost, time_on_type_0, ...` in the
/// fixed declared order `ServerType::ALL`. Stdev per server_type comes
/// from the server-type configuration, not this file.
pub fn load_compute_matrix(
    working_dir: &Path,
    dag_type: &str,
    stdev_factor: &str,
    server_stdev: &HashMap<ServerType, f32>,
) -> Result<Vec<TaskNode>, SimError> {
    let path = working_dir.join(format!("random_comp_{dag_type}_{stdev_factor}.txt"));
    let text = fs::read_to_string(&path)
        .map_err(|e| SimError::Trace(format!("cannot read compute matrix {}: {e}", path.display())))?;

    let mut lines = text.lines();
    lines.next(); // header row: ignored (metadata columns aren't used by cost extraction either)

    let mut tasks = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 + ServerType::ALL.len() {
            return Err(SimError::Trace(format!("malformed compute matrix row: {line:?}")));
        }
        let tid = fields[0]
            .parse::<i32>()
            .map_err(|e| SimError::Trace(format!("bad tid in {line:?}: {e}")))?;
        let base_cost = fields[1]
            .parse::<f32>()
            .map_err(|e| SimError::Trace(format!("bad base_cost in {line:?}: {e}")))?;

        let mut costs = Vec::with_capacity(ServerType::ALL.len());
        for (k, server_type) in ServerType::ALL.into_iter().enumerate() {
            let mean = fields[2 + k]
                .parse::<f32>()
                .map_err(|e| SimError::Trace(format!("bad mean cost in {line:?}: {e}")))?;
            let stdev = server_stdev.get(&server_type).copied().unwrap_or(0.0);
            costs.push(CostEntry { server_type, mean, stdev });
        }
        tasks.push(TaskNode::new(tid, base_cost, costs));
    }
    tasks.sort_by_key(|t| t.tid);
    Ok(tasks)
}

/// Reads `random_dag_<dag_type>.csv`, an edge-list CSV (`source_tid,
/// target_tid` per line). `tasks` is authoritative for the full `tid`
/// set — isolated root nodes absent from the edge list are still
/// represented. Nodes are added in `tid` order so `NodeIndex(tid) ==
/// tid`, keeping index and task identity in lockstep.
pub fn load_dag_graph(working_dir: &Path, dag_type: &str, tasks: Vec<TaskNode>) -> Result<TaskGraph, SimError> {
    let path = working_dir.join(format!("random_dag_{dag_type}.csv"));
    let text = fs::read_to_string(&path)
        .map_err(|e| SimError::Graph(format!("cannot read DAG graph {}: {e}", path.display())))?;

    let mut graph = TaskGraph::new();
    let mut index_of = HashMap::new();
    for task in tasks {
        let tid = task.tid;
        let idx = graph.add_node(task);
        index_of.insert(tid, idx);
    }

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(SimError::Graph(format!("malformed DAG edge line: {line:?}")));
        }
        let Ok(source_tid) = fields[0].parse::<i32>() else {
            continue; // header row
        };
        let target_tid = fields[1]
            .parse::<i32>()
            .map_err(|e| SimError::Graph(format!("bad target_tid in {line:?}: {e}")))?;

        let source = *index_of
            .get(&source_tid)
            .ok_or_else(|| SimError::Graph(format!("edge references unknown tid {source_tid}")))?;
        let target = *index_of
            .get(&target_tid)
            .ok_or_else(|| SimError::Graph(format!("edge references unknown tid {target_tid}")))?;
        graph.add_edge(source, target, ());
    }

    if petgraph::algo::is_cyclic_directed(&graph) {
        return Err(SimError::Graph(format!("DAG {dag_type} contains a cycle")));
    }

    Ok(graph)
}

/// Builds one `Dag` from its arrival record plus the graph/compute-matrix
/// files keyed by `dag_type`.
pub fn build_dag(
    record: &ArrivalRecord,
    working_dir: &Path,
    stdev_factor: &str,
    server_stdev: &HashMap<ServerType, f32>,
) -> Result<Dag, SimError> {
    let tasks = load_compute_matrix(working_dir, &record.dag_type, stdev_factor, server_stdev)?;
    let graph = load_dag_graph(working_dir, &record.dag_type, tasks)?;
    Ok(Dag::new(record.dag_id, record.dag_type.clone(), record.arrival_time, graph))
}

/// Loads the full workload: the arrival trace plus every DAG it names,
/// sorted by arrival time ascending (ties keep trace order, matching the
/// trace-file's own declared arrival order). A malformed or missing graph
/// for one DAG is fatal; an arrival record referencing an already-seen
/// `dag_id` is a `TraceError`.
pub fn load_workload(config: &SimConfig) -> Result<Vec<Dag>, SimError> {
    let working_dir = Path::new(&config.working_dir);
    let trace_path = working_dir.join(&config.arrival_trace_file);
    let records = load_arrival_trace(&trace_path, config.arrival_time_scale)?;

    let mut server_stdev = HashMap::new();
    for (name, cfg) in &config.server_types {
        if let Some(server_type) = ServerType::ALL.into_iter().find(|t| t.as_str() == name) {
            server_stdev.insert(server_type, cfg.stdev_service_time);
        } else {
            warn!("unknown server_type {name} in config, ignoring for stdev lookup");
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut dags = Vec::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.dag_id) {
            return Err(SimError::Trace(format!("duplicate dag_id in arrival trace: {}", record.dag_id)));
        }
        dags.push(build_dag(record, working_dir, &config.stdev_factor, &server_stdev)?);
    }
    Ok(dags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use std::fs;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("workload_test_{tag}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_arrival_trace_tolerates_header_and_blank_lines_and_scales_time() {
        let dir = scratch_dir("trace");
        let path = dir.join("trace.csv");
        fs::write(&path, "arrival_time,dag_id,dag_type\n\n0,1,T\n3,2,T\n").unwrap();

        let records = load_arrival_trace(&path, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], ArrivalRecord { arrival_time: 0, dag_id: 1, dag_type: "T".into() });
        assert_eq!(records[1].arrival_time, 30);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_compute_matrix_reads_fixed_positional_columns() {
        let dir = scratch_dir("matrix");
        fs::write(
            dir.join("random_comp_T_1.0.txt"),
            "tid,base_cost,cpu_core,gpu,accel\n0,4.0,10.0,2.0,1.0\n1,4.0,5.0,1.0,0.5\n",
        )
        .unwrap();

        let mut stdev = Map::new();
        stdev.insert(ServerType::CpuCore, 1.0);
        let tasks = load_compute_matrix(&dir, "T", "1.0", &stdev).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].tid, 0);
        let cpu_cost = tasks[0].cost_for(ServerType::CpuCore).unwrap();
        assert_eq!(cpu_cost.mean, 10.0);
        assert_eq!(cpu_cost.stdev, 1.0);
        assert_eq!(tasks[0].cost_for(ServerType::Gpu).unwrap().mean, 2.0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_dag_graph_builds_edges_and_keeps_isolated_roots() {
        let dir = scratch_dir("graph");
        fs::write(dir.join("random_dag_T.csv"), "source_tid,target_tid\n0,1\n").unwrap();

        let tasks = vec![TaskNode::new(0, 1.0, vec![]), TaskNode::new(1, 1.0, vec![]), TaskNode::new(2, 1.0, vec![])];
        let graph = load_dag_graph(&dir, "T", tasks).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_dag_graph_rejects_a_cycle() {
        let dir = scratch_dir("cycle");
        fs::write(dir.join("random_dag_T.csv"), "source_tid,target_tid\n0,1\n1,0\n").unwrap();
        let tasks = vec![TaskNode::new(0, 1.0, vec![]), TaskNode::new(1, 1.0, vec![])];

        let err = load_dag_graph(&dir, "T", tasks).unwrap_err();
        assert!(matches!(err, SimError::Graph(_)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_arrival_trace_is_a_fatal_trace_error() {
        let err = load_arrival_trace(Path::new("/nonexistent/trace.csv"), 1).unwrap_err();
        assert!(matches!(err, SimError::Trace(_)));
    }
}
