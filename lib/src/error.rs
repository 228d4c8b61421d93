use thiserror::Error;

/// The six error kinds the simulation can raise. Fatal kinds propagate
/// through `Result`; soft kinds are constructed, logged, and dropped in
/// place by the caller (see `report_soft_error`).
#[derive(Debug, Error)]
pub enum SimError {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed workload trace: {0}")]
    Trace(String),

    #[error("malformed DAG graph: {0}")]
    Graph(String),

    #[error("ready queue exceeded max_queue_size ({max}): dropping dag {dag_id} tid {tid}")]
    Capacity { dag_id: i32, tid: i32, max: usize },

    #[error("scheduling policy returned an inconsistent binding: {0}")]
    Policy(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// `PolicyError`/`InvariantError` are fatal in debug builds (so a broken
/// invariant is caught immediately during development) and degrade to a
/// logged warning in release builds.
pub fn report_soft_error(err: SimError) {
    if cfg!(debug_assertions) {
        panic!("{err}");
    } else {
        log::warn!("{err}");
    }
}
