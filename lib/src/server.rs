use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::error::SimError;
use crate::task::ServerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Busy,
}

/// The task a server is currently running, identified by `(dag_id, tid)`
/// plus the arrival_time recorded on the ready descriptor when it was
/// enqueued (carried forward into the completion record for the manager).
#[derive(Debug, Clone)]
pub struct CurrentJob {
    pub dag_id: i32,
    pub dag_type: String,
    pub tid: i32,
    pub arrival_time_when_enqueued: i64,
}

/// A single execution unit. May be bound only while `Idle`.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: usize,
    pub server_type: ServerType,
    pub state: ServerState,
    pub current_job: Option<CurrentJob>,
    pub start_time: i64,
    pub end_exact: i64,
    pub end_estimated: i64,
    pub busy_time: i64,
    pub num_requests_served: u64,
    pub last_stopped_at: i64,
}

impl Server {
    pub fn new(id: usize, server_type: ServerType) -> Self {
        Self {
            id,
            server_type,
            state: ServerState::Idle,
            current_job: None,
            start_time: 0,
            end_exact: i64::MAX,
            end_estimated: i64::MAX,
            busy_time: 0,
            num_requests_served: 0,
            last_stopped_at: 0,
        }
    }

    /// Binds this (idle) server to a task, sampling a Normal service time.
    /// Returns the sampled service time. `PolicyError` if the server is
    /// already busy.
    pub fn assign(
        &mut self,
        sim_time: i64,
        job: CurrentJob,
        mean: f32,
        stdev: f32,
        rng: &mut StdRng,
    ) -> Result<i64, SimError> {
        if self.state == ServerState::Busy {
            return Err(SimError::Policy(format!(
                "server {} is already busy, cannot assign dag {} tid {}",
                self.id, job.dag_id, job.tid
            )));
        }

        let normal = Normal::new(mean, stdev)
            .map_err(|e| SimError::Policy(format!("invalid service-time distribution: {e}")))?;
        let service_time = normal.sample(rng).round() as i64;

        self.state = ServerState::Busy;
        self.current_job = Some(job);
        self.start_time = sim_time;
        self.end_exact = sim_time + service_time;
        self.end_estimated = sim_time + mean.round() as i64;
        self.busy_time += service_time;
        self.num_requests_served += 1;

        Ok(service_time)
    }

    /// Flips the server back to idle, returning the job it was running.
    pub fn release(&mut self, sim_time: i64) -> Option<CurrentJob> {
        let job = self.current_job.take();
        self.state = ServerState::Idle;
        self.end_exact = i64::MAX;
        self.end_estimated = i64::MAX;
        self.last_stopped_at = sim_time;
        job
    }
}
