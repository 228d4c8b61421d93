use std::sync::Arc;

use chrono::Utc;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp};

use crate::bridge::{Bridge, CompletionRecord};
use crate::error::{report_soft_error, SimError};
use crate::params::SimParams;
use crate::policy::SchedulingPolicy;
use crate::pool::ServerPool;
use crate::stats::Stats;
use crate::trace::TraceSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    PowerMgmt,
    Arrival,
    ServerFinish,
}

/// The simulator context. Owns virtual time and the server pool, drives
/// the event loop, and invokes the scheduling policy. Runs concurrently
/// with the manager context, synchronizing only through `bridge`.
pub struct Simulator {
    sim_time: i64,
    next_arrival_time: i64,
    next_power_mgmt_time: i64,
    last_handled_arrival: Option<i64>,
    pool: ServerPool,
    policy: Box<dyn SchedulingPolicy>,
    stats: Stats,
    trace: TraceSink,
    rng: StdRng,
    params: SimParams,
    bridge: Arc<Bridge>,
}

impl Simulator {
    pub fn new(
        bridge: Arc<Bridge>,
        pool: ServerPool,
        mut policy: Box<dyn SchedulingPolicy>,
        trace: TraceSink,
        params: SimParams,
    ) -> Result<Self, SimError> {
        if params.max_tasks_simulated > 0 && pool.total_configured() == 0 {
            return Err(SimError::Invariant(
                "zero servers configured across every type but max_tasks_simulated > 0: simulation cannot make progress".into(),
            ));
        }

        let stats = Stats::new(params.histogram_bin_size);
        policy.init(&pool, &stats, &params);
        let rng = StdRng::seed_from_u64(params.random_seed);

        Ok(Self {
            sim_time: 0,
            next_arrival_time: 0,
            next_power_mgmt_time: i64::MAX,
            last_handled_arrival: None,
            pool,
            policy,
            stats,
            trace,
            rng,
            params,
            bridge,
        })
    }

    fn next_serv_end_time(&self) -> i64 {
        self.pool.earliest_end().map(|(_, end)| end).unwrap_or(i64::MAX)
    }

    /// The bridge's real queue head dominates whenever the ready queue is
    /// nonempty; `self.next_arrival_time` is only a preliminary guess used
    /// to pace the queue-size histogram while the real queue is empty.
    /// Recomputation of the authoritative next-arrival instant is always
    /// delegated to the bridge on every queue mutation.
    fn candidate_arrival_time(&self) -> i64 {
        let real = self.bridge.next_arrival_time();
        if real < i64::MAX {
            real
        } else {
            self.next_arrival_time
        }
    }

    fn still_admitting(&self) -> bool {
        self.stats.tasks_generated < self.params.max_tasks_simulated
    }

    fn select_event(&self) -> Event {
        let next_arrival_time = self.candidate_arrival_time();
        let next_serv_end_time = self.next_serv_end_time();

        if self.params.power_mgmt_enabled
            && self.next_power_mgmt_time <= next_arrival_time
            && self.next_power_mgmt_time <= next_serv_end_time
        {
            return Event::PowerMgmt;
        }

        // A ready-queue head that is still sitting unconsumed (no server
        // free to take it) keeps reporting the same `next_arrival_time` on
        // every tick. Having already advanced `sim_time` to that instant
        // once, re-selecting ARRIVAL for it forever would starve
        // SERVER_FINISH and the simulator would never progress past it —
        // so an arrival instant is only eligible once per distinct value.
        let arrival_already_handled = self.last_handled_arrival == Some(next_arrival_time);

        if self.still_admitting()
            && !arrival_already_handled
            && (next_arrival_time <= self.next_power_mgmt_time || !self.params.power_mgmt_enabled)
            && (next_arrival_time <= next_serv_end_time || !self.still_admitting())
        {
            return Event::Arrival;
        }

        if !(next_serv_end_time <= self.next_power_mgmt_time || !self.params.power_mgmt_enabled) {
            report_soft_error(SimError::Invariant(
                "event ordering violated: server-finish must precede power-mgmt".into(),
            ));
        }
        if !(next_serv_end_time <= next_arrival_time || !self.still_admitting() || arrival_already_handled) {
            report_soft_error(SimError::Invariant(
                "event ordering violated: server-finish must precede arrival".into(),
            ));
        }
        Event::ServerFinish
    }

    /// Runs the event loop to termination and returns the final
    /// `sim_time`. A ready queue that is still nonempty once admission
    /// has stopped and every server has gone idle is no longer enough to
    /// keep this loop alive on its own: nothing left can ever consume
    /// those descriptors (`dispatch_policy` itself stops picking once
    /// `still_admitting()` goes false), so looping on `ready_len() > 0`
    /// here would just spin forever once admission is cut short, e.g. by
    /// `max_tasks_simulated`.
    pub fn run(&mut self) -> Result<i64, SimError> {
        while self.still_admitting() || self.pool.busy_count_total() > 0 {
            match self.select_event() {
                Event::PowerMgmt => self.handle_power_mgmt(),
                Event::Arrival => self.handle_arrival(),
                Event::ServerFinish => self.handle_server_finish()?,
            }
            self.dispatch_policy()?;
        }

        self.stats.log_summary(&self.pool, self.sim_time);
        self.bridge.set_sim_done();
        Ok(self.sim_time)
    }

    fn handle_power_mgmt(&mut self) {
        self.sim_time = self.next_power_mgmt_time;
        warn!("[{:>10}] power management not yet supported", self.sim_time);
        self.next_power_mgmt_time = i64::MAX;
    }

    fn handle_arrival(&mut self) {
        // The bridge's real queue head can in principle report an instant
        // earlier than `sim_time` if the manager thread appends it only
        // after the simulator has already fast-forwarded past it on a
        // preliminary (queue-empty) guess; `sim_time` must never move
        // backward, so the later of the two wins here. `last_handled_arrival`
        // still tracks the raw (unclamped) candidate so `select_event`'s
        // already-handled guard keys off the same value `candidate_arrival_time`
        // will report next tick.
        let candidate = self.candidate_arrival_time();
        self.last_handled_arrival = Some(candidate);
        self.sim_time = candidate.max(self.sim_time);
        self.stats.record_queue_size_change(self.sim_time, self.bridge.ready_len());

        if self.still_admitting() {
            let exp = Exp::new(1.0 / self.params.mean_arrival_time.max(f64::MIN_POSITIVE))
                .expect("mean_arrival_time must be positive");
            let draw = exp.sample(&mut self.rng).round() as i64;
            self.next_arrival_time = self.sim_time + draw;
            self.bridge.set_preliminary_next_arrival(self.next_arrival_time);
        } else {
            self.next_arrival_time = i64::MAX;
        }

        trace!(
            "[{:>10}] arrival event; next preliminary arrival at {}",
            self.sim_time,
            self.next_arrival_time
        );
    }

    /// Degrades to a logged soft failure (`InvariantError` is fatal only
    /// in debug builds) rather than aborting `run()` — these two
    /// conditions should never arise given `select_event`'s own ordering
    /// guarantees, so surfacing them as a skipped tick in release builds is
    /// safer than unwinding the whole simulation over an internal assertion.
    fn handle_server_finish(&mut self) -> Result<(), SimError> {
        let Some((server_id, end_exact)) = self.pool.earliest_end() else {
            report_soft_error(SimError::Invariant("SERVER_FINISH selected with no busy server".into()));
            return Ok(());
        };
        self.sim_time = end_exact;

        let server_type = self.pool.server(server_id).server_type;
        let Some(job) = self.pool.release(server_id, self.sim_time) else {
            report_soft_error(SimError::Invariant(format!("server {server_id} had no current job at release")));
            return Ok(());
        };
        // The span the manager folds into `ready_time` must cover the full
        // wait-plus-execution interval since enqueue, not just the time
        // actually spent on the server — otherwise a DAG's ready_time
        // would understate real completion time whenever its task queued
        // behind a busy server.
        let actual_service_time = self.sim_time - job.arrival_time_when_enqueued;

        let resp_time = self.stats.record_completion(&job.dag_type, self.sim_time, job.arrival_time_when_enqueued);
        let global_avg = self.stats.avg_response_time();
        let type_avg = self.stats.avg_response_time_for_type(&job.dag_type);
        if let Err(e) = self.trace.record(self.sim_time, &job.dag_type, global_avg, type_avg, Utc::now()) {
            warn!("trace write failed: {e}");
        }

        self.bridge.push_completion(CompletionRecord {
            dag_id: job.dag_id,
            dag_type: job.dag_type.clone(),
            tid: job.tid,
            arrival_time_when_enqueued: job.arrival_time_when_enqueued,
            actual_service_time,
        });

        self.policy.on_release(self.sim_time, server_id);

        debug!(
            "[{:>10}] server {server_id} ({}) finished dag {} tid {}, resp_time={resp_time}",
            self.sim_time, server_type.as_str(), job.dag_id, job.tid
        );
        Ok(())
    }

    /// Invokes `policy.pick` repeatedly until it returns `None`, holding
    /// `queue_lock` for the full span of each call (see DESIGN.md). Stops
    /// picking once `max_tasks_simulated` has been reached so the two
    /// contexts agree deterministically on "no more admission" instead of
    /// racing the manager thread for who appends first.
    fn dispatch_policy(&mut self) -> Result<(), SimError> {
        loop {
            if !self.still_admitting() {
                break;
            }
            let sim_time = self.sim_time;
            let picked = {
                let policy = &mut self.policy;
                let pool = &mut self.pool;
                let rng = &mut self.rng;
                self.bridge.with_ready_queue(|q| policy.pick(sim_time, q, pool, rng))
            };
            match picked {
                Some(_server_id) => {
                    self.stats.tasks_generated += 1;
                    self.stats.record_queue_size_change(self.sim_time, self.bridge.ready_len());
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// Degrades a `PolicyError`/`InvariantError` to a logged warning in release
/// builds rather than aborting the run; kept available for call sites
/// that want that behavior explicitly instead of propagating.
pub fn soft_fail(err: SimError) {
    report_soft_error(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::FirstFitPolicy;
    use crate::task::{CostEntry, ServerType};
    use std::collections::HashMap;

    fn params(max_tasks: u64) -> SimParams {
        let mut server_counts = HashMap::new();
        server_counts.insert(ServerType::CpuCore, 1);
        let mut server_stdev = HashMap::new();
        server_stdev.insert(ServerType::CpuCore, 0.0);
        SimParams {
            server_counts,
            server_stdev,
            max_tasks_simulated: max_tasks,
            max_queue_size: usize::MAX,
            mean_arrival_time: 5.0,
            power_mgmt_enabled: false,
            histogram_bin_size: 1,
            random_seed: 0,
        }
    }

    fn scratch_trace() -> TraceSink {
        let dir = std::env::temp_dir().join(format!("sim_trace_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        TraceSink::new(&dir, "run", Utc::now()).unwrap()
    }

    #[test]
    fn zero_servers_with_nonzero_max_tasks_is_an_invariant_error_at_construction() {
        let p = params(10);
        let pool = ServerPool::new(&HashMap::new());
        let err = Simulator::new(Arc::new(Bridge::new()), pool, Box::new(FirstFitPolicy), scratch_trace(), p)
            .unwrap_err();
        assert!(matches!(err, SimError::Invariant(_)));
    }

    #[test]
    fn single_root_task_completes_after_its_deterministic_service_time() {
        let p = params(1);
        let pool = ServerPool::new(&p.server_counts.clone());
        let bridge = Arc::new(Bridge::new());
        bridge.append_ready_batch(vec![crate::bridge::ReadyDescriptor {
            effective_arrival_time: 0,
            base_cost: 10.0,
            dag_id: 0,
            dag_type: "T".into(),
            tid: 0,
            per_server_cost_table: vec![CostEntry { server_type: ServerType::CpuCore, mean: 10.0, stdev: 0.0 }],
        }]);

        let mut sim = Simulator::new(bridge.clone(), pool, Box::new(FirstFitPolicy), scratch_trace(), p).unwrap();
        let final_time = sim.run().unwrap();

        assert_eq!(final_time, 10);
        let completions = bridge.drain_completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].actual_service_time, 10);
    }
}
