use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::info;

use crate::error::SimError;
use crate::task::CostEntry;

/// Unit of the ready queue. `dag_type` rides along directly rather than
/// requiring a lookup through another owner — this is what lets the
/// simulator attribute per-type trace lines and stats to a completion
/// without reaching into the manager's registry.
#[derive(Debug, Clone)]
pub struct ReadyDescriptor {
    pub effective_arrival_time: i64,
    pub base_cost: f32,
    pub dag_id: i32,
    pub dag_type: String,
    pub tid: i32,
    pub per_server_cost_table: Vec<CostEntry>,
}

/// Unit of the completion queue, carrying `dag_type` forward from the
/// descriptor for the same reason as above.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub dag_id: i32,
    pub dag_type: String,
    pub tid: i32,
    pub arrival_time_when_enqueued: i64,
    pub actual_service_time: i64,
}

struct QueueState {
    ready: Vec<ReadyDescriptor>,
    next_arrival_time: i64,
    meta_start: bool,
}

struct CompletionState {
    completions: VecDeque<CompletionRecord>,
}

/// Shared state between the manager context and the simulator context.
/// `queue_lock` protects the ready queue, `next_arrival_time`, and
/// `meta_start`; `completion_lock` protects the completion queue and
/// `task_completed_flag`. The two locks are never nested.
pub struct Bridge {
    queue_lock: Mutex<QueueState>,
    completion_lock: Mutex<CompletionState>,
    task_completed_flag: AtomicBool,
    meta_done: AtomicBool,
    sim_done: AtomicBool,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            queue_lock: Mutex::new(QueueState {
                ready: Vec::new(),
                next_arrival_time: i64::MAX,
                meta_start: false,
            }),
            completion_lock: Mutex::new(CompletionState { completions: VecDeque::new() }),
            task_completed_flag: AtomicBool::new(false),
            meta_done: AtomicBool::new(false),
            sim_done: AtomicBool::new(false),
        }
    }

    /// Appends a batch of freshly-ready descriptors, re-sorts by
    /// `effective_arrival_time` (stable, so insertion order survives ties),
    /// and refreshes `next_arrival_time` to the new queue head. Manager side.
    pub fn append_ready_batch(&self, mut batch: Vec<ReadyDescriptor>) {
        if batch.is_empty() {
            return;
        }
        let mut q = self.queue_lock.lock().unwrap();
        q.ready.append(&mut batch);
        q.ready.sort_by_key(|d| d.effective_arrival_time);
        q.next_arrival_time = q.ready.first().map(|d| d.effective_arrival_time).unwrap_or(i64::MAX);
    }

    /// Appends as much of `batch` as fits under `max_queue_size`: excess
    /// descriptors are logged as a `SimError::Capacity` at info and dropped
    /// rather than pushed past capacity. Returns the dropped descriptors
    /// (in their original relative order) so the caller can undo any
    /// bookkeeping it already did against them — e.g. leave their source
    /// node `Unscheduled` instead of `Enqueued` so it is retried on a
    /// later tick rather than being stuck forever.
    pub fn try_append_ready_batch(&self, mut batch: Vec<ReadyDescriptor>, max_queue_size: usize) -> Vec<ReadyDescriptor> {
        let mut q = self.queue_lock.lock().unwrap();
        let room = max_queue_size.saturating_sub(q.ready.len());
        let split_at = room.min(batch.len());
        let dropped = batch.split_off(split_at);
        for d in &dropped {
            info!("{}", SimError::Capacity { dag_id: d.dag_id, tid: d.tid, max: max_queue_size });
        }
        if !batch.is_empty() {
            q.ready.append(&mut batch);
            q.ready.sort_by_key(|d| d.effective_arrival_time);
            q.next_arrival_time = q.ready.first().map(|d| d.effective_arrival_time).unwrap_or(i64::MAX);
        }
        dropped
    }

    pub fn next_arrival_time(&self) -> i64 {
        self.queue_lock.lock().unwrap().next_arrival_time
    }

    pub fn ready_len(&self) -> usize {
        self.queue_lock.lock().unwrap().ready.len()
    }

    pub fn set_meta_start(&self) {
        self.queue_lock.lock().unwrap().meta_start = true;
    }

    pub fn meta_started(&self) -> bool {
        self.queue_lock.lock().unwrap().meta_start
    }

    /// Runs `f` against the ready queue under `queue_lock`, then refreshes
    /// `next_arrival_time`. Used by the simulator to run `policy.pick`
    /// against a consistent view of the queue it mutates in place.
    pub fn with_ready_queue<R>(&self, f: impl FnOnce(&mut Vec<ReadyDescriptor>) -> R) -> R {
        let mut q = self.queue_lock.lock().unwrap();
        let result = f(&mut q.ready);
        q.next_arrival_time = q.ready.first().map(|d| d.effective_arrival_time).unwrap_or(i64::MAX);
        result
    }

    /// Lets the simulator park a preliminary guess at the next arrival
    /// instant without disturbing a queue that already has a real head —
    /// the manager's next append always overwrites this on the next queue
    /// mutation.
    pub fn set_preliminary_next_arrival(&self, candidate: i64) {
        let mut q = self.queue_lock.lock().unwrap();
        if q.ready.is_empty() {
            q.next_arrival_time = candidate;
        }
    }

    /// Simulator side: records a completed task and raises the flag.
    pub fn push_completion(&self, record: CompletionRecord) {
        let mut c = self.completion_lock.lock().unwrap();
        c.completions.push_back(record);
        self.task_completed_flag.store(true, Ordering::SeqCst);
    }

    /// Manager side: drains the completion queue under `completion_lock`.
    pub fn drain_completions(&self) -> Vec<CompletionRecord> {
        let mut c = self.completion_lock.lock().unwrap();
        c.completions.drain(..).collect()
    }

    pub fn lower_task_completed_flag_if_empty(&self) {
        let c = self.completion_lock.lock().unwrap();
        if c.completions.is_empty() {
            self.task_completed_flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn task_completed_flag(&self) -> bool {
        self.task_completed_flag.load(Ordering::SeqCst)
    }

    pub fn set_meta_done(&self) {
        self.meta_done.store(true, Ordering::SeqCst);
    }

    pub fn is_meta_done(&self) -> bool {
        self.meta_done.load(Ordering::SeqCst)
    }

    /// Raised by the simulator context once its own event loop has
    /// permanently stopped (no further admission is possible and every
    /// server has gone idle for good). The manager polls this to know it
    /// should give up on any DAG still active rather than spin on
    /// `registry.is_empty()` forever waiting for completions that will
    /// never arrive.
    pub fn set_sim_done(&self) {
        self.sim_done.store(true, Ordering::SeqCst);
    }

    pub fn is_sim_done(&self) -> bool {
        self.sim_done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(dag_id: i32, tid: i32, t: i64) -> ReadyDescriptor {
        ReadyDescriptor {
            effective_arrival_time: t,
            base_cost: 1.0,
            dag_id,
            dag_type: "T".into(),
            tid,
            per_server_cost_table: vec![],
        }
    }

    #[test]
    fn append_ready_batch_sorts_by_arrival_time_stably() {
        let bridge = Bridge::new();
        bridge.append_ready_batch(vec![descriptor(0, 0, 5), descriptor(1, 0, 2)]);
        bridge.append_ready_batch(vec![descriptor(2, 0, 2)]);

        assert_eq!(bridge.next_arrival_time(), 2);
        bridge.with_ready_queue(|q| {
            let order: Vec<_> = q.iter().map(|d| d.dag_id).collect();
            // dag 1 arrived before dag 2 was appended, both at time 2: stable sort keeps it first.
            assert_eq!(order, vec![1, 2, 0]);
        });
    }

    #[test]
    fn completion_queue_round_trips_and_lowers_flag() {
        let bridge = Bridge::new();
        bridge.push_completion(CompletionRecord {
            dag_id: 0,
            dag_type: "T".into(),
            tid: 0,
            arrival_time_when_enqueued: 0,
            actual_service_time: 10,
        });
        assert!(bridge.task_completed_flag());

        let drained = bridge.drain_completions();
        assert_eq!(drained.len(), 1);
        bridge.lower_task_completed_flag_if_empty();
        assert!(!bridge.task_completed_flag());
    }

    #[test]
    fn preliminary_next_arrival_is_ignored_once_queue_has_a_head() {
        let bridge = Bridge::new();
        bridge.append_ready_batch(vec![descriptor(0, 0, 3)]);
        bridge.set_preliminary_next_arrival(100);
        assert_eq!(bridge.next_arrival_time(), 3);
    }

    #[test]
    fn try_append_ready_batch_drops_past_capacity() {
        let bridge = Bridge::new();
        let dropped = bridge.try_append_ready_batch(vec![descriptor(0, 0, 1), descriptor(1, 0, 2)], 1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].dag_id, 1);
        assert_eq!(bridge.ready_len(), 1);
    }
}
