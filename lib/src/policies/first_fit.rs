use rand::rngs::StdRng;

use crate::bridge::ReadyDescriptor;
use crate::error::report_soft_error;
use crate::params::SimParams;
use crate::policy::SchedulingPolicy;
use crate::pool::ServerPool;
use crate::server::CurrentJob;
use crate::stats::Stats;

/// Binds the head of the ready queue to the first idle server of the
/// first listed server type that can run it. Only ever looks at the head
/// of the ready queue: if the head cannot be placed this tick, the policy
/// stops rather than reaching past it, which is what ends `pick`'s
/// repeated-call loop for that tick.
#[derive(Default)]
pub struct FirstFitPolicy;

impl SchedulingPolicy for FirstFitPolicy {
    fn init(&mut self, _pool: &ServerPool, _stats: &Stats, _params: &SimParams) {}

    fn pick(
        &mut self,
        sim_time: i64,
        ready_queue: &mut Vec<ReadyDescriptor>,
        pool: &mut ServerPool,
        rng: &mut StdRng,
    ) -> Option<usize> {
        let head = ready_queue.first()?;

        for cost in &head.per_server_cost_table {
            let Some(server_id) = pool.first_idle(cost.server_type) else {
                continue;
            };

            let descriptor = ready_queue.remove(0);
            let job = CurrentJob {
                dag_id: descriptor.dag_id,
                dag_type: descriptor.dag_type.clone(),
                tid: descriptor.tid,
                arrival_time_when_enqueued: descriptor.effective_arrival_time,
            };
            match pool.assign(server_id, sim_time, job, cost.mean, cost.stdev, rng) {
                Ok(_) => return Some(server_id),
                Err(e) => {
                    report_soft_error(e);
                    return None;
                }
            }
        }

        None
    }

    fn on_release(&mut self, _sim_time: i64, _server_id: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{CostEntry, ServerType};
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn pool_with(counts: &[(ServerType, usize)]) -> ServerPool {
        let map: HashMap<_, _> = counts.iter().copied().collect();
        ServerPool::new(&map)
    }

    #[test]
    fn binds_head_of_queue_to_first_matching_idle_server() {
        let mut pool = pool_with(&[(ServerType::CpuCore, 1)]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut queue = vec![ReadyDescriptor {
            effective_arrival_time: 0,
            base_cost: 10.0,
            dag_id: 0,
            dag_type: "T".into(),
            tid: 0,
            per_server_cost_table: vec![CostEntry {
                server_type: ServerType::CpuCore,
                mean: 10.0,
                stdev: 0.0,
            }],
        }];

        let mut policy = FirstFitPolicy;
        let server_id = policy.pick(0, &mut queue, &mut pool, &mut rng).unwrap();

        assert_eq!(server_id, 0);
        assert!(queue.is_empty());
        assert_eq!(pool.busy_count(ServerType::CpuCore), 1);
    }

    #[test]
    fn leaves_queue_untouched_when_no_server_of_any_listed_type_is_idle() {
        let mut pool = pool_with(&[(ServerType::CpuCore, 0)]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut queue = vec![ReadyDescriptor {
            effective_arrival_time: 0,
            base_cost: 10.0,
            dag_id: 0,
            dag_type: "T".into(),
            tid: 0,
            per_server_cost_table: vec![CostEntry {
                server_type: ServerType::CpuCore,
                mean: 10.0,
                stdev: 0.0,
            }],
        }];

        let mut policy = FirstFitPolicy;
        assert!(policy.pick(0, &mut queue, &mut pool, &mut rng).is_none());
        assert_eq!(queue.len(), 1);
    }
}
