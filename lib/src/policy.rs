use rand::rngs::StdRng;

use crate::bridge::ReadyDescriptor;
use crate::params::SimParams;
use crate::pool::ServerPool;
use crate::stats::Stats;

/// The capability set a scheduling policy must provide. The concrete body
/// of a policy is out of scope beyond this interface and the one
/// built-in implementation in `policies::first_fit`.
pub trait SchedulingPolicy {
    /// Called once before simulation; the policy may cache pool structure.
    fn init(&mut self, pool: &ServerPool, stats: &Stats, params: &SimParams);

    /// Inspects (and may mutate, by removing the selected descriptor) the
    /// ready queue. If a binding is made, the policy calls `assign` on the
    /// chosen server itself and returns its id; otherwise returns `None`.
    fn pick(
        &mut self,
        sim_time: i64,
        ready_queue: &mut Vec<ReadyDescriptor>,
        pool: &mut ServerPool,
        rng: &mut StdRng,
    ) -> Option<usize>;

    /// Called after the simulator flips a server back to idle.
    fn on_release(&mut self, sim_time: i64, server_id: usize);
}
