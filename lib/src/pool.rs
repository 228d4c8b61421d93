use std::collections::HashMap;

use rand::rngs::StdRng;

use crate::error::SimError;
use crate::server::{CurrentJob, Server, ServerState};
use crate::task::ServerType;

/// Typed pool of servers. Invariant: `available_count(t) + busy_count(t) ==
/// configured_count(t)` for every server_type `t`.
pub struct ServerPool {
    servers: Vec<Server>,
    by_type: HashMap<ServerType, Vec<usize>>,
}

impl ServerPool {
    pub fn new(counts: &HashMap<ServerType, usize>) -> Self {
        let mut servers = Vec::new();
        let mut by_type: HashMap<ServerType, Vec<usize>> = HashMap::new();

        for server_type in ServerType::ALL {
            let count = counts.get(&server_type).copied().unwrap_or(0);
            let indices = by_type.entry(server_type).or_default();
            for _ in 0..count {
                let id = servers.len();
                indices.push(id);
                servers.push(Server::new(id, server_type));
            }
        }

        Self { servers, by_type }
    }

    pub fn total_configured(&self) -> usize {
        self.servers.len()
    }

    pub fn configured_count(&self, server_type: ServerType) -> usize {
        self.by_type.get(&server_type).map_or(0, Vec::len)
    }

    pub fn busy_count(&self, server_type: ServerType) -> usize {
        self.by_type
            .get(&server_type)
            .map(|ids| ids.iter().filter(|&&id| self.servers[id].state == ServerState::Busy).count())
            .unwrap_or(0)
    }

    pub fn available_count(&self, server_type: ServerType) -> usize {
        self.configured_count(server_type) - self.busy_count(server_type)
    }

    pub fn busy_count_total(&self) -> usize {
        self.servers.iter().filter(|s| s.state == ServerState::Busy).count()
    }

    /// First idle server of the given type, lowest id first.
    pub fn first_idle(&self, server_type: ServerType) -> Option<usize> {
        self.by_type
            .get(&server_type)?
            .iter()
            .copied()
            .find(|&id| self.servers[id].state == ServerState::Idle)
    }

    pub fn server(&self, id: usize) -> &Server {
        &self.servers[id]
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn assign(
        &mut self,
        id: usize,
        sim_time: i64,
        job: CurrentJob,
        mean: f32,
        stdev: f32,
        rng: &mut StdRng,
    ) -> Result<i64, SimError> {
        self.servers[id].assign(sim_time, job, mean, stdev, rng)
    }

    pub fn release(&mut self, id: usize, sim_time: i64) -> Option<CurrentJob> {
        self.servers[id].release(sim_time)
    }

    /// The BUSY server with the smallest `end_exact`, ties broken by lowest
    /// server id — list-scan order already guarantees this since `servers`
    /// is ordered by increasing id.
    pub fn earliest_end(&self) -> Option<(usize, i64)> {
        self.servers
            .iter()
            .filter(|s| s.state == ServerState::Busy)
            .map(|s| (s.id, s.end_exact))
            .min_by_key(|&(id, end)| (end, id))
    }
}
