use std::collections::HashMap;

use log::info;

use crate::pool::ServerPool;

/// Global counters owned by the simulator context: tasks generated and
/// serviced (overall and per `dag_type`), average response time (overall
/// and per `dag_type`), and a queue-size histogram.
pub struct Stats {
    pub tasks_generated: u64,
    pub tasks_serviced: u64,
    pub tasks_serviced_per_type: HashMap<String, u64>,
    total_response_time: i64,
    total_response_time_per_type: HashMap<String, i64>,
    histogram_bins: [i64; 10],
    histogram_bin_size: usize,
    last_queue_size: usize,
    last_size_change_time: i64,
}

impl Stats {
    pub fn new(histogram_bin_size: usize) -> Self {
        Self {
            tasks_generated: 0,
            tasks_serviced: 0,
            tasks_serviced_per_type: HashMap::new(),
            total_response_time: 0,
            total_response_time_per_type: HashMap::new(),
            histogram_bins: [0; 10],
            histogram_bin_size: histogram_bin_size.max(1),
            last_queue_size: 0,
            last_size_change_time: 0,
        }
    }

    fn bin_for(&self, queue_size: usize) -> usize {
        (queue_size / self.histogram_bin_size).min(9)
    }

    /// Folds in the time period spent at `last_queue_size` since the last
    /// transition, then records the transition to `new_size`.
    pub fn record_queue_size_change(&mut self, sim_time: i64, new_size: usize) {
        let bin = self.bin_for(self.last_queue_size);
        self.histogram_bins[bin] += sim_time - self.last_size_change_time;
        self.last_size_change_time = sim_time;
        self.last_queue_size = new_size;
    }

    /// One task completion: `arrival_time_when_enqueued` here is the
    /// descriptor's `effective_arrival_time` at the moment it was
    /// enqueued, so `resp_time = sim_time - arrival_time_when_enqueued`.
    pub fn record_completion(&mut self, dag_type: &str, sim_time: i64, arrival_time_when_enqueued: i64) -> i64 {
        let resp_time = sim_time - arrival_time_when_enqueued;
        self.tasks_serviced += 1;
        self.total_response_time += resp_time;
        *self.tasks_serviced_per_type.entry(dag_type.to_string()).or_insert(0) += 1;
        *self.total_response_time_per_type.entry(dag_type.to_string()).or_insert(0) += resp_time;
        resp_time
    }

    pub fn avg_response_time(&self) -> f64 {
        if self.tasks_serviced == 0 {
            0.0
        } else {
            self.total_response_time as f64 / self.tasks_serviced as f64
        }
    }

    pub fn avg_response_time_for_type(&self, dag_type: &str) -> f64 {
        let serviced = self.tasks_serviced_per_type.get(dag_type).copied().unwrap_or(0);
        if serviced == 0 {
            0.0
        } else {
            self.total_response_time_per_type.get(dag_type).copied().unwrap_or(0) as f64 / serviced as f64
        }
    }

    /// Normalizes the histogram to percentages, after folding in the final
    /// time period up to `sim_time` (the simulator's own `print_stats`
    /// does this same final update before normalizing).
    pub fn normalized_histogram(&mut self, sim_time: i64) -> [f64; 10] {
        self.record_queue_size_change(sim_time, self.last_queue_size);
        let total: i64 = self.histogram_bins.iter().sum();
        let mut out = [0.0; 10];
        if total > 0 {
            for (i, &count) in self.histogram_bins.iter().enumerate() {
                out[i] = (100.0 * count as f64 / total as f64 * 100.0).round() / 100.0;
            }
        }
        out
    }

    pub fn histogram_sum(&self) -> i64 {
        self.histogram_bins.iter().sum()
    }

    /// Logs the final-summary dump: totals, per-type averages, per-server
    /// busy time and utilization, and the normalized queue-size histogram.
    pub fn log_summary(&mut self, pool: &ServerPool, sim_time: i64) {
        info!("==================== Simulation Statistics ====================");
        info!(" Total simulation time: {sim_time}");
        info!(" Tasks serviced: {}", self.tasks_serviced);
        info!(" Response time (avg):");
        info!("   global: {:.1}", self.avg_response_time());
        for dag_type in self.tasks_serviced_per_type.keys() {
            info!("   {dag_type}: {:.1}", self.avg_response_time_for_type(dag_type));
        }
        info!(" Busy time / utilization:");
        for server in pool.servers() {
            let utilization = if sim_time > 0 { 100.0 * server.busy_time as f64 / sim_time as f64 } else { 0.0 };
            info!(
                "   server {} ({}): busy_time={} utilization={:.1}%",
                server.id,
                server.server_type.as_str(),
                server.busy_time,
                utilization
            );
        }
        let histogram = self.normalized_histogram(sim_time);
        info!(" Queue size histogram (bin size={}): {:?}", self.histogram_bin_size, histogram);
    }
}
