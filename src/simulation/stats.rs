//! Running statistics and periodic metrics snapshots

use log::info;
use std::collections::VecDeque;

use super::types::{LaneId, LANE_COUNT};

/// Totals accumulated over a run
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    pub elapsed_time: f32,
    pub vehicles_spawned: usize,
    /// Spawn lines that failed to parse
    pub records_rejected: usize,
    /// Vehicles that have left the world
    pub vehicles_processed: usize,
    /// Queue time summed over processed vehicles
    pub total_wait_time: f32,
    pub max_wait_time: f32,
    pub forced_admissions: usize,
    pub emergency_admissions: usize,
    pub served_per_lane: [usize; LANE_COUNT],
}

impl SimulationStats {
    pub fn record_admission(&mut self, lane: LaneId) {
        self.served_per_lane[lane.index()] += 1;
    }

    pub fn record_exit(&mut self, wait: f32) {
        self.vehicles_processed += 1;
        self.total_wait_time += wait;
        self.max_wait_time = self.max_wait_time.max(wait);
    }

    /// Mean queue time of processed vehicles
    pub fn average_wait(&self) -> f32 {
        if self.vehicles_processed == 0 {
            0.0
        } else {
            self.total_wait_time / self.vehicles_processed as f32
        }
    }

    /// Processed vehicles per simulated minute
    pub fn throughput_per_minute(&self) -> f32 {
        if self.elapsed_time > 0.0 {
            self.vehicles_processed as f32 * 60.0 / self.elapsed_time
        } else {
            0.0
        }
    }

    pub fn log_summary(&self, active_vehicles: usize, queued_vehicles: usize, efficiency: f32) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Elapsed time: {:.2}s", self.elapsed_time);
        info!("Total vehicles spawned: {}", self.vehicles_spawned);
        info!("Vehicles processed: {}", self.vehicles_processed);
        info!("Active vehicles: {}", active_vehicles);
        info!("Queued vehicles: {}", queued_vehicles);
        info!("Rejected spawn records: {}", self.records_rejected);
        info!("Average wait: {:.2}s", self.average_wait());
        info!("Max wait: {:.2}s", self.max_wait_time);
        info!("Forced admissions: {}", self.forced_admissions);
        info!("Emergency admissions: {}", self.emergency_admissions);
        info!("Throughput: {:.1} vehicles/min", self.throughput_per_minute());
        info!("System efficiency: {:.3}", efficiency);
    }
}

/// One periodic sample of the junction
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficMetrics {
    pub timestamp: f32,
    pub lane_lengths: [usize; LANE_COUNT],
    pub average_wait: f32,
    pub priority_mode: bool,
    pub active_vehicles: usize,
    pub vehicles_processed: usize,
}

impl TrafficMetrics {
    /// Blend of low waiting and short queues, in (0, 1]
    pub fn efficiency(&self) -> f32 {
        let wait_score = 1.0 / (1.0 + self.average_wait);
        let queue_score = self
            .lane_lengths
            .iter()
            .map(|len| 1.0 / (1.0 + *len as f32))
            .sum::<f32>()
            / LANE_COUNT as f32;
        (wait_score + queue_score) / 2.0
    }
}

/// Bounded history of [`TrafficMetrics`], sampled at a fixed simulated interval
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    interval: f32,
    capacity: usize,
    last_sample: Option<f32>,
    snapshots: VecDeque<TrafficMetrics>,
}

impl MetricsHistory {
    pub fn new(interval: f32, capacity: usize) -> Self {
        Self {
            interval,
            capacity: capacity.max(1),
            last_sample: None,
            snapshots: VecDeque::new(),
        }
    }

    pub fn is_due(&self, time: f32) -> bool {
        match self.last_sample {
            None => true,
            // Allow for float drift in accumulated tick time
            Some(last) => time - last >= self.interval - 1e-4,
        }
    }

    pub fn record(&mut self, metrics: TrafficMetrics) {
        self.last_sample = Some(metrics.timestamp);
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(metrics);
    }

    pub fn latest(&self) -> Option<&TrafficMetrics> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TrafficMetrics> {
        self.snapshots.iter()
    }

    /// Mean efficiency over the kept snapshots, 0 with no data
    pub fn system_efficiency(&self) -> f32 {
        if self.snapshots.is_empty() {
            return 0.0;
        }
        self.snapshots.iter().map(TrafficMetrics::efficiency).sum::<f32>()
            / self.snapshots.len() as f32
    }
}

/// One row of the per-lane status table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneStatus {
    pub lane: LaneId,
    pub length: usize,
    pub average_wait: f32,
    pub peak_length: usize,
    /// Whether the light currently lets this lane's head go
    pub admits_now: bool,
}
