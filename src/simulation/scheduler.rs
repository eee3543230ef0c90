//! The intersection scheduler, which ties everything together
//!
//! Owns the lanes, the vehicle registry, the light and the kinematics, and
//! advances them in lock-step one tick at a time. This is the entry point
//! for running the junction without any front end.

use anyhow::{Context, Result};
use log::error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

use super::config::{SimConfig, Validate};
use super::error::SimError;
use super::events::{AdmissionReason, EventSink, LogSink, SimEvent};
use super::geometry::admission_point;
use super::kinematics::VehicleKinematics;
use super::lane::LaneQueue;
use super::spawn::{parse_spawn_line, SpawnFeed, SpawnMessage, SpawnRecord};
use super::stats::{LaneStatus, MetricsHistory, SimulationStats, TrafficMetrics};
use super::traffic_light::{LaneSnapshot, LightState, LightUpdate, TrafficLightController};
use super::types::{
    Direction, LaneId, LaneRole, SimId, VehicleId, VehicleStatus, LANE_COUNT,
};
use super::vehicle::SimVehicle;

/// Per-phase service cap: the mean queue length of the normal lanes,
/// rounded up. Zero lanes means nothing to serve.
pub fn vehicles_to_process(lengths: &[usize]) -> usize {
    if lengths.is_empty() {
        return 0;
    }
    lengths.iter().sum::<usize>().div_ceil(lengths.len())
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub admitted: Vec<VehicleId>,
    pub exited: Vec<VehicleId>,
    pub rejected_records: usize,
    pub light: LightUpdate,
}

pub struct IntersectionScheduler {
    config: SimConfig,

    /// Indexed by [`LaneId::index`]
    lanes: Vec<LaneQueue>,

    /// Every vehicle not yet retired, queued or active
    vehicles: HashMap<VehicleId, SimVehicle>,

    light: TrafficLightController,

    kinematics: VehicleKinematics,

    feed: Option<SpawnFeed>,

    /// Messages submitted directly, ingested on the next tick
    pending: VecDeque<SpawnMessage>,

    stats: SimulationStats,

    metrics: MetricsHistory,

    sink: Box<dyn EventSink>,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    next_id: usize,

    /// Simulation time
    pub time: f32,

    ticks: u64,

    /// Light-controlled admissions since the current green began
    served_this_green: usize,
}

impl Default for IntersectionScheduler {
    fn default() -> Self {
        Self::new_internal(SimConfig::default(), None)
    }
}

impl IntersectionScheduler {
    fn new_internal(config: SimConfig, rng: Option<StdRng>) -> Self {
        let lanes = LaneId::all()
            .into_iter()
            .map(|id| {
                let lane = LaneQueue::new(id);
                if config.signal.priority_lane == Some(id) {
                    lane.with_priority(config.signal.high_threshold, config.signal.low_threshold)
                } else {
                    lane
                }
            })
            .collect();

        Self {
            lanes,
            vehicles: HashMap::new(),
            light: TrafficLightController::new(config.signal.clone()),
            kinematics: VehicleKinematics::new(config.motion.clone()),
            feed: None,
            pending: VecDeque::new(),
            stats: SimulationStats::default(),
            metrics: MetricsHistory::new(
                config.scheduler.metrics_interval,
                config.scheduler.metrics_history,
            ),
            sink: Box::new(LogSink),
            rng,
            next_id: 0,
            time: 0.0,
            ticks: 0,
            served_this_green: 0,
            config,
        }
    }

    /// Create a scheduler. The configuration is validated first.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate().context("Rejected scheduler configuration")?;
        Ok(Self::new_internal(config, None))
    }

    /// Create a scheduler with a seeded RNG for reproducible simulations
    pub fn new_with_seed(config: SimConfig, seed: u64) -> Result<Self> {
        config.validate().context("Rejected scheduler configuration")?;
        Ok(Self::new_internal(config, Some(StdRng::seed_from_u64(seed))))
    }

    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn attach_feed(&mut self, feed: SpawnFeed) {
        self.feed = Some(feed);
    }

    /// Take the feed back, e.g. to drop it so producers unblock
    pub fn detach_feed(&mut self) -> Option<SpawnFeed> {
        self.feed.take()
    }

    /// Queue a record or raw line for the next tick
    pub fn submit(&mut self, message: impl Into<SpawnMessage>) {
        self.pending.push_back(message.into());
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range(&mut self, range: std::ops::Range<f32>) -> f32 {
        if range.is_empty() {
            return range.start;
        }
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(SimId(self.next_id));
        self.next_id += 1;
        id
    }

    fn lane_at(&self, lane: LaneId) -> &LaneQueue {
        &self.lanes[lane.index()]
    }

    /// Lane a new vehicle joins. Straight traffic takes the shorter of the
    /// two light-controlled lanes, preferring the controlled lane on a tie.
    pub fn choose_lane(&self, record: &SpawnRecord) -> LaneId {
        let role = match record.direction {
            Direction::Left => LaneRole::FreeTurn,
            Direction::Right => LaneRole::Incoming,
            Direction::Straight => {
                let incoming = self.lane_at(LaneId::new(record.approach, LaneRole::Incoming));
                let controlled = self.lane_at(LaneId::new(record.approach, LaneRole::Controlled));
                if incoming.len() < controlled.len() {
                    LaneRole::Incoming
                } else {
                    LaneRole::Controlled
                }
            }
        };
        LaneId::new(record.approach, role)
    }

    /// Put a new vehicle at the back of its lane right away
    pub fn spawn_vehicle(&mut self, record: SpawnRecord) -> VehicleId {
        let lane = self.choose_lane(&record);
        let id = self.next_vehicle_id();
        let vehicle = SimVehicle::queued(id, lane, record.direction, record.emergency, self.time);
        self.vehicles.insert(id, vehicle);
        self.lanes[lane.index()].enqueue(id);
        self.stats.vehicles_spawned += 1;
        self.sink.emit(SimEvent::VehicleQueued {
            id,
            lane,
            emergency: record.emergency,
        });
        id
    }

    fn ingest_spawns(&mut self) -> usize {
        let mut messages: Vec<SpawnMessage> = self.pending.drain(..).collect();
        if let Some(feed) = &mut self.feed {
            messages.extend(feed.drain());
        }

        let mut rejected = 0;
        for message in messages {
            let record = match message {
                SpawnMessage::Record(record) => record,
                SpawnMessage::Line(line) => match parse_spawn_line(&line) {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(err) => {
                        let reason = match err {
                            SimError::MalformedSpawnRecord { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        rejected += 1;
                        self.stats.records_rejected += 1;
                        self.sink.emit(SimEvent::SpawnRejected { line, reason });
                        continue;
                    }
                },
            };
            self.spawn_vehicle(record);
        }
        rejected
    }

    fn advance_waits(&mut self, dt: f32) -> Result<(), SimError> {
        for lane in &mut self.lanes {
            lane.record_wait(dt);
            for id in lane.iter() {
                self.vehicles
                    .get_mut(id)
                    .ok_or(SimError::UnknownVehicle {
                        id: *id,
                        context: "lane queue",
                    })?
                    .accumulate_wait(dt);
            }
        }
        Ok(())
    }

    fn apply_light_update(&mut self, update: &LightUpdate, snapshot: &LaneSnapshot) {
        if let Some(active) = update.priority_changed {
            let queue_len = self
                .light
                .priority_lane()
                .map(|lane| snapshot.len(lane))
                .unwrap_or(0);
            self.sink.emit(SimEvent::PriorityMode { active, queue_len });
        }
        if let Some((from, to)) = update.transition {
            if let LightState::Green(_) = to {
                self.served_this_green = 0;
            }
            self.sink.emit(SimEvent::LightChanged { from, to });
        }
    }

    /// Lanes whose lengths set the service cap: light-controlled, not priority
    fn normal_lanes(&self) -> impl Iterator<Item = &LaneQueue> {
        self.lanes
            .iter()
            .filter(|lane| lane.id.is_light_controlled() && !lane.is_priority_lane())
    }

    /// Current per-phase service cap
    pub fn service_cap(&self) -> usize {
        let lengths: Vec<usize> = self.normal_lanes().map(LaneQueue::len).collect();
        vehicles_to_process(&lengths)
    }

    fn admission_reason(&self, lane: LaneId, vehicle: &SimVehicle, cap: usize) -> Option<AdmissionReason> {
        if lane.is_free_turn() {
            return Some(AdmissionReason::FreeTurn);
        }
        if vehicle.emergency {
            return Some(AdmissionReason::Emergency);
        }
        let is_priority = self.light.priority_lane() == Some(lane);
        if self.light.permits(lane) && (is_priority || self.served_this_green < cap) {
            return Some(AdmissionReason::Green);
        }
        if vehicle.wait_time > self.config.scheduler.max_wait_time {
            return Some(AdmissionReason::Forced);
        }
        None
    }

    fn admit_heads(&mut self) -> Result<Vec<VehicleId>, SimError> {
        let cap = self.service_cap();
        let mut admitted = Vec::new();

        for index in 0..LANE_COUNT {
            let lane = LaneId::from_index(index);
            let Some(head) = self.lanes[index].peek_head() else {
                continue;
            };
            let vehicle = self.vehicles.get(&head).ok_or(SimError::UnknownVehicle {
                id: head,
                context: "queue head",
            })?;
            let Some(reason) = self.admission_reason(lane, vehicle, cap) else {
                continue;
            };
            if !self.kinematics.is_clear(&admission_point(lane), &self.vehicles)? {
                continue;
            }

            self.lanes[index].dequeue_head();
            let jitter = self.config.motion.speed_jitter;
            let cruise = self.config.motion.cruise_speed * (1.0 + self.random_range(-jitter..jitter));
            let vehicle = self.vehicles.get_mut(&head).ok_or(SimError::UnknownVehicle {
                id: head,
                context: "admission",
            })?;
            vehicle.admit(cruise, &self.config.motion);
            let wait = vehicle.wait_time;
            self.kinematics.activate(head);

            self.stats.record_admission(lane);
            match reason {
                AdmissionReason::Green => self.served_this_green += 1,
                AdmissionReason::Forced => self.stats.forced_admissions += 1,
                AdmissionReason::Emergency => self.stats.emergency_admissions += 1,
                AdmissionReason::FreeTurn => {}
            }
            self.sink.emit(SimEvent::VehicleAdmitted {
                id: head,
                lane,
                reason,
                wait,
            });
            admitted.push(head);
        }
        Ok(admitted)
    }

    fn retire(&mut self, exited: &[VehicleId]) -> Result<(), SimError> {
        for id in exited {
            let vehicle = self.vehicles.remove(id).ok_or(SimError::UnknownVehicle {
                id: *id,
                context: "retire",
            })?;
            self.stats.record_exit(vehicle.wait_time);
            self.sink.emit(SimEvent::VehicleExited {
                id: *id,
                wait: vehicle.wait_time,
            });
        }
        Ok(())
    }

    fn check_separation(&self) -> Result<(), SimError> {
        let violations = self.kinematics.verify_separation(&self.vehicles)?;
        for v in &violations {
            error!(
                "Separation violated at tick {}: {} and {} are {:.1}px apart, need {:.1}px",
                self.ticks, v.first, v.second, v.distance, v.required
            );
        }
        debug_assert!(violations.is_empty(), "separation violated: {:?}", violations);
        Ok(())
    }

    fn sample_metrics(&mut self) {
        if !self.metrics.is_due(self.time) {
            return;
        }
        let snapshot = LaneSnapshot::from_lanes(&self.lanes);
        self.metrics.record(TrafficMetrics {
            timestamp: self.time,
            lane_lengths: snapshot.lengths,
            average_wait: self.stats.average_wait(),
            priority_mode: self.light.is_priority_mode(),
            active_vehicles: self.kinematics.len(),
            vehicles_processed: self.stats.vehicles_processed,
        });
    }

    /// Advance the simulation by one time step
    pub fn tick(&mut self, dt: f32) -> Result<TickReport, SimError> {
        let result = self.run_tick(dt);
        if let Err(err) = &result {
            error!("Tick {} aborted: {}", self.ticks, err);
        }
        result
    }

    fn run_tick(&mut self, dt: f32) -> Result<TickReport, SimError> {
        self.ticks += 1;
        self.time += dt;
        self.stats.elapsed_time = self.time;

        let mut report = TickReport {
            rejected_records: self.ingest_spawns(),
            ..TickReport::default()
        };

        self.advance_waits(dt)?;
        let snapshot = LaneSnapshot::from_lanes(&self.lanes);
        report.light = self.light.update(dt, &snapshot);
        self.apply_light_update(&report.light, &snapshot);

        report.admitted = self.admit_heads()?;

        let exited = self.kinematics.integrate(dt, &mut self.vehicles)?;
        self.retire(&exited)?;
        report.exited = exited;

        self.check_separation()?;
        self.sample_metrics();
        Ok(report)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn lane(&self, lane: LaneId) -> &LaneQueue {
        self.lane_at(lane)
    }

    pub fn lane_len(&self, lane: LaneId) -> usize {
        self.lane_at(lane).len()
    }

    pub fn lane_average_wait(&self, lane: LaneId) -> f32 {
        self.lane_at(lane).average_wait()
    }

    pub fn light_state(&self) -> LightState {
        self.light.state()
    }

    pub fn time_in_state(&self) -> f32 {
        self.light.time_in_state()
    }

    pub fn is_priority_mode(&self) -> bool {
        self.light.is_priority_mode()
    }

    pub fn light(&self) -> &TrafficLightController {
        &self.light
    }

    pub fn vehicles_processed(&self) -> usize {
        self.stats.vehicles_processed
    }

    /// Running mean wait of processed vehicles
    pub fn average_wait(&self) -> f32 {
        self.stats.average_wait()
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn metrics(&self) -> &MetricsHistory {
        &self.metrics
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&SimVehicle> {
        self.vehicles.get(&id)
    }

    /// Admitted vehicles in admission order
    pub fn active_vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.kinematics
            .active_ids()
            .iter()
            .filter_map(|id| self.vehicles.get(id))
    }

    pub fn active_count(&self) -> usize {
        self.kinematics.len()
    }

    pub fn queued_count(&self) -> usize {
        self.lanes.iter().map(LaneQueue::len).sum()
    }

    /// Vehicles still owned by the scheduler, queued or active
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn lane_statuses(&self) -> Vec<LaneStatus> {
        self.lanes
            .iter()
            .map(|lane| LaneStatus {
                lane: lane.id,
                length: lane.len(),
                average_wait: lane.average_wait(),
                peak_length: lane.peak_len(),
                admits_now: self.light.permits(lane.id),
            })
            .collect()
    }

    /// Print a summary of the current state
    pub fn print_summary(&self) {
        println!(
            "Time: {:.1}s | Light: {} ({:.1}s){} | Queued: {} | Active: {} | Processed: {} | Avg wait: {:.2}s",
            self.time,
            self.light.state(),
            self.light.time_in_state(),
            if self.light.is_priority_mode() { " PRIORITY" } else { "" },
            self.queued_count(),
            self.active_count(),
            self.stats.vehicles_processed,
            self.stats.average_wait(),
        );
        for status in self.lane_statuses() {
            if status.length == 0 && status.peak_length == 0 {
                continue;
            }
            println!(
                "  {:<14} len {:>3} | peak {:>3} | avg wait {:>6.2}s | {}",
                status.lane.to_string(),
                status.length,
                status.peak_length,
                status.average_wait,
                if status.admits_now { "go" } else { "stop" }
            );
        }
        let turning = self
            .active_vehicles()
            .filter(|v| v.status == VehicleStatus::Turning)
            .count();
        if turning > 0 {
            println!("  {} vehicle(s) turning", turning);
        }
    }

    /// Log the end-of-run summary
    pub fn log_final_summary(&self) {
        self.stats.log_summary(
            self.active_count(),
            self.queued_count(),
            self.metrics.system_efficiency(),
        );
    }
}
