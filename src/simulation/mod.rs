//! Junction simulation core
//!
//! Everything needed to run the four-approach junction headless: lane
//! queues, the traffic light, vehicle motion and the scheduler that drives
//! them tick by tick. Producers on other threads feed it through a bounded
//! spawn channel.

mod config;
mod error;
mod events;
mod generator;
mod geometry;
mod kinematics;
mod lane;
mod scheduler;
mod spawn;
mod stats;
mod traffic_light;
mod types;
mod vehicle;

pub use config::{
    GeneratorConfig, MotionConfig, SchedulerConfig, SignalConfig, SimConfig, Validate,
};
pub use error::SimError;
pub use events::{AdmissionReason, EventSink, LogSink, NullSink, RecordingSink, SimEvent};
pub use generator::{spawn_file_producer, spawn_random_producer, ProducerHandle, RandomSpawner};
pub use geometry::{
    admission_point, box_exit, inbound_direction, is_inside_box, is_past_exit_boundary,
    lane_offset, outbound_direction, plan_route, smoothstep, stop_line,
    QuadraticBezier, Route, ADMISSION_OFFSET, BOX_HALF_SIZE, CENTER, EXIT_MARGIN, LANE_WIDTH,
    WORLD_SIZE,
};
pub use kinematics::{SeparationViolation, VehicleKinematics, MOVING_SPEED_EPSILON};
pub use lane::LaneQueue;
pub use scheduler::{vehicles_to_process, IntersectionScheduler, TickReport};
pub use spawn::{channel, parse_spawn_line, SpawnFeed, SpawnMessage, SpawnProducer, SpawnRecord};
pub use stats::{LaneStatus, MetricsHistory, SimulationStats, TrafficMetrics};
pub use traffic_light::{
    green_duration, LaneSnapshot, LightState, LightUpdate, TrafficLightController,
};
pub use types::{
    Approach, Direction, ExitLane, LaneId, LaneRole, Position, SimId, VehicleId, VehicleStatus,
    ALL_RED_DURATION, HIGH_THRESHOLD, INTERSECTION_MARGIN, LANE_COUNT, LOW_THRESHOLD,
    MAX_GREEN_DURATION, MAX_WAIT_TIME, MIN_DISTANCE, MIN_GREEN_DURATION, MOVING_SEPARATION_FACTOR,
    PER_VEHICLE_TIME,
};
pub use vehicle::{Leg, MotionStep, SimVehicle};
