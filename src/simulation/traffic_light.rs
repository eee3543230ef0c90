//! Traffic light state machine for the junction
//!
//! One approach is green at a time, separated by all-red clearance phases.
//! Green time scales with queue pressure, and a priority lane that backs up
//! past the high threshold takes over the rotation until it drains.

use std::time::Duration;

use super::config::SignalConfig;
use super::lane::LaneQueue;
use super::types::{Approach, LaneId, LANE_COUNT};

/// What the light is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    AllRed,
    Green(Approach),
}

impl LightState {
    pub fn is_green_for(&self, approach: Approach) -> bool {
        matches!(self, LightState::Green(a) if *a == approach)
    }
}

impl std::fmt::Display for LightState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightState::AllRed => write!(f, "ALL_RED"),
            LightState::Green(a) => write!(f, "{}_GREEN", a),
        }
    }
}

/// Queue lengths of every lane at the moment the light is updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneSnapshot {
    pub lengths: [usize; LANE_COUNT],
}

impl LaneSnapshot {
    pub fn from_lanes(lanes: &[LaneQueue]) -> Self {
        let mut lengths = [0; LANE_COUNT];
        for lane in lanes {
            lengths[lane.id.index()] = lane.len();
        }
        Self { lengths }
    }

    pub fn with_len(mut self, lane: LaneId, len: usize) -> Self {
        self.lengths[lane.index()] = len;
        self
    }

    pub fn len(&self, lane: LaneId) -> usize {
        self.lengths[lane.index()]
    }
}

/// What changed during one controller update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightUpdate {
    /// `(from, to)` when the displayed state changed
    pub transition: Option<(LightState, LightState)>,
    /// New priority flag when it flipped
    pub priority_changed: Option<bool>,
}

/// Green time for a given average queue length
pub fn green_duration(config: &SignalConfig, average_len: f32) -> Duration {
    let floor = config.min_green.min(config.max_green).max(0.0);
    let ceiling = config.max_green.max(floor);
    let secs = (average_len * config.per_vehicle_time).clamp(floor, ceiling);
    seconds(secs)
}

/// Non-finite or negative durations collapse to zero
fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone)]
pub struct TrafficLightController {
    config: SignalConfig,
    current: LightState,
    next: LightState,
    /// Seconds spent in the current state
    timer: f32,
    priority_mode: bool,
    last_green: Option<Approach>,
}

impl TrafficLightController {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            current: LightState::AllRed,
            next: LightState::Green(Approach::North),
            timer: 0.0,
            priority_mode: false,
            last_green: None,
        }
    }

    pub fn state(&self) -> LightState {
        self.current
    }

    pub fn next_state(&self) -> LightState {
        self.next
    }

    pub fn time_in_state(&self) -> f32 {
        self.timer
    }

    pub fn is_priority_mode(&self) -> bool {
        self.priority_mode
    }

    pub fn priority_lane(&self) -> Option<LaneId> {
        self.config.priority_lane
    }

    pub fn green_approach(&self) -> Option<Approach> {
        match self.current {
            LightState::Green(a) => Some(a),
            LightState::AllRed => None,
        }
    }

    /// Whether the light lets the head of `lane` go. Free-turn lanes always may.
    pub fn permits(&self, lane: LaneId) -> bool {
        lane.is_free_turn() || self.current.is_green_for(lane.approach)
    }

    /// Advance the timer by `dt` and apply at most one state change
    pub fn update(&mut self, dt: f32, snapshot: &LaneSnapshot) -> LightUpdate {
        let mut update = LightUpdate::default();
        self.timer += dt;

        if let Some(lane) = self.config.priority_lane {
            let len = snapshot.len(lane);
            let was = self.priority_mode;
            if !was && len > self.config.high_threshold {
                self.priority_mode = true;
            } else if was && len < self.config.low_threshold {
                self.priority_mode = false;
            }

            if self.priority_mode != was {
                update.priority_changed = Some(self.priority_mode);
            }

            let priority_green = LightState::Green(lane.approach);
            if self.priority_mode && !was && self.current != priority_green {
                if self.current != LightState::AllRed {
                    update.transition = Some((self.current, LightState::AllRed));
                }
                self.current = LightState::AllRed;
                self.timer = 0.0;
                self.next = priority_green;
                return update;
            }
            if !self.priority_mode && was && self.current == LightState::AllRed {
                self.next = self.following(LightState::AllRed);
            }
        }

        if self.timer >= self.current_duration(snapshot).as_secs_f32() {
            let from = self.current;
            self.current = self.next;
            self.timer = 0.0;
            if let LightState::Green(a) = self.current {
                self.last_green = Some(a);
            }
            self.next = self.following(self.current);
            update.transition = Some((from, self.current));
        }

        update
    }

    /// How long the current state lasts given the queues in `snapshot`
    pub fn current_duration(&self, snapshot: &LaneSnapshot) -> Duration {
        match self.current {
            LightState::AllRed => seconds(self.config.all_red_duration),
            LightState::Green(approach) => match self.config.priority_lane {
                Some(lane) if self.priority_mode && lane.approach == approach => {
                    green_duration(&self.config, snapshot.len(lane) as f32)
                }
                _ => green_duration(&self.config, self.average_normal_len(approach, snapshot)),
            },
        }
    }

    fn average_normal_len(&self, approach: Approach, snapshot: &LaneSnapshot) -> f32 {
        let lens: Vec<usize> = LaneId::all()
            .into_iter()
            .filter(|lane| {
                lane.approach == approach
                    && lane.is_light_controlled()
                    && Some(*lane) != self.config.priority_lane
            })
            .map(|lane| snapshot.len(lane))
            .collect();
        if lens.is_empty() {
            0.0
        } else {
            lens.iter().sum::<usize>() as f32 / lens.len() as f32
        }
    }

    fn following(&self, state: LightState) -> LightState {
        match state {
            LightState::Green(_) => LightState::AllRed,
            LightState::AllRed => match self.config.priority_lane {
                Some(lane) if self.priority_mode => LightState::Green(lane.approach),
                _ => LightState::Green(
                    self.last_green
                        .map(Approach::successor)
                        .unwrap_or(Approach::North),
                ),
            },
        }
    }
}
