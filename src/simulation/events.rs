//! Simulation events and where they go

use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

use super::traffic_light::LightState;
use super::types::{LaneId, VehicleId};

/// Why a queue head was allowed to leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionReason {
    Green,
    FreeTurn,
    Emergency,
    /// Waited past the starvation limit
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    VehicleQueued {
        id: VehicleId,
        lane: LaneId,
        emergency: bool,
    },
    VehicleAdmitted {
        id: VehicleId,
        lane: LaneId,
        reason: AdmissionReason,
        wait: f32,
    },
    VehicleExited {
        id: VehicleId,
        wait: f32,
    },
    LightChanged {
        from: LightState,
        to: LightState,
    },
    PriorityMode {
        active: bool,
        queue_len: usize,
    },
    SpawnRejected {
        line: String,
        reason: String,
    },
}

/// Receives every event the scheduler produces
pub trait EventSink: Send {
    fn emit(&mut self, event: SimEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: SimEvent) {
        match event {
            SimEvent::VehicleQueued {
                id,
                lane,
                emergency,
            } => {
                debug!("{} queued on {}{}", id, lane, if emergency { " (emergency)" } else { "" });
            }
            SimEvent::VehicleAdmitted {
                id,
                lane,
                reason: AdmissionReason::Forced,
                wait,
            } => {
                warn!("{} force-admitted from {} after waiting {:.1}s", id, lane, wait);
            }
            SimEvent::VehicleAdmitted {
                id,
                lane,
                reason,
                wait,
            } => {
                debug!("{} admitted from {} ({:?}, waited {:.1}s)", id, lane, reason, wait);
            }
            SimEvent::VehicleExited { id, wait } => {
                debug!("{} exited (waited {:.1}s)", id, wait);
            }
            SimEvent::LightChanged { from, to } => {
                info!("Light {} -> {}", from, to);
            }
            SimEvent::PriorityMode { active, queue_len } => {
                if active {
                    info!("Priority mode ON ({} vehicles waiting)", queue_len);
                } else {
                    info!("Priority mode OFF ({} vehicles waiting)", queue_len);
                }
            }
            SimEvent::SpawnRejected { line, reason } => {
                warn!("Dropped spawn record {:?}: {}", line, reason);
            }
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}

/// Keeps events in memory. Clones share the same buffer, so a test can
/// hand one clone to the scheduler and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: SimEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
