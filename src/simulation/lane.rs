//! Per-lane vehicle queues

use std::collections::VecDeque;

use super::types::{LaneId, VehicleId, HIGH_THRESHOLD, LOW_THRESHOLD};

/// FIFO of vehicle ids waiting on one lane.
///
/// Only ids are stored; the vehicles themselves live in the scheduler's
/// registry. Only the head can leave.
#[derive(Debug, Clone)]
pub struct LaneQueue {
    pub id: LaneId,
    queue: VecDeque<VehicleId>,
    is_priority: bool,
    high_threshold: usize,
    low_threshold: usize,
    /// Sum over ticks of `dt × queued vehicles`
    cumulative_wait: f32,
    enqueued: usize,
    dequeued: usize,
    peak_len: usize,
}

impl LaneQueue {
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            is_priority: false,
            high_threshold: HIGH_THRESHOLD,
            low_threshold: LOW_THRESHOLD,
            cumulative_wait: 0.0,
            enqueued: 0,
            dequeued: 0,
            peak_len: 0,
        }
    }

    /// Mark this lane as the priority lane with the given thresholds
    pub fn with_priority(mut self, high_threshold: usize, low_threshold: usize) -> Self {
        self.is_priority = true;
        self.high_threshold = high_threshold;
        self.low_threshold = low_threshold;
        self
    }

    pub fn enqueue(&mut self, id: VehicleId) {
        self.queue.push_back(id);
        self.enqueued += 1;
        self.peak_len = self.peak_len.max(self.queue.len());
    }

    pub fn dequeue_head(&mut self) -> Option<VehicleId> {
        let id = self.queue.pop_front()?;
        self.dequeued += 1;
        Some(id)
    }

    pub fn peek_head(&self) -> Option<VehicleId> {
        self.queue.front().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_priority_lane(&self) -> bool {
        self.is_priority
    }

    pub fn is_free_turn(&self) -> bool {
        self.id.is_free_turn()
    }

    pub fn exceeds_high(&self) -> bool {
        self.queue.len() > self.high_threshold
    }

    pub fn below_low(&self) -> bool {
        self.queue.len() < self.low_threshold
    }

    /// Queued ids, head first
    pub fn iter(&self) -> impl Iterator<Item = &VehicleId> {
        self.queue.iter()
    }

    pub fn record_wait(&mut self, dt: f32) {
        self.cumulative_wait += dt * self.queue.len() as f32;
    }

    pub fn cumulative_wait(&self) -> f32 {
        self.cumulative_wait
    }

    /// Queue time accumulated on this lane per vehicle that ever joined it
    pub fn average_wait(&self) -> f32 {
        if self.enqueued == 0 {
            0.0
        } else {
            self.cumulative_wait / self.enqueued as f32
        }
    }

    pub fn vehicles_enqueued(&self) -> usize {
        self.enqueued
    }

    pub fn vehicles_dequeued(&self) -> usize {
        self.dequeued
    }

    pub fn peak_len(&self) -> usize {
        self.peak_len
    }
}
