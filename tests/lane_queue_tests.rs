//! Lane queue behaviour tests

use junction_sim::simulation::{Approach, LaneId, LaneQueue, LaneRole, SimId, VehicleId};

fn vid(n: usize) -> VehicleId {
    VehicleId(SimId(n))
}

fn north_controlled() -> LaneId {
    LaneId::new(Approach::North, LaneRole::Controlled)
}

#[test]
fn test_dequeue_follows_arrival_order() {
    let mut lane = LaneQueue::new(north_controlled());
    for n in 0..5 {
        lane.enqueue(vid(n));
    }

    assert_eq!(lane.peek_head(), Some(vid(0)));
    let order: Vec<VehicleId> = std::iter::from_fn(|| lane.dequeue_head()).collect();
    assert_eq!(order, (0..5).map(vid).collect::<Vec<_>>());
    assert!(lane.is_empty());
}

#[test]
fn test_empty_dequeue_returns_none() {
    let mut lane = LaneQueue::new(north_controlled());
    assert_eq!(lane.dequeue_head(), None);
    assert_eq!(lane.peek_head(), None);
    assert_eq!(lane.vehicles_dequeued(), 0);
}

#[test]
fn test_priority_thresholds() {
    let mut lane = LaneQueue::new(north_controlled()).with_priority(10, 5);
    assert!(lane.is_priority_lane());

    for n in 0..10 {
        lane.enqueue(vid(n));
    }
    assert!(!lane.exceeds_high(), "10 vehicles is not above the high threshold");

    lane.enqueue(vid(10));
    assert!(lane.exceeds_high());

    while lane.len() > 5 {
        lane.dequeue_head();
    }
    assert!(!lane.below_low(), "5 vehicles is not below the low threshold");
    lane.dequeue_head();
    assert!(lane.below_low());
}

#[test]
fn test_free_turn_classification() {
    let free = LaneQueue::new(LaneId::new(Approach::West, LaneRole::FreeTurn));
    let incoming = LaneQueue::new(LaneId::new(Approach::West, LaneRole::Incoming));
    assert!(free.is_free_turn());
    assert!(!incoming.is_free_turn());
    assert!(!incoming.is_priority_lane());
}

#[test]
fn test_wait_accumulates_per_queued_vehicle() {
    let mut lane = LaneQueue::new(north_controlled());
    lane.enqueue(vid(0));
    lane.enqueue(vid(1));

    lane.record_wait(0.5);
    lane.record_wait(0.5);
    assert!((lane.cumulative_wait() - 2.0).abs() < 1e-6);
    assert!((lane.average_wait() - 1.0).abs() < 1e-6);

    lane.dequeue_head();
    lane.record_wait(0.5);
    assert!((lane.cumulative_wait() - 2.5).abs() < 1e-6);
}

#[test]
fn test_peak_length_tracked() {
    let mut lane = LaneQueue::new(north_controlled());
    for n in 0..4 {
        lane.enqueue(vid(n));
    }
    lane.dequeue_head();
    lane.dequeue_head();
    lane.enqueue(vid(4));

    assert_eq!(lane.len(), 3);
    assert_eq!(lane.peak_len(), 4);
    assert_eq!(lane.vehicles_enqueued(), 5);
    assert_eq!(lane.vehicles_dequeued(), 2);
}

#[test]
fn test_lane_index_round_trip_covers_all_lanes() {
    let all = LaneId::all();
    for (index, lane) in all.iter().enumerate() {
        assert_eq!(lane.index(), index);
        assert_eq!(LaneId::from_index(index), *lane);
    }
    assert_eq!(all.iter().filter(|lane| lane.is_free_turn()).count(), 4);
}
