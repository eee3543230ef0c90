//! Scheduler behaviour tests: lane choice, admission rules and whole runs

use junction_sim::simulation::{
    channel, is_inside_box, vehicles_to_process, AdmissionReason, Approach, Direction,
    IntersectionScheduler, LaneId, LaneRole, LightState, NullSink, RandomSpawner, RecordingSink,
    SimConfig, SimError, SimEvent, SpawnMessage, SpawnRecord, VehicleStatus, MIN_DISTANCE,
    INTERSECTION_MARGIN,
};

fn quiet(config: SimConfig) -> IntersectionScheduler {
    IntersectionScheduler::new_with_seed(config, 1)
        .unwrap()
        .with_event_sink(NullSink)
}

fn recorded(config: SimConfig) -> (IntersectionScheduler, RecordingSink) {
    let sink = RecordingSink::new();
    let scheduler = IntersectionScheduler::new_with_seed(config, 1)
        .unwrap()
        .with_event_sink(sink.clone());
    (scheduler, sink)
}

fn assert_separated(scheduler: &IntersectionScheduler) {
    let active: Vec<_> = scheduler.active_vehicles().collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            let floor = if is_inside_box(&a.position) || is_inside_box(&b.position) {
                INTERSECTION_MARGIN
            } else {
                MIN_DISTANCE
            };
            let distance = a.position.distance(&b.position);
            assert!(
                distance + 1e-3 >= floor,
                "{} and {} are {:.2}px apart at t={:.1}",
                a.id,
                b.id,
                distance,
                scheduler.time
            );
        }
    }
}

#[test]
fn test_service_rate_formula() {
    assert_eq!(vehicles_to_process(&[3, 5, 2, 4]), 4);
    assert_eq!(vehicles_to_process(&[1, 0, 0, 0, 0, 0, 0]), 1);
    assert_eq!(vehicles_to_process(&[0, 0]), 0);
    assert_eq!(vehicles_to_process(&[]), 0);
}

#[test]
fn test_lane_choice() {
    let mut scheduler = quiet(SimConfig::default());
    let east = |role| LaneId::new(Approach::East, role);

    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Left));
    assert_eq!(scheduler.lane_len(east(LaneRole::FreeTurn)), 1);

    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Right));
    assert_eq!(scheduler.lane_len(east(LaneRole::Incoming)), 1);

    // Incoming 1, controlled 0: straight goes to controlled
    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));
    assert_eq!(scheduler.lane_len(east(LaneRole::Controlled)), 1);

    // Tie: controlled wins
    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));
    assert_eq!(scheduler.lane_len(east(LaneRole::Controlled)), 2);

    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));
    assert_eq!(scheduler.lane_len(east(LaneRole::Incoming)), 2);
}

#[test]
fn test_service_cap_from_normal_lanes() {
    let mut scheduler = quiet(SimConfig::default());
    for _ in 0..3 {
        scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));
    }
    for _ in 0..4 {
        scheduler.spawn_vehicle(SpawnRecord::new(Approach::South, Direction::Right));
    }
    // Free-turn and priority lanes do not count
    for _ in 0..9 {
        scheduler.spawn_vehicle(SpawnRecord::new(Approach::West, Direction::Left));
    }

    // 7 vehicles over the 7 normal lanes
    assert_eq!(scheduler.service_cap(), 1);
}

#[test]
fn test_free_turn_moves_on_next_tick() {
    let mut scheduler = quiet(SimConfig::default());
    let id = scheduler.spawn_vehicle(SpawnRecord::new(Approach::North, Direction::Left));
    let queued_at = scheduler.vehicle(id).unwrap().position;
    assert_eq!(scheduler.light_state(), LightState::AllRed);

    let report = scheduler.tick(0.1).unwrap();
    assert_eq!(report.admitted, vec![id]);
    let vehicle = scheduler.vehicle(id).unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Moving);
    assert!(vehicle.position.y > queued_at.y);
    assert_eq!(scheduler.lane_len(LaneId::new(Approach::North, LaneRole::FreeTurn)), 0);
}

#[test]
fn test_red_light_holds_controlled_lane() {
    let mut scheduler = quiet(SimConfig::default());
    let id = scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));
    for _ in 0..10 {
        scheduler.tick(0.1).unwrap();
    }
    assert_eq!(scheduler.vehicle(id).unwrap().status, VehicleStatus::Queued);
    assert!(scheduler.vehicle(id).unwrap().wait_time > 0.9);
}

#[test]
fn test_starved_vehicle_is_forced_through() {
    let mut config = SimConfig::default();
    config.scheduler.max_wait_time = 1.0;
    let (mut scheduler, sink) = recorded(config);
    let id = scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));

    let bound = (1.0f32 / 0.1).ceil() as usize + 1;
    let mut admitted_at = None;
    for tick in 1..=bound {
        let report = scheduler.tick(0.1).unwrap();
        assert!(!scheduler.light_state().is_green_for(Approach::East));
        if report.admitted.contains(&id) {
            admitted_at = Some(tick);
            break;
        }
    }

    assert!(admitted_at.is_some(), "not admitted within {} ticks", bound);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        SimEvent::VehicleAdmitted { id: admitted, reason: AdmissionReason::Forced, .. } if *admitted == id
    )));
    assert_eq!(scheduler.stats().forced_admissions, 1);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let mut config = SimConfig::default();
    config.signal.min_green = 20.0;
    assert!(IntersectionScheduler::new(config.clone()).is_err());
    assert!(IntersectionScheduler::new_with_seed(config, 3).is_err());

    let mut config = SimConfig::default();
    config.signal.all_red_duration = -1.0;
    let err = IntersectionScheduler::new(config).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<SimError>(),
        Some(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_default_scheduler_runs() {
    let mut scheduler = IntersectionScheduler::default().with_event_sink(NullSink);
    scheduler.spawn_vehicle(SpawnRecord::new(Approach::North, Direction::Left));
    for _ in 0..10 {
        scheduler.tick(0.1).unwrap();
    }
    assert_eq!(scheduler.queued_count(), 0);
}

#[test]
fn test_emergency_vehicle_ignores_red() {
    let (mut scheduler, sink) = recorded(SimConfig::default());
    let id = scheduler.spawn_vehicle(SpawnRecord::emergency(Approach::West, Direction::Straight));

    let report = scheduler.tick(0.1).unwrap();
    assert_eq!(scheduler.light_state(), LightState::AllRed);
    assert_eq!(report.admitted, vec![id]);
    assert_eq!(scheduler.stats().emergency_admissions, 1);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        SimEvent::VehicleAdmitted { reason: AdmissionReason::Emergency, .. }
    )));
}

#[test]
fn test_green_admits_head_of_green_approach() {
    let mut scheduler = quiet(SimConfig::default());
    let north = scheduler.spawn_vehicle(SpawnRecord::new(Approach::North, Direction::Right));
    let east = scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Right));

    let mut ticks = 0;
    while scheduler.light_state() != LightState::Green(Approach::North) {
        scheduler.tick(0.25).unwrap();
        ticks += 1;
        assert!(ticks < 20, "north never went green");
    }
    assert_ne!(scheduler.vehicle(north).unwrap().status, VehicleStatus::Queued);
    assert_eq!(scheduler.vehicle(east).unwrap().status, VehicleStatus::Queued);
}

#[test]
fn test_priority_lane_takes_over() {
    let mut config = SimConfig::default();
    config.signal.priority_lane = Some(LaneId::new(Approach::South, LaneRole::Incoming));
    let (mut scheduler, sink) = recorded(config);
    for _ in 0..11 {
        scheduler.spawn_vehicle(SpawnRecord::new(Approach::South, Direction::Right));
    }

    scheduler.tick(0.25).unwrap();
    assert!(scheduler.is_priority_mode());
    assert!(sink
        .events()
        .contains(&SimEvent::PriorityMode { active: true, queue_len: 11 }));
    assert_eq!(
        scheduler.light().next_state(),
        LightState::Green(Approach::South)
    );

    for _ in 0..12 {
        scheduler.tick(0.25).unwrap();
    }
    assert_eq!(scheduler.light_state(), LightState::Green(Approach::South));
    assert!(scheduler.lane_len(LaneId::new(Approach::South, LaneRole::Incoming)) < 11);
}

#[test]
fn test_malformed_lines_are_dropped() {
    let (mut scheduler, sink) = recorded(SimConfig::default());
    scheduler.submit(SpawnMessage::Line("N,L;".to_string()));
    scheduler.submit(SpawnMessage::Line("sideways".to_string()));
    scheduler.submit(SpawnMessage::Line("# comment".to_string()));

    let report = scheduler.tick(0.1).unwrap();
    assert_eq!(report.rejected_records, 1);
    assert_eq!(scheduler.stats().records_rejected, 1);
    assert_eq!(scheduler.stats().vehicles_spawned, 1);
    assert!(sink
        .events()
        .iter()
        .any(|event| matches!(event, SimEvent::SpawnRejected { line, .. } if line == "sideways")));
}

#[test]
fn test_feed_is_drained_each_tick() {
    let mut scheduler = quiet(SimConfig::default());
    let (producer, feed) = channel(8);
    scheduler.attach_feed(feed);

    producer
        .send(SpawnRecord::new(Approach::South, Direction::Straight))
        .unwrap();
    producer.send(SpawnMessage::Line("W,R;".to_string())).unwrap();
    scheduler.tick(0.1).unwrap();

    assert_eq!(scheduler.stats().vehicles_spawned, 2);
    assert_eq!(scheduler.lane_len(LaneId::new(Approach::West, LaneRole::Incoming)), 1);
    assert!(scheduler.detach_feed().is_some());
}

#[test]
fn test_vehicle_exits_and_is_counted() {
    let mut scheduler = quiet(SimConfig::default());
    let id = scheduler.spawn_vehicle(SpawnRecord::new(Approach::West, Direction::Left));

    let mut exited = false;
    for _ in 0..200 {
        let report = scheduler.tick(0.1).unwrap();
        if report.exited.contains(&id) {
            exited = true;
            break;
        }
    }

    assert!(exited);
    assert!(scheduler.vehicle(id).is_none());
    assert_eq!(scheduler.vehicles_processed(), 1);
    assert!(scheduler.average_wait() > 0.0);
    assert_eq!(scheduler.active_count(), 0);
}

#[test]
fn test_busy_run_keeps_vehicles_apart() {
    let mut scheduler = quiet(SimConfig::default());
    let mut spawner = RandomSpawner::new_with_seed(11, 0.02);

    for tick in 0..1500 {
        if tick % 5 == 0 {
            scheduler.submit(spawner.next_record());
        }
        scheduler.tick(0.1).unwrap();
        assert_separated(&scheduler);

        for status in scheduler.lane_statuses() {
            for id in scheduler.lane(status.lane).iter() {
                assert_eq!(scheduler.vehicle(*id).unwrap().status, VehicleStatus::Queued);
            }
        }
        for vehicle in scheduler.active_vehicles() {
            assert!(matches!(vehicle.status, VehicleStatus::Moving | VehicleStatus::Turning));
        }
        assert_eq!(
            scheduler.queued_count() + scheduler.active_count(),
            scheduler.vehicle_count()
        );
    }

    assert_eq!(scheduler.stats().vehicles_spawned, 300);
    assert!(scheduler.vehicles_processed() > 30);
}

#[test]
fn test_seeded_runs_are_identical() {
    let run = || {
        let mut scheduler = quiet(SimConfig::default());
        let mut spawner = RandomSpawner::new_with_seed(5, 0.05);
        for tick in 0..400 {
            if tick % 4 == 0 {
                scheduler.submit(spawner.next_record());
            }
            scheduler.tick(0.1).unwrap();
        }
        let positions: Vec<(f32, f32)> = scheduler
            .active_vehicles()
            .map(|v| (v.position.x, v.position.y))
            .collect();
        (scheduler.vehicles_processed(), positions)
    };
    assert_eq!(run(), run());
}

#[test]
fn test_metrics_history_sampling() {
    let mut config = SimConfig::default();
    config.scheduler.metrics_interval = 0.5;
    config.scheduler.metrics_history = 4;
    let mut scheduler = quiet(config);
    scheduler.spawn_vehicle(SpawnRecord::new(Approach::East, Direction::Straight));

    for _ in 0..10 {
        scheduler.tick(0.25).unwrap();
    }
    let metrics = scheduler.metrics();
    assert_eq!(metrics.len(), 4);
    let latest = metrics.latest().unwrap();
    // Sampled at 0.25, then every 0.5 s
    assert_eq!(latest.timestamp, 2.25);
    assert_eq!(latest.lane_lengths[LaneId::new(Approach::East, LaneRole::Controlled).index()], 1);

    let efficiency = metrics.system_efficiency();
    assert!(efficiency > 0.0 && efficiency <= 1.0);
}

#[test]
fn test_lane_status_rows() {
    let mut scheduler = quiet(SimConfig::default());
    scheduler.spawn_vehicle(SpawnRecord::new(Approach::South, Direction::Right));
    scheduler.tick(0.5).unwrap();

    let rows = scheduler.lane_statuses();
    assert_eq!(rows.len(), 12);
    let south = rows
        .iter()
        .find(|row| row.lane == LaneId::new(Approach::South, LaneRole::Incoming))
        .unwrap();
    assert_eq!(south.length, 1);
    assert_eq!(south.peak_length, 1);
    assert!(!south.admits_now);
    assert!((south.average_wait - 0.5).abs() < 1e-6);
    assert!(rows.iter().filter(|row| row.admits_now).count() == 4);
}
