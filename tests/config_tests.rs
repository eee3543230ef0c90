//! Configuration loading and validation tests

use junction_sim::simulation::{
    Approach, LaneId, LaneRole, SimConfig, SimError, Validate, MAX_WAIT_TIME,
};

#[test]
fn test_defaults_are_valid() {
    let config = SimConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.scheduler.max_wait_time, MAX_WAIT_TIME);
    assert_eq!(config.signal.high_threshold, 10);
    assert_eq!(config.signal.low_threshold, 5);
    assert_eq!(
        config.signal.priority_lane,
        Some(LaneId::new(Approach::North, LaneRole::Controlled))
    );
}

#[test]
fn test_empty_document_gives_defaults() {
    assert_eq!(SimConfig::from_toml_str("").unwrap(), SimConfig::default());
}

#[test]
fn test_partial_override() {
    let config = SimConfig::from_toml_str(
        r#"
        [signal]
        max_green = 20.0
        priority_lane = { approach = "East", role = "Incoming" }

        [motion]
        cruise_speed = 90.0
        "#,
    )
    .unwrap();

    assert_eq!(config.signal.max_green, 20.0);
    assert_eq!(config.signal.min_green, 3.0);
    assert_eq!(
        config.signal.priority_lane,
        Some(LaneId::new(Approach::East, LaneRole::Incoming))
    );
    assert_eq!(config.motion.cruise_speed, 90.0);
    assert_eq!(config.generator.spawn_rate, 1.5);
}

#[test]
fn test_inverted_thresholds_rejected() {
    let err = SimConfig::from_toml_str(
        r#"
        [signal]
        high_threshold = 3
        low_threshold = 8
        "#,
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SimError>(),
        Some(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_out_of_range_values_rejected() {
    let mut config = SimConfig::default();
    config.motion.box_decay = 1.5;
    assert!(config.validate().is_err());

    let mut config = SimConfig::default();
    config.signal.min_green = 20.0;
    assert!(config.validate().is_err());

    let mut config = SimConfig::default();
    config.signal.priority_lane = Some(LaneId::new(Approach::South, LaneRole::FreeTurn));
    assert!(config.validate().is_err());

    let mut config = SimConfig::default();
    config.generator.emergency_probability = 2.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_unparseable_document_rejected() {
    assert!(SimConfig::from_toml_str("[signal]\nmax_green = \"long\"").is_err());
}

#[test]
fn test_missing_file_reports_path() {
    let err = SimConfig::from_toml_file("/no/such/junction.toml").unwrap_err();
    assert!(format!("{:#}", err).contains("/no/such/junction.toml"));
}
