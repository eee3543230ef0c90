use std::io::Write;
use std::process::{Command, Output};

fn run_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_junction_sim"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute simulation")
}

fn logged_count(stderr: &str, label: &str) -> usize {
    let line = stderr
        .lines()
        .find(|line| line.contains(label))
        .unwrap_or_else(|| panic!("Could not find '{}' line", label));
    let parts: Vec<&str> = line.split(label).collect();
    parts
        .get(1)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| panic!("Could not parse count from line: {}", line))
}

/// Test that the simulation runs headless and logs its summary
#[test]
fn test_headless_simulation_runs() {
    let output = run_sim(&[
        "--ticks",
        "100",
        "--seed",
        "42",
        "--realtime-factor",
        "100",
    ]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        stderr
    );
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    for label in [
        "Vehicles processed:",
        "Active vehicles:",
        "Average wait:",
        "System efficiency:",
    ] {
        assert!(stderr.contains(label), "Missing '{}' statistic", label);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--- After tick 10 (1.0s simulated time) ---"));
}

/// Test that vehicles arrive from the background producer
#[test]
fn test_vehicles_spawn_during_simulation() {
    let output = run_sim(&["--ticks", "100", "--realtime-factor", "100"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(logged_count(&stderr, "Total vehicles spawned:") > 0);
}

/// Test that a spawn file is streamed and bad lines are dropped
#[test]
fn test_spawn_file_run() {
    let path = std::env::temp_dir().join(format!("junction_sim_cli_{}.txt", std::process::id()));
    let mut file = std::fs::File::create(&path).expect("create spawn file");
    writeln!(file, "N,L;\nE,S;\nS,R;\nnot a vehicle\n# done").expect("write spawn file");
    drop(file);

    let output = run_sim(&[
        "--ticks",
        "50",
        "--spawn-file",
        path.to_str().expect("utf-8 temp path"),
        "--realtime-factor",
        "10",
    ]);
    std::fs::remove_file(&path).ok();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {}", stderr);
    assert_eq!(logged_count(&stderr, "Total vehicles spawned:"), 3);
    assert_eq!(logged_count(&stderr, "Rejected spawn records:"), 1);
}

/// Test that a broken config file stops the run
#[test]
fn test_missing_config_fails() {
    let output = run_sim(&["--ticks", "10", "--config", "/no/such/junction.toml"]);
    assert!(!output.status.success());
}

/// Test that random traffic needs a positive pacing factor
#[test]
fn test_unpaced_random_traffic_rejected() {
    let output = run_sim(&["--ticks", "10", "--realtime-factor", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--realtime-factor"), "stderr: {}", stderr);
}
