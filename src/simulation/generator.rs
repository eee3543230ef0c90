//! Background traffic producers
//!
//! Each producer owns a [`SpawnProducer`] and runs on its own thread until
//! it is stopped, runs out of input, or the simulation drops its feed.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::spawn::{SpawnMessage, SpawnProducer, SpawnRecord};
use super::types::{Approach, Direction};

/// Draws random vehicles: uniform approach, half straight, a quarter each way
pub struct RandomSpawner {
    rng: Option<StdRng>,
    emergency_probability: f64,
}

impl RandomSpawner {
    pub fn new(emergency_probability: f64) -> Self {
        Self {
            rng: None,
            emergency_probability,
        }
    }

    /// Create a spawner with a seeded RNG for reproducible traffic
    pub fn new_with_seed(seed: u64, emergency_probability: f64) -> Self {
        Self {
            rng: Some(StdRng::seed_from_u64(seed)),
            emergency_probability,
        }
    }

    fn random_below(&mut self, upper: u32) -> u32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..upper),
            None => rand::rng().random_range(0..upper),
        }
    }

    fn random_bool(&mut self, p: f64) -> bool {
        let p = p.clamp(0.0, 1.0);
        match &mut self.rng {
            Some(rng) => rng.random_bool(p),
            None => rand::rng().random_bool(p),
        }
    }

    pub fn next_record(&mut self) -> SpawnRecord {
        let approach = Approach::ALL[self.random_below(4) as usize];
        let direction = match self.random_below(4) {
            0 | 1 => Direction::Straight,
            2 => Direction::Left,
            _ => Direction::Right,
        };
        let emergency = self.random_bool(self.emergency_probability);
        SpawnRecord {
            approach,
            direction,
            emergency,
        }
    }
}

/// Longest uninterrupted sleep between stop-flag checks
const STOP_POLL: Duration = Duration::from_millis(20);

/// Sleep for `total`, returning early once `flag` is set
fn wait_unless_stopped(flag: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !flag.load(Ordering::Relaxed) {
        let nap = remaining.min(STOP_POLL);
        std::thread::sleep(nap);
        remaining -= nap;
    }
}

/// A running producer thread
pub struct ProducerHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<usize>,
}

impl ProducerHandle {
    /// Ask the thread to finish after its current message
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to finish. Returns how many messages it sent.
    ///
    /// An unlimited producer only finishes once stopped or once the feed is
    /// dropped, and a thread blocked on a full channel only returns once
    /// the feed is dropped.
    pub fn join(self) -> Result<usize> {
        self.handle
            .join()
            .map_err(|_| anyhow!("spawn producer thread panicked"))
    }
}

/// Run `spawner` on a background thread.
///
/// `spawn_rate` is in vehicles per simulated second and `realtime_factor`
/// is simulated seconds per wall-clock second. `limit` caps the number of
/// records sent.
pub fn spawn_random_producer(
    producer: SpawnProducer,
    mut spawner: RandomSpawner,
    spawn_rate: f32,
    realtime_factor: f32,
    limit: Option<usize>,
) -> ProducerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let per_second = (spawn_rate * realtime_factor).max(f32::EPSILON);
    let interval = Duration::from_secs_f32((1.0 / per_second).min(60.0));

    let handle = std::thread::spawn(move || {
        let mut sent = 0;
        while !flag.load(Ordering::Relaxed) && limit.map_or(true, |limit| sent < limit) {
            let record = spawner.next_record();
            if producer.send(record).is_err() {
                debug!("Spawn feed closed, random producer exiting");
                break;
            }
            sent += 1;
            wait_unless_stopped(&flag, interval);
        }
        sent
    });

    ProducerHandle { stop, handle }
}

/// Stream the lines of a spawn file into the feed, unparsed
pub fn spawn_file_producer(path: impl AsRef<Path>, producer: SpawnProducer) -> Result<ProducerHandle> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open spawn file {}", path.display()))?;
    let reader = BufReader::new(file);

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let name = path.display().to_string();

    let handle = std::thread::spawn(move || {
        let mut sent = 0;
        for line in reader.lines() {
            if flag.load(Ordering::Relaxed) {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("Stopped reading {}: {}", name, err);
                    break;
                }
            };
            if producer.send(SpawnMessage::Line(line)).is_err() {
                break;
            }
            sent += 1;
        }
        debug!("Spawn file {} exhausted after {} lines", name, sent);
        sent
    });

    Ok(ProducerHandle { stop, handle })
}
