//! Spawn records and the channel that carries them into the simulation
//!
//! Producers run on their own threads and push either typed records or raw
//! text lines. The scheduler drains the channel once per tick without
//! blocking and parses lines itself, so a bad line costs one warning and
//! nothing else.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::fmt;
use std::str::FromStr;

use super::error::SimError;
use super::types::{Approach, Direction};

/// One vehicle to add to the junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpawnRecord {
    pub approach: Approach,
    pub direction: Direction,
    pub emergency: bool,
}

impl SpawnRecord {
    pub fn new(approach: Approach, direction: Direction) -> Self {
        Self {
            approach,
            direction,
            emergency: false,
        }
    }

    pub fn emergency(approach: Approach, direction: Direction) -> Self {
        Self {
            approach,
            direction,
            emergency: true,
        }
    }
}

impl fmt::Display for SpawnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Straight => 'S',
            Direction::Left => 'L',
            Direction::Right => 'R',
        };
        write!(f, "{},{}", self.approach.letter(), direction)?;
        if self.emergency {
            write!(f, ",E")?;
        }
        write!(f, ";")
    }
}

fn parse_approach(token: &str) -> Option<Approach> {
    match token.to_ascii_lowercase().as_str() {
        "n" | "north" => Some(Approach::North),
        "e" | "east" => Some(Approach::East),
        "s" | "south" => Some(Approach::South),
        "w" | "west" => Some(Approach::West),
        _ => None,
    }
}

fn parse_direction(token: &str) -> Option<Direction> {
    match token.to_ascii_lowercase().as_str() {
        "s" | "straight" => Some(Direction::Straight),
        "l" | "left" => Some(Direction::Left),
        "r" | "right" => Some(Direction::Right),
        _ => None,
    }
}

fn parse_flag(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "e" | "emergency" | "1" | "true" | "y" | "yes" => Some(true),
        "0" | "false" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Parse one line of spawn input.
///
/// Accepts `<approach>,<direction>[,<emergency>]` with an optional trailing
/// `;`, separated by commas or whitespace, in any case. Blank lines and
/// `#` comments yield `Ok(None)`.
pub fn parse_spawn_line(line: &str) -> Result<Option<SpawnRecord>, SimError> {
    let content = line.split('#').next().unwrap_or("").trim();
    let content = content.trim_end_matches(';').trim();
    if content.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let (approach, direction, flag) = match tokens.as_slice() {
        [a, d] => (*a, *d, None),
        [a, d, e] => (*a, *d, Some(*e)),
        _ => {
            return Err(SimError::malformed(
                line,
                format!("expected 2 or 3 fields, found {}", tokens.len()),
            ))
        }
    };

    let approach = parse_approach(approach)
        .ok_or_else(|| SimError::malformed(line, format!("unknown approach {:?}", approach)))?;
    let direction = parse_direction(direction)
        .ok_or_else(|| SimError::malformed(line, format!("unknown direction {:?}", direction)))?;
    let emergency = match flag {
        None => false,
        Some(flag) => parse_flag(flag)
            .ok_or_else(|| SimError::malformed(line, format!("unknown emergency flag {:?}", flag)))?,
    };

    Ok(Some(SpawnRecord {
        approach,
        direction,
        emergency,
    }))
}

impl FromStr for SpawnRecord {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_spawn_line(s)?.ok_or_else(|| SimError::malformed(s, "empty record"))
    }
}

/// What travels over the spawn channel
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnMessage {
    Record(SpawnRecord),
    /// Unparsed text, checked by the consumer
    Line(String),
}

impl From<SpawnRecord> for SpawnMessage {
    fn from(record: SpawnRecord) -> Self {
        SpawnMessage::Record(record)
    }
}

/// Sending half, owned by a producer thread
#[derive(Debug, Clone)]
pub struct SpawnProducer {
    tx: Sender<SpawnMessage>,
}

impl SpawnProducer {
    /// Blocks while the channel is full. Fails once the feed is dropped.
    pub fn send(&self, message: impl Into<SpawnMessage>) -> Result<(), SimError> {
        self.tx.send(message.into()).map_err(|_| SimError::FeedClosed)
    }

    /// Non-blocking send. Returns `Ok(false)` when the channel is full.
    pub fn try_send(&self, message: impl Into<SpawnMessage>) -> Result<bool, SimError> {
        match self.tx.try_send(message.into()) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(SimError::FeedClosed),
        }
    }
}

/// Receiving half, owned by the scheduler
#[derive(Debug)]
pub struct SpawnFeed {
    rx: Receiver<SpawnMessage>,
    closed: bool,
}

impl SpawnFeed {
    /// Take everything queued right now
    pub fn drain(&mut self) -> Vec<SpawnMessage> {
        let mut messages = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        messages
    }

    /// True once every producer is gone and the channel has been emptied
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Create a bounded spawn channel
pub fn channel(capacity: usize) -> (SpawnProducer, SpawnFeed) {
    let (tx, rx) = bounded(capacity.max(1));
    (SpawnProducer { tx }, SpawnFeed { rx, closed: false })
}
