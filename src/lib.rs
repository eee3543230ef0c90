//! Junction Simulation Library
//!
//! Right-of-way control at a four-approach intersection: queue-driven
//! traffic lights, per-lane admission and collision-free vehicle motion.

pub mod simulation;
