// src/lib.rs
//! Fountain
//!
//! A particle fountain whose update kernel runs sequentially, fork-join on a
//! rayon pool, or offloaded to a wgpu compute device.

pub mod error;
pub mod performance;
pub mod prelude;
pub mod simulation;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use error::{SimulationError, SimulationResult};
pub use simulation::emitter::{Emitter, EmitterBuilder, StrategyKind, Wind};
