// src/simulation/mod.rs
//! Simulation system
//!
//! Particle storage, the fountain update kernel and the strategies that
//! schedule it: sequential and fork-join on the CPU, or offloaded to a batch
//! compute backend.

pub mod cpu;
pub mod emitter;
pub mod gpu;
pub mod kernel;
pub mod low_level;
pub mod manager;
pub mod particle;
pub mod random;
pub mod render;
pub mod traits;
