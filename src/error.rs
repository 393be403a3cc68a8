//! Error types for the fountain simulation.
//!
//! Every fallible operation returns [`SimulationResult<T>`]. The variants name
//! the stage that failed so callers can report it or fall back to a cheaper
//! execution strategy.

use thiserror::Error;

/// Unified error type for particle storage, strategies and compute backends.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Particle storage could not be reserved.
    #[error("Allocation failed: could not reserve storage for {requested} particles")]
    Allocation { requested: usize },

    /// No compute adapter, device or queue could be obtained.
    #[error("Compute backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The compute kernel source failed to compile or validate.
    #[error("Kernel build failed: {0}")]
    KernelBuild(String),

    /// Kernel execution or a buffer transfer failed.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// The fork-join worker pool could not be started.
    #[error("Worker pool failed to start: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, SimulationError>`.
pub type SimulationResult<T> = Result<T, SimulationError>;
