//! # Fountain Prelude
//!
//! Commonly used types in one import.
//!
//! ```no_run
//! use fountain::prelude::*;
//!
//! let wind = Wind::default();
//! let emitter = EmitterBuilder::new()
//!     .with_count(1000)
//!     .with_strategy(StrategyKind::Offloaded { backend: BackendKind::Wgpu })
//!     .build(wind.clone())?;
//!
//! let mut manager = SimulationManager::new(emitter, NullRenderer::default());
//! manager.advance(1.0 / 60.0)?;
//! manager.apply_wind(WindControl::IncreaseX);
//! # Ok::<(), SimulationError>(())
//! ```

// Re-export errors
pub use crate::error::{SimulationError, SimulationResult};

// Re-export the emitter and its configuration
pub use crate::simulation::cpu::Partition;
pub use crate::simulation::emitter::{
    BackendKind, Emitter, EmitterBuilder, EmitterSettings, StrategyKind, Wind,
};
pub use crate::simulation::kernel::{RespawnRule, DEFAULT_GRAVITY, DEFAULT_TICK};
pub use crate::simulation::random::{OrbitTarget, VelocityDistribution};

// Re-export the simulation framework
pub use crate::simulation::manager::{SimulationManager, WindControl};
pub use crate::simulation::render::{NullRenderer, Renderer, SharedPositions};
pub use crate::simulation::traits::{ExecutionStrategy, PassStats};

// Re-export performance monitoring
pub use crate::performance::{UpdateMetrics, UpdateTimer};

// Re-export common external dependencies
pub use cgmath::Vector3;
