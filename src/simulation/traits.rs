//! Core execution strategy trait
//!
//! Defines how an emitter's update kernel is scheduled over its particle
//! store. Every implementation must produce the same trajectories as
//! [`SequentialStrategy`](super::cpu::SequentialStrategy) for the same
//! inputs; they differ only in where and how the work runs.

use super::kernel::UpdateKernel;
use super::particle::ParticleStore;
use crate::error::SimulationResult;

/// Outcome of one update pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Particles visited.
    pub particles: usize,
    /// Particles that ended their life this pass.
    pub respawned: usize,
}

/// Scheduling policy for the update kernel
///
/// The emitter calls `update` once per tick with the store borrowed
/// mutably, so no reader can observe a half-written pass. The call is
/// synchronous from the caller's point of view in every implementation.
pub trait ExecutionStrategy: Send {
    /// Strategy name for logs and UI.
    fn name(&self) -> &str;

    /// Applies `kernel` to every particle in `store`.
    ///
    /// On error the store must be left exactly as it was before the call.
    fn update(
        &mut self,
        store: &mut ParticleStore,
        kernel: &UpdateKernel<'_>,
    ) -> SimulationResult<PassStats>;

    /// Whether the work leaves the host CPU.
    fn is_offloaded(&self) -> bool {
        false
    }
}
