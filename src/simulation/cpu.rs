//! CPU execution strategies
//!
//! Two host-side ways to run the update kernel: a plain sequential pass and
//! a fork-join pass that hands disjoint chunks of the store to a rayon
//! worker pool. Particles never read each other, so chunks need no locking;
//! the only shared state is the kernel's read-only parameters.

use super::kernel::UpdateKernel;
use super::particle::ParticleStore;
use super::traits::{ExecutionStrategy, PassStats};
use crate::error::SimulationResult;
use rayon::prelude::*;

/// Single-threaded, in-place pass. The reference every other strategy is
/// measured against.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &str {
        "sequential"
    }

    fn update(
        &mut self,
        store: &mut ParticleStore,
        kernel: &UpdateKernel<'_>,
    ) -> SimulationResult<PassStats> {
        let particles = store.len();
        let respawned = kernel.run(store.as_chunk());
        Ok(PassStats {
            particles,
            respawned,
        })
    }
}

/// How the fork-join strategy cuts the store into work items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Partition {
    /// One contiguous chunk per worker.
    #[default]
    Static,
    /// Fixed-size chunks, balanced by work stealing.
    Dynamic { chunk_size: usize },
}

/// Fork-join pass over a dedicated worker pool
///
/// The pool lives as long as the strategy and is shut down when the
/// strategy is dropped. `update` returns only after every chunk is done.
pub struct ForkJoinStrategy {
    pool: rayon::ThreadPool,
    workers: usize,
    partition: Partition,
}

impl ForkJoinStrategy {
    /// Starts a pool of `workers` threads; `0` means one per logical CPU.
    pub fn new(workers: usize, partition: Partition) -> SimulationResult<Self> {
        let workers = if workers == 0 {
            num_cpus::get()
        } else {
            workers
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fountain-worker-{i}"))
            .build()?;

        log::info!(
            "Fork-join strategy started with {} workers ({:?} partition)",
            workers,
            partition
        );

        Ok(Self {
            pool,
            workers,
            partition,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Chunk length used for a store of `len` particles.
    pub fn chunk_size(&self, len: usize) -> usize {
        match self.partition {
            Partition::Static => len.div_ceil(self.workers).max(1),
            Partition::Dynamic { chunk_size } => chunk_size.max(1),
        }
    }
}

impl ExecutionStrategy for ForkJoinStrategy {
    fn name(&self) -> &str {
        "fork-join"
    }

    fn update(
        &mut self,
        store: &mut ParticleStore,
        kernel: &UpdateKernel<'_>,
    ) -> SimulationResult<PassStats> {
        let particles = store.len();
        if particles == 0 {
            return Ok(PassStats::default());
        }

        let chunks = store.chunks_mut(self.chunk_size(particles));
        let respawned = self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| kernel.run(chunk))
                .sum::<usize>()
        });

        Ok(PassStats {
            particles,
            respawned,
        })
    }
}

impl Drop for ForkJoinStrategy {
    fn drop(&mut self) {
        log::debug!("Shutting down {} fork-join workers", self.workers);
    }
}
