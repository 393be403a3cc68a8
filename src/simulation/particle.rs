//! Particle storage
//!
//! Struct-of-arrays layout: each channel (position, velocity, age, respawn
//! generation) lives in its own contiguous vector. Strategies never see the
//! vectors directly; they borrow [`ParticleChunk`] views, which split into
//! disjoint ranges for fork-join workers and iterate cache-friendly for the
//! sequential pass.
//!
//! ```text
//! positions:   [p0, p1, p2, ...]   <- render buffer, bytemuck-castable
//! velocities:  [v0, v1, v2, ...]
//! ages:        [a0, a1, a2, ...]
//! generations: [g0, g1, g2, ...]
//! ```

use super::random::{ParticleSeeder, VelocityDistribution};
use crate::error::{SimulationError, SimulationResult};
use cgmath::Vector3;

/// One particle's kinematic state, copied out of the store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub age: f32,
}

/// Mutable handle to one particle inside a store.
pub struct ParticleMut<'a> {
    pub position: &'a mut [f32; 3],
    pub velocity: &'a mut [f32; 3],
    pub age: &'a mut f32,
    /// Number of times this slot has respawned.
    pub generation: &'a mut u32,
}

/// A contiguous, exclusively borrowed range of particles.
///
/// `offset` is the global index of the first particle, so kernels can key
/// per-particle random streams on the true index regardless of partitioning.
pub struct ParticleChunk<'a> {
    offset: usize,
    positions: &'a mut [[f32; 3]],
    velocities: &'a mut [[f32; 3]],
    ages: &'a mut [f32],
    generations: &'a mut [u32],
}

impl<'a> ParticleChunk<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Splits into `[0, mid)` and `[mid, len)`.
    pub fn split_at(self, mid: usize) -> (ParticleChunk<'a>, ParticleChunk<'a>) {
        let (p0, p1) = self.positions.split_at_mut(mid);
        let (v0, v1) = self.velocities.split_at_mut(mid);
        let (a0, a1) = self.ages.split_at_mut(mid);
        let (g0, g1) = self.generations.split_at_mut(mid);
        (
            ParticleChunk {
                offset: self.offset,
                positions: p0,
                velocities: v0,
                ages: a0,
                generations: g0,
            },
            ParticleChunk {
                offset: self.offset + mid,
                positions: p1,
                velocities: v1,
                ages: a1,
                generations: g1,
            },
        )
    }

    /// Cuts the chunk into pieces of at most `chunk_size` particles.
    pub fn into_chunks(self, chunk_size: usize) -> Vec<ParticleChunk<'a>> {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(self.len().div_ceil(chunk_size));
        let mut rest = self;
        while rest.len() > chunk_size {
            let (head, tail) = rest.split_at(chunk_size);
            chunks.push(head);
            rest = tail;
        }
        if !rest.is_empty() {
            chunks.push(rest);
        }
        chunks
    }

    /// Applies `f` to every particle with its global index.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, ParticleMut<'_>),
    {
        let offset = self.offset;
        let channels = self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(self.ages.iter_mut())
            .zip(self.generations.iter_mut());

        for (i, (((position, velocity), age), generation)) in channels.enumerate() {
            f(
                offset + i,
                ParticleMut {
                    position,
                    velocity,
                    age,
                    generation,
                },
            );
        }
    }
}

/// Owner of all particle state for one emitter.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    positions: Vec<[f32; 3]>,
    velocities: Vec<[f32; 3]>,
    ages: Vec<f32>,
    generations: Vec<u32>,
}

impl ParticleStore {
    /// Allocates `count` particles at `origin` with fresh velocities.
    ///
    /// Returns [`SimulationError::Allocation`] if any channel cannot be
    /// reserved.
    pub fn initialize(
        origin: Vector3<f32>,
        count: usize,
        distribution: &VelocityDistribution,
        seeder: &ParticleSeeder,
    ) -> SimulationResult<Self> {
        let mut store = Self {
            positions: reserve_channel(count)?,
            velocities: reserve_channel(count)?,
            ages: reserve_channel(count)?,
            generations: reserve_channel(count)?,
        };

        let origin: [f32; 3] = origin.into();
        store.positions.resize(count, origin);
        store.ages.resize(count, 0.0);
        store.generations.resize(count, 0);
        store
            .velocities
            .extend((0..count).map(|i| -> [f32; 3] { seeder.velocity(distribution, i, 0).into() }));

        Ok(store)
    }

    /// Puts every particle back at `origin` in its first life.
    pub fn reset(
        &mut self,
        origin: Vector3<f32>,
        distribution: &VelocityDistribution,
        seeder: &ParticleSeeder,
    ) {
        self.as_chunk().for_each_mut(|i, p| {
            *p.position = origin.into();
            *p.age = 0.0;
            *p.generation = 0;
            *p.velocity = seeder.velocity(distribution, i, 0).into();
        });
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Render-ready positions, refreshed by every update pass.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn velocities(&self) -> &[[f32; 3]] {
        &self.velocities
    }

    pub fn ages(&self) -> &[f32] {
        &self.ages
    }

    pub fn generations(&self) -> &[u32] {
        &self.generations
    }

    pub fn particle(&self, index: usize) -> Option<Particle> {
        Some(Particle {
            position: Vector3::from(*self.positions.get(index)?),
            velocity: Vector3::from(*self.velocities.get(index)?),
            age: *self.ages.get(index)?,
        })
    }

    /// Visits every particle. Callers must not rely on visiting order.
    pub fn for_each_mut<F>(&mut self, f: F)
    where
        F: FnMut(usize, ParticleMut<'_>),
    {
        self.as_chunk().for_each_mut(f);
    }

    /// Borrows the whole store as a single chunk.
    pub fn as_chunk(&mut self) -> ParticleChunk<'_> {
        ParticleChunk {
            offset: 0,
            positions: &mut self.positions,
            velocities: &mut self.velocities,
            ages: &mut self.ages,
            generations: &mut self.generations,
        }
    }

    /// Borrows the store as disjoint chunks of at most `chunk_size`.
    pub fn chunks_mut(&mut self, chunk_size: usize) -> Vec<ParticleChunk<'_>> {
        self.as_chunk().into_chunks(chunk_size)
    }
}

fn reserve_channel<T>(count: usize) -> SimulationResult<Vec<T>> {
    let mut channel = Vec::new();
    channel
        .try_reserve_exact(count)
        .map_err(|_| SimulationError::Allocation { requested: count })?;
    Ok(channel)
}
