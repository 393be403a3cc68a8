//! Offloaded execution through a batch compute backend
//!
//! Each pass projects the store into [`GpuParticle`] records, uploads them,
//! runs one batch kernel over all particles, and blocks on the readback.
//! The backend advances age, recomputes position and flags respawns; the
//! host then redraws velocities for flagged particles from the same keyed
//! streams the CPU strategies use, so trajectories stay identical.

use super::kernel::{projectile_position, KernelParams, UpdateKernel, RESPAWN_EPSILON};
use super::particle::ParticleStore;
use super::traits::{ExecutionStrategy, PassStats};
use crate::error::{SimulationError, SimulationResult};

/// Minimal particle projection sent to the device
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    pub velocity: [f32; 3],
    pub age: f32,
}

/// Kernel output for one particle
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPosition {
    pub position: [f32; 3],
    /// Non-zero when the particle started a new life this pass.
    pub respawned: u32,
}

/// Uniforms passed to the batch kernel
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniforms {
    pub origin: [f32; 3],
    pub gravity: f32,
    pub wind: [f32; 3],
    pub delta_time: f32,
    pub max_age: f32,
    pub respawn_flags: u32,
    pub particle_count: u32,
    /// Height at or below which a particle respawns.
    pub respawn_height: f32,
}

impl KernelUniforms {
    pub fn new(params: &KernelParams, particle_count: u32) -> Self {
        Self {
            origin: params.origin.into(),
            gravity: params.gravity,
            wind: params.wind.into(),
            delta_time: params.dt,
            max_age: params.respawn.max_age().min(f32::MAX),
            respawn_flags: params.respawn.flags(),
            particle_count,
            respawn_height: params.origin.y - RESPAWN_EPSILON,
        }
    }
}

/// Host-side reference of the batch kernel; the WGSL kernel mirrors it line
/// for line.
pub fn run_batch(
    uniforms: &KernelUniforms,
    particles: &mut [GpuParticle],
    positions: &mut [GpuPosition],
) {
    for (particle, out) in particles.iter_mut().zip(positions.iter_mut()) {
        let age = particle.age + uniforms.delta_time;
        let position = projectile_position(
            uniforms.origin,
            uniforms.wind,
            uniforms.gravity,
            particle.velocity,
            age,
        );

        let below = uniforms.respawn_flags & 0b01 != 0 && position[1] <= uniforms.respawn_height;
        let aged = uniforms.respawn_flags & 0b10 != 0 && age > uniforms.max_age;

        if below || aged {
            particle.age = 0.0;
            *out = GpuPosition {
                position: uniforms.origin,
                respawned: 1,
            };
        } else {
            particle.age = age;
            *out = GpuPosition {
                position,
                respawned: 0,
            };
        }
    }
}

/// An external parallel compute unit
///
/// The offloaded strategy calls `upload`, `dispatch` and `download` once
/// each per pass. `download` must not return until results are visible.
pub trait ComputeBackend: Send {
    /// Backend name (e.g. "host", "wgpu: <adapter>").
    fn name(&self) -> &str;

    /// Returns true if work runs on a GPU.
    fn is_gpu(&self) -> bool;

    /// Copy particles into backend memory, resizing it if needed.
    fn upload(&mut self, particles: &[GpuParticle]) -> SimulationResult<()>;

    /// Run the batch kernel over everything uploaded.
    fn dispatch(&mut self, uniforms: &KernelUniforms) -> SimulationResult<()>;

    /// Blocking readback of updated particles and positions.
    fn download(
        &mut self,
        particles: &mut Vec<GpuParticle>,
        positions: &mut Vec<GpuPosition>,
    ) -> SimulationResult<()>;
}

/// Batch backend that keeps its "device" memory on the host.
///
/// Always available. Serves as the correctness reference for GPU backends
/// and as the fallback when no adapter exists.
#[derive(Debug, Default)]
pub struct HostBackend {
    particles: Vec<GpuParticle>,
    positions: Vec<GpuPosition>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &str {
        "host"
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn upload(&mut self, particles: &[GpuParticle]) -> SimulationResult<()> {
        self.particles.clear();
        self.particles.extend_from_slice(particles);
        self.positions
            .resize(particles.len(), GpuPosition::zeroed_output());
        Ok(())
    }

    fn dispatch(&mut self, uniforms: &KernelUniforms) -> SimulationResult<()> {
        if uniforms.particle_count as usize != self.particles.len() {
            return Err(SimulationError::Dispatch(format!(
                "kernel sized for {} particles but {} were uploaded",
                uniforms.particle_count,
                self.particles.len()
            )));
        }
        run_batch(uniforms, &mut self.particles, &mut self.positions);
        Ok(())
    }

    fn download(
        &mut self,
        particles: &mut Vec<GpuParticle>,
        positions: &mut Vec<GpuPosition>,
    ) -> SimulationResult<()> {
        particles.clone_from(&self.particles);
        positions.clone_from(&self.positions);
        Ok(())
    }
}

impl GpuPosition {
    fn zeroed_output() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Runs the update through a [`ComputeBackend`]
pub struct OffloadedStrategy<B: ComputeBackend> {
    backend: B,
    name: String,
    upload: Vec<GpuParticle>,
    particles: Vec<GpuParticle>,
    positions: Vec<GpuPosition>,
}

impl<B: ComputeBackend> OffloadedStrategy<B> {
    pub fn new(backend: B) -> Self {
        let name = format!("offloaded ({})", backend.name());
        Self {
            backend,
            name,
            upload: Vec::new(),
            particles: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: ComputeBackend> ExecutionStrategy for OffloadedStrategy<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(
        &mut self,
        store: &mut ParticleStore,
        kernel: &UpdateKernel<'_>,
    ) -> SimulationResult<PassStats> {
        let count = store.len();
        if count == 0 {
            return Ok(PassStats::default());
        }
        let particle_count = u32::try_from(count).map_err(|_| {
            SimulationError::Dispatch(format!("{count} particles exceed the kernel index range"))
        })?;

        self.upload.clear();
        self.upload.extend(
            store
                .velocities()
                .iter()
                .zip(store.ages())
                .map(|(&velocity, &age)| GpuParticle { velocity, age }),
        );

        self.backend.upload(&self.upload)?;
        self.backend
            .dispatch(&KernelUniforms::new(kernel.params(), particle_count))?;
        self.backend
            .download(&mut self.particles, &mut self.positions)?;

        if self.particles.len() != count || self.positions.len() != count {
            return Err(SimulationError::Dispatch(format!(
                "backend returned {} particles and {} positions for {} uploaded",
                self.particles.len(),
                self.positions.len(),
                count
            )));
        }

        // Commit only after the whole round trip succeeded.
        let mut respawned = 0;
        let (particles, positions) = (&self.particles, &self.positions);
        store.for_each_mut(|i, p| {
            *p.age = particles[i].age;
            *p.position = positions[i].position;
            if positions[i].respawned != 0 {
                *p.generation = p.generation.wrapping_add(1);
                *p.velocity = kernel.redraw(i, *p.generation);
                respawned += 1;
            }
        });

        Ok(PassStats {
            particles: count,
            respawned,
        })
    }

    fn is_offloaded(&self) -> bool {
        true
    }
}
