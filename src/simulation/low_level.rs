//! # Low-Level GPU Compute
//!
//! Direct access to the wgpu device used by the offloaded strategy.
//!
//! ## Features
//!
//! - **Headless Context**: Adapter and device acquisition without a surface
//! - **Kernel Building**: Shader and pipeline creation with validation errors
//!   surfaced as [`SimulationError::KernelBuild`]
//! - **Batch Backend**: [`WgpuBackend`] implements [`ComputeBackend`] with
//!   storage buffers sized to the particle count and blocking readback
//!
//! ## Usage
//!
//! ```no_run
//! use fountain::simulation::gpu::OffloadedStrategy;
//! use fountain::simulation::low_level::WgpuBackend;
//!
//! let strategy = OffloadedStrategy::new(WgpuBackend::new()?);
//! # Ok::<(), fountain::error::SimulationError>(())
//! ```

use super::gpu::{ComputeBackend, GpuParticle, GpuPosition, KernelUniforms};
use crate::error::{SimulationError, SimulationResult};
use crate::wgpu_utils::binding_types;
use crate::wgpu_utils::{ArrayBuffer, UniformBuffer};
use std::time::Instant;

/// Threads per workgroup in the fountain kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// WGSL source of the fountain update kernel.
pub fn default_kernel_source() -> &'static str {
    include_str!("fountain.wgsl")
}

/// Headless GPU compute context
pub struct ComputeContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
}

impl ComputeContext {
    /// Requests a high-performance adapter and a device with its full limits
    pub async fn new() -> SimulationResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SimulationError::BackendUnavailable(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Fountain Compute Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| SimulationError::BackendUnavailable(e.to_string()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Compute adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn new_blocking() -> SimulationResult<Self> {
        pollster::block_on(Self::new())
    }

    /// Gets the GPU device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Gets the command queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Compiles `source` and builds a compute pipeline over `layout`
    pub fn create_compute_pipeline(
        &self,
        name: &str,
        source: &str,
        entry_point: &str,
        layout: &wgpu::BindGroupLayout,
    ) -> SimulationResult<wgpu::ComputePipeline> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{name}_layout")),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(SimulationError::KernelBuild(error.to_string())),
            None => Ok(pipeline),
        }
    }

    /// Workgroup grid covering `count` invocations, spilling into y when x
    /// would exceed the device limit
    pub fn workgroup_grid(&self, count: u32) -> (u32, u32, u32) {
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        workgroup_grid(count, max)
    }
}

fn workgroup_grid(count: u32, max_per_dimension: u32) -> (u32, u32, u32) {
    let groups = count.div_ceil(WORKGROUP_SIZE);
    if groups <= max_per_dimension {
        (groups, 1, 1)
    } else {
        (max_per_dimension, groups.div_ceil(max_per_dimension), 1)
    }
}

/// Device buffers for one particle count
struct ParticleBuffers {
    len: usize,
    particles: ArrayBuffer<GpuParticle>,
    positions: ArrayBuffer<GpuPosition>,
    particles_staging: ArrayBuffer<GpuParticle>,
    positions_staging: ArrayBuffer<GpuPosition>,
    bind_group: wgpu::BindGroup,
}

/// [`ComputeBackend`] running the fountain kernel on a wgpu device
pub struct WgpuBackend {
    context: ComputeContext,
    name: String,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    uniforms: UniformBuffer<KernelUniforms>,
    buffers: Option<ParticleBuffers>,
    uploaded: usize,
}

impl WgpuBackend {
    /// Acquires a device and builds the default kernel
    pub fn new() -> SimulationResult<Self> {
        Self::with_kernel_source(default_kernel_source())
    }

    /// Same as [`WgpuBackend::new`] with a custom WGSL kernel. The kernel
    /// must keep the default kernel's bindings and entry point.
    pub fn with_kernel_source(source: &str) -> SimulationResult<Self> {
        let started = Instant::now();
        let context = ComputeContext::new_blocking()?;

        let layout = context
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Fountain Bind Group Layout"),
                entries: &[
                    binding_types::compute_entry(0, binding_types::storage_buffer_read_write()),
                    binding_types::compute_entry(1, binding_types::storage_buffer_read_write()),
                    binding_types::compute_entry(2, binding_types::uniform()),
                ],
            });

        let pipeline = context.create_compute_pipeline("fountain_update", source, "main", &layout)?;
        let uniforms = UniformBuffer::new(context.device());
        let name = format!("wgpu: {}", context.adapter_name());

        log::info!(
            "Built fountain kernel on {} in {:.2?}",
            context.adapter_name(),
            started.elapsed()
        );

        Ok(Self {
            context,
            name,
            layout,
            pipeline,
            uniforms,
            buffers: None,
            uploaded: 0,
        })
    }

    pub fn context(&self) -> &ComputeContext {
        &self.context
    }

    fn create_buffers(&self, len: usize) -> SimulationResult<ParticleBuffers> {
        let device = self.context.device();
        check_buffer_limits(len, &device.limits())?;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let particles = ArrayBuffer::new_storage(device, len);
        let positions = ArrayBuffer::new_storage(device, len);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fountain Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particles.binding_resource(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: positions.binding_resource(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniforms.binding_resource(),
                },
            ],
        });

        let buffers = ParticleBuffers {
            len,
            particles,
            positions,
            particles_staging: ArrayBuffer::new_staging(device, len),
            positions_staging: ArrayBuffer::new_staging(device, len),
            bind_group,
        };

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(SimulationError::Dispatch(format!(
                "allocating buffers for {len} particles failed: {error}"
            )));
        }

        log::debug!("Allocated device buffers for {} particles", len);
        Ok(buffers)
    }
}

/// Rejects particle counts whose buffers the device cannot hold or bind.
fn check_buffer_limits(len: usize, limits: &wgpu::Limits) -> SimulationResult<()> {
    let stride = std::mem::size_of::<GpuParticle>().max(std::mem::size_of::<GpuPosition>());
    let bytes = len
        .checked_mul(stride)
        .and_then(|bytes| u64::try_from(bytes).ok())
        .ok_or_else(|| {
            SimulationError::Dispatch(format!("buffer size for {len} particles overflows"))
        })?;

    let limit = limits
        .max_buffer_size
        .min(u64::from(limits.max_storage_buffer_binding_size));
    if bytes > limit {
        return Err(SimulationError::Dispatch(format!(
            "{len} particles need {bytes} byte buffers but the device allows {limit}"
        )));
    }
    Ok(())
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn upload(&mut self, particles: &[GpuParticle]) -> SimulationResult<()> {
        self.uploaded = particles.len();
        if particles.is_empty() {
            return Ok(());
        }

        if self.buffers.as_ref().map(|b| b.len) != Some(particles.len()) {
            self.buffers = None;
            self.buffers = Some(self.create_buffers(particles.len())?);
        }
        let Some(buffers) = &self.buffers else {
            return Err(SimulationError::Dispatch("device buffers missing".into()));
        };

        let device = self.context.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let written = buffers.particles.write(self.context.queue(), particles);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            self.buffers = None;
            return Err(SimulationError::Dispatch(format!(
                "uploading {} particles failed: {error}",
                particles.len()
            )));
        }
        written
    }

    fn dispatch(&mut self, uniforms: &KernelUniforms) -> SimulationResult<()> {
        if uniforms.particle_count as usize != self.uploaded {
            return Err(SimulationError::Dispatch(format!(
                "kernel sized for {} particles but {} were uploaded",
                uniforms.particle_count, self.uploaded
            )));
        }
        if self.uploaded == 0 {
            return Ok(());
        }

        self.uniforms.update_content(self.context.queue(), *uniforms);

        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| SimulationError::Dispatch("device buffers missing".into()))?;
        let device = self.context.device();
        let (x, y, z) = self.context.workgroup_grid(uniforms.particle_count);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fountain Update Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("fountain_update_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&buffers.bind_group), &[]);
            pass.dispatch_workgroups(x, y, z);
        }
        buffers
            .particles
            .copy_to(&mut encoder, &buffers.particles_staging);
        buffers
            .positions
            .copy_to(&mut encoder, &buffers.positions_staging);

        self.context.queue().submit(std::iter::once(encoder.finish()));

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(SimulationError::Dispatch(error.to_string())),
            None => Ok(()),
        }
    }

    fn download(
        &mut self,
        particles: &mut Vec<GpuParticle>,
        positions: &mut Vec<GpuPosition>,
    ) -> SimulationResult<()> {
        particles.clear();
        positions.clear();
        if self.uploaded == 0 {
            return Ok(());
        }

        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| SimulationError::Dispatch("device buffers missing".into()))?;
        let device = self.context.device();

        *particles = buffers.particles_staging.read_back(device)?;
        *positions = buffers.positions_staging.read_back(device)?;
        particles.truncate(self.uploaded);
        positions.truncate(self.uploaded);
        Ok(())
    }
}
