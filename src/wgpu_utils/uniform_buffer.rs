// src/wgpu_utils/uniform_buffer.rs - Typed uniform, storage and staging buffers
use crate::error::{SimulationError, SimulationResult};
use std::marker::PhantomData;

fn short_type_name<T>() -> &'static str {
    let type_name = std::any::type_name::<T>();
    match type_name.rfind(':') {
        Some(pos) => &type_name[(pos + 1)..],
        None => type_name,
    }
}

/// Single-value uniform buffer
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    /// Create a new uniform buffer
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", short_type_name::<Content>())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: Vec::new(),
        }
    }

    /// Update buffer content (skips the write when nothing changed)
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let new_content = bytemuck::bytes_of(&content);
        if self.previous_content == new_content {
            return;
        }
        queue.write_buffer(&self.buffer, 0, new_content);
        self.previous_content = new_content.to_vec();
    }

    /// Get binding resource
    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Fixed-capacity array of `Content` in device memory
pub struct ArrayBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    capacity: usize,
}

impl<Content: bytemuck::Pod> ArrayBuffer<Content> {
    fn byte_size(capacity: usize) -> u64 {
        (capacity * std::mem::size_of::<Content>()) as u64
    }

    /// Read-write storage buffer that can be written from the host and
    /// copied out for readback
    pub fn new_storage(device: &wgpu::Device, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("ArrayBuffer<{}>", short_type_name::<Content>())),
            size: Self::byte_size(capacity),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        ArrayBuffer {
            buffer,
            content_type: PhantomData,
            capacity,
        }
    }

    /// Create new staging buffer for reading back GPU data
    pub fn new_staging(device: &wgpu::Device, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("StagingBuffer<{}>", short_type_name::<Content>())),
            size: Self::byte_size(capacity),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        ArrayBuffer {
            buffer,
            content_type: PhantomData,
            capacity,
        }
    }

    /// Queue a host-to-device copy of `data`
    pub fn write(&self, queue: &wgpu::Queue, data: &[Content]) -> SimulationResult<()> {
        if data.len() > self.capacity {
            return Err(SimulationError::Dispatch(format!(
                "{} elements exceed buffer capacity of {}",
                data.len(),
                self.capacity
            )));
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Record a full copy of this buffer into `staging`
    pub fn copy_to(&self, encoder: &mut wgpu::CommandEncoder, staging: &ArrayBuffer<Content>) {
        let len = self.capacity.min(staging.capacity);
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging.buffer, 0, Self::byte_size(len));
    }

    /// Map a staging buffer and copy its contents out (blocking)
    pub fn read_back(&self, device: &wgpu::Device) -> SimulationResult<Vec<Content>> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| SimulationError::Dispatch(format!("device poll failed: {e}")))?;

        match futures::executor::block_on(rx) {
            Ok(Ok(())) => {
                let mapped = slice.get_mapped_range();
                let result: Vec<Content> = bytemuck::cast_slice(&mapped).to_vec();
                drop(mapped);
                self.buffer.unmap();
                Ok(result)
            }
            Ok(Err(e)) => Err(SimulationError::Dispatch(format!(
                "failed to map {}: {e}",
                short_type_name::<Content>()
            ))),
            Err(_) => Err(SimulationError::Dispatch(
                "buffer mapping was cancelled".to_string(),
            )),
        }
    }

    /// Get binding resource
    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
