//! Renderer seam
//!
//! The simulation never draws. Once per frame it hands the position buffer
//! to whatever implements [`Renderer`].

use std::sync::{Arc, PoisonError, RwLock};

/// Consumer of the per-frame position buffer
pub trait Renderer {
    /// Receives the positions for the coming frame, one `[x, y, z]` per
    /// particle.
    fn upload_positions(&mut self, positions: &[[f32; 3]]);

    /// Draws the last uploaded buffer.
    fn draw(&mut self);
}

/// Renderer that counts calls and draws nothing
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub uploads: usize,
    pub draws: usize,
    pub last_len: usize,
}

impl Renderer for NullRenderer {
    fn upload_positions(&mut self, positions: &[[f32; 3]]) {
        self.uploads += 1;
        self.last_len = positions.len();
    }

    fn draw(&mut self) {
        self.draws += 1;
    }
}

/// Position buffer shared with a render thread
///
/// Writers replace the whole buffer under the write lock, so readers see
/// either the previous frame or the next one, never a mix.
#[derive(Clone, Debug, Default)]
pub struct SharedPositions {
    inner: Arc<RwLock<Vec<[f32; 3]>>>,
}

impl SharedPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the buffer contents.
    pub fn publish(&self, positions: &[[f32; 3]]) {
        let mut buffer = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        buffer.clear();
        buffer.extend_from_slice(positions);
    }

    /// Runs `f` over the current buffer while holding the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&[[f32; 3]]) -> R) -> R {
        let buffer = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&buffer)
    }

    pub fn snapshot(&self) -> Vec<[f32; 3]> {
        self.read(|positions| positions.to_vec())
    }

    /// Raw bytes of the buffer, as a vertex buffer upload would take them.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.read(|positions| bytemuck::cast_slice(positions).to_vec())
    }

    pub fn len(&self) -> usize {
        self.read(|positions| positions.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Renderer for SharedPositions {
    fn upload_positions(&mut self, positions: &[[f32; 3]]) {
        self.publish(positions);
    }

    fn draw(&mut self) {}
}
