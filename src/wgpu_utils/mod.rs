// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Typed buffer wrappers and binding helpers used by the compute backend.

pub mod binding_types;
pub mod uniform_buffer;

// Re-export main types
pub use uniform_buffer::{ArrayBuffer, UniformBuffer};
