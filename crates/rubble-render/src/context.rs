//! Device errors and capability probing

use rubble_core::RubbleError;
use rubble_instance::{UploadTier, DEFAULT_WINDOW_BYTES};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to get adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
}

impl From<RenderError> for RubbleError {
    fn from(err: RenderError) -> Self {
        RubbleError::Backend(err.to_string())
    }
}

/// Pick the upload tier a device with `limits` can serve.
///
/// Devices that can read storage buffers from the vertex stage get a single
/// raw window. Everything else binds constant-buffer windows no larger than
/// the uniform binding limit.
pub fn tier_for_limits(limits: &wgpu::Limits) -> UploadTier {
    if limits.max_storage_buffers_per_shader_stage > 0 && limits.max_storage_buffer_binding_size > 0
    {
        UploadTier::Unrestricted
    } else {
        let max_window_bytes =
            (limits.max_uniform_buffer_binding_size as usize).min(DEFAULT_WINDOW_BYTES);
        UploadTier::Windowed { max_window_bytes }
    }
}
