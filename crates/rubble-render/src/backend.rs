//! [`RenderBackend`] over a wgpu device

use crate::context::tier_for_limits;
use crate::headless::HeadlessContext;
use rubble_core::{Result, RubbleError};
use rubble_instance::{
    BatchId, BatchWindow, BufferId, BufferRequest, BufferTarget, MaterialId, MeshId,
    RenderBackend, UploadTier, VEC4_BYTES,
};

struct GpuBuffer {
    label: String,
    buffer: wgpu::Buffer,
    size: u64,
    target: BufferTarget,
}

/// Owns the wgpu instance buffers and the batch table that draws read from.
///
/// Meshes and materials are opaque ids handed out by the host; this backend
/// only checks that they were registered.
pub struct WgpuBackend {
    ctx: HeadlessContext,
    tier: UploadTier,
    meshes: u32,
    materials: u32,
    buffers: Vec<Option<GpuBuffer>>,
    batches: Vec<Option<(BufferId, BatchWindow)>>,
    bytes_uploaded: u64,
}

impl WgpuBackend {
    pub fn new(ctx: HeadlessContext) -> Self {
        let tier = tier_for_limits(&ctx.limits);
        log::info!("[render] upload tier {tier:?}");
        Self {
            ctx,
            tier,
            meshes: 0,
            materials: 0,
            buffers: Vec::new(),
            batches: Vec::new(),
            bytes_uploaded: 0,
        }
    }

    /// Create a headless device and wrap it
    pub fn headless() -> Result<Self> {
        Ok(Self::new(HeadlessContext::new_blocking()?))
    }

    pub fn register_mesh(&mut self) -> MeshId {
        self.meshes += 1;
        MeshId(self.meshes - 1)
    }

    pub fn register_material(&mut self) -> MaterialId {
        self.materials += 1;
        MaterialId(self.materials - 1)
    }

    /// Bytes queued with `write_buffer` since creation
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    fn buffer(&self, buffer: BufferId) -> Option<&GpuBuffer> {
        self.buffers.get(buffer.0 as usize).and_then(|b| b.as_ref())
    }
}

fn buffer_usage(target: BufferTarget) -> wgpu::BufferUsages {
    let kind = match target {
        BufferTarget::Raw => wgpu::BufferUsages::STORAGE,
        BufferTarget::Constant => wgpu::BufferUsages::UNIFORM,
    };
    kind | wgpu::BufferUsages::COPY_DST
}

/// Check that `window` can be bound from a buffer of `buffer_size` bytes
fn validate_window(
    buffer_size: u64,
    target: BufferTarget,
    window: &BatchWindow,
    limits: &wgpu::Limits,
) -> Result<()> {
    if window.byte_offset + window.byte_size > buffer_size {
        return Err(RubbleError::Backend(format!(
            "batch window at {} overruns a {buffer_size}-byte buffer",
            window.byte_offset
        )));
    }
    let (alignment, max_binding) = match target {
        BufferTarget::Raw => (
            limits.min_storage_buffer_offset_alignment,
            limits.max_storage_buffer_binding_size,
        ),
        BufferTarget::Constant => (
            limits.min_uniform_buffer_offset_alignment,
            limits.max_uniform_buffer_binding_size,
        ),
    };
    if window.byte_offset % alignment as u64 != 0 {
        return Err(RubbleError::Backend(format!(
            "batch window offset {} is not aligned to {alignment}",
            window.byte_offset
        )));
    }
    if window.byte_size > max_binding as u64 {
        return Err(RubbleError::Backend(format!(
            "batch window of {} bytes exceeds binding limit {max_binding}",
            window.byte_size
        )));
    }
    Ok(())
}

impl RenderBackend for WgpuBackend {
    fn preferred_tier(&self) -> UploadTier {
        self.tier
    }

    fn contains_mesh(&self, mesh: MeshId) -> bool {
        mesh.0 < self.meshes
    }

    fn contains_material(&self, material: MaterialId) -> bool {
        material.0 < self.materials
    }

    fn allocate_instance_buffer(&mut self, request: &BufferRequest<'_>) -> Result<BufferId> {
        if request.size_bytes > self.ctx.limits.max_buffer_size {
            return Err(RubbleError::Backend(format!(
                "buffer '{}' of {} bytes exceeds device limit {}",
                request.label, request.size_bytes, self.ctx.limits.max_buffer_size
            )));
        }
        let size = request.size_bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(request.label),
            size,
            usage: buffer_usage(request.target),
            mapped_at_creation: false,
        });
        log::debug!(
            "[render] allocated '{}' ({size} bytes, {:?})",
            request.label,
            request.target
        );

        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(GpuBuffer {
            label: request.label.to_string(),
            buffer,
            size,
            target: request.target,
        }));
        Ok(id)
    }

    fn add_batch(&mut self, buffer: BufferId, window: &BatchWindow) -> Result<BatchId> {
        let Some(gpu) = self.buffer(buffer) else {
            return Err(RubbleError::InvalidHandle(format!("buffer {}", buffer.0)));
        };
        validate_window(gpu.size, gpu.target, window, &self.ctx.limits)?;
        let id = BatchId(self.batches.len() as u32);
        self.batches.push(Some((buffer, *window)));
        Ok(id)
    }

    fn remove_batch(&mut self, batch: BatchId) {
        if let Some(slot) = self.batches.get_mut(batch.0 as usize) {
            *slot = None;
        }
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset_vec4: usize,
        data: &[[f32; 4]],
    ) -> Result<()> {
        let Some(gpu) = self.buffer(buffer) else {
            return Err(RubbleError::InvalidHandle(format!("buffer {}", buffer.0)));
        };
        let limit = gpu.size as usize / VEC4_BYTES;
        let end = offset_vec4 + data.len();
        if end > limit {
            return Err(RubbleError::IndexOutOfRange { index: end, limit });
        }
        if data.is_empty() {
            return Ok(());
        }
        let offset = (offset_vec4 * VEC4_BYTES) as u64;
        self.ctx
            .queue
            .write_buffer(&gpu.buffer, offset, bytemuck::cast_slice(data));
        self.bytes_uploaded += (data.len() * VEC4_BYTES) as u64;
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if let Some(gpu) = slot.take() {
                log::debug!("[render] released '{}'", gpu.label);
                gpu.buffer.destroy();
            }
        }
    }
}
