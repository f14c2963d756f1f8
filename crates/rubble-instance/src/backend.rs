//! The seam between instance managers and the host renderer

use crate::layout::{BufferTarget, UploadTier, VEC4_BYTES};
use rubble_core::{Result, RubbleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub u32);

/// Marks a metadata entry as varying per instance
pub const PER_INSTANCE_BIT: u32 = 0x8000_0000;

/// Constant-buffer window size assumed when a backend does not say otherwise
pub const DEFAULT_WINDOW_BYTES: usize = 65536;

/// Instance buffer allocation request
#[derive(Debug, Clone, Copy)]
pub struct BufferRequest<'a> {
    pub label: &'a str,
    pub size_bytes: u64,
    pub target: BufferTarget,
}

/// One window registered as a batch: where it starts in the buffer, how much
/// of it is bound, and where each per-instance property begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub byte_offset: u64,
    pub byte_size: u64,
    /// Region offsets in bytes from `byte_offset`
    pub transforms_offset: u32,
    pub inverses_offset: u32,
    pub colors_offset: u32,
}

impl BatchWindow {
    /// Property offsets with the per-instance bit set, in the order
    /// object-to-world, world-to-object, colour.
    pub fn metadata(&self) -> [u32; 3] {
        [
            self.transforms_offset | PER_INSTANCE_BIT,
            self.inverses_offset | PER_INSTANCE_BIT,
            self.colors_offset | PER_INSTANCE_BIT,
        ]
    }
}

/// Host renderer operations needed by [`crate::InstanceBufferManager`].
///
/// Implementations own the GPU objects; managers only hold the ids.
pub trait RenderBackend {
    /// Upload tier this backend's device supports
    fn preferred_tier(&self) -> UploadTier {
        UploadTier::Windowed {
            max_window_bytes: DEFAULT_WINDOW_BYTES,
        }
    }

    fn contains_mesh(&self, mesh: MeshId) -> bool;

    fn contains_material(&self, material: MaterialId) -> bool;

    fn allocate_instance_buffer(&mut self, request: &BufferRequest<'_>) -> Result<BufferId>;

    fn add_batch(&mut self, buffer: BufferId, window: &BatchWindow) -> Result<BatchId>;

    fn remove_batch(&mut self, batch: BatchId);

    /// Copy `data` into the buffer starting at `offset_vec4` (16-byte units)
    fn write_buffer(&mut self, buffer: BufferId, offset_vec4: usize, data: &[[f32; 4]])
        -> Result<()>;

    fn release_buffer(&mut self, buffer: BufferId);
}

/// A single buffer write recorded by [`RecordingBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub buffer: BufferId,
    pub offset_vec4: usize,
    pub len_vec4: usize,
}

struct RecordedBuffer {
    label: String,
    target: BufferTarget,
    contents: Vec<[f32; 4]>,
}

/// In-memory backend: keeps a copy of every buffer and a log of transfers.
/// Used for headless runs and tests.
#[derive(Default)]
pub struct RecordingBackend {
    meshes: Vec<MeshId>,
    materials: Vec<MaterialId>,
    buffers: Vec<Option<RecordedBuffer>>,
    batches: Vec<Option<(BufferId, BatchWindow)>>,
    transfers: Vec<Transfer>,
    max_buffer_bytes: Option<u64>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse allocations larger than `bytes`
    pub fn with_max_buffer_bytes(mut self, bytes: u64) -> Self {
        self.max_buffer_bytes = Some(bytes);
        self
    }

    pub fn register_mesh(&mut self) -> MeshId {
        let id = MeshId(self.meshes.len() as u32);
        self.meshes.push(id);
        id
    }

    pub fn register_material(&mut self) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(id);
        id
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn take_transfers(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.transfers)
    }

    /// Current contents of a live buffer
    pub fn contents(&self, buffer: BufferId) -> Option<&[[f32; 4]]> {
        self.buffer(buffer).map(|b| b.contents.as_slice())
    }

    pub fn buffer_target(&self, buffer: BufferId) -> Option<BufferTarget> {
        self.buffer(buffer).map(|b| b.target)
    }

    pub fn live_batches(&self) -> usize {
        self.batches.iter().flatten().count()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub fn batch(&self, batch: BatchId) -> Option<&BatchWindow> {
        self.batches
            .get(batch.0 as usize)
            .and_then(|b| b.as_ref())
            .map(|(_, w)| w)
    }

    fn buffer(&self, buffer: BufferId) -> Option<&RecordedBuffer> {
        self.buffers.get(buffer.0 as usize).and_then(|b| b.as_ref())
    }
}

impl RenderBackend for RecordingBackend {
    fn contains_mesh(&self, mesh: MeshId) -> bool {
        self.meshes.contains(&mesh)
    }

    fn contains_material(&self, material: MaterialId) -> bool {
        self.materials.contains(&material)
    }

    fn allocate_instance_buffer(&mut self, request: &BufferRequest<'_>) -> Result<BufferId> {
        if let Some(max) = self.max_buffer_bytes {
            if request.size_bytes > max {
                return Err(RubbleError::Backend(format!(
                    "buffer '{}' of {} bytes exceeds device limit {max}",
                    request.label, request.size_bytes
                )));
            }
        }
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(RecordedBuffer {
            label: request.label.to_string(),
            target: request.target,
            contents: vec![[0.0; 4]; request.size_bytes as usize / VEC4_BYTES],
        }));
        Ok(id)
    }

    fn add_batch(&mut self, buffer: BufferId, window: &BatchWindow) -> Result<BatchId> {
        let Some(recorded) = self.buffer(buffer) else {
            return Err(RubbleError::InvalidHandle(format!("buffer {}", buffer.0)));
        };
        let size = (recorded.contents.len() * VEC4_BYTES) as u64;
        if window.byte_offset + window.byte_size > size {
            return Err(RubbleError::Backend(format!(
                "batch window at {} overruns buffer '{}'",
                window.byte_offset, recorded.label
            )));
        }
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
        let Some(Some(recorded)) = self.buffers.get_mut(buffer.0 as usize) else {
            return Err(RubbleError::InvalidHandle(format!("buffer {}", buffer.0)));
        };
        let end = offset_vec4 + data.len();
        let Some(dst) = recorded.contents.get_mut(offset_vec4..end) else {
            return Err(RubbleError::IndexOutOfRange {
                index: end,
                limit: recorded.contents.len(),
            });
        };
        dst.copy_from_slice(data);
        self.transfers.push(Transfer {
            buffer,
            offset_vec4,
            len_vec4: data.len(),
        });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            *slot = None;
        }
    }
}
