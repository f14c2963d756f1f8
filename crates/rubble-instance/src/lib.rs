//! Rubble Instance - GPU instance buffer management
//!
//! Owns a system-memory mirror of an instanced draw's per-instance data and
//! keeps it in sync with a GPU buffer:
//! - `WindowLayout` - window/slot addressing under an upload-size ceiling
//! - `InstanceRecord` - packed object-to-world, world-to-object and colour
//! - `InstanceBufferManager` - writes, chunked parallel writers, minimal uploads
//! - `DrawCommands` - one batch per populated window, no culling
//! - `RenderBackend` - the seam to the host renderer

pub mod backend;
pub mod draw;
pub mod layout;
mod manager;
pub mod record;

pub use backend::{
    BatchId, BatchWindow, BufferId, BufferRequest, MaterialId, MeshId, RecordingBackend,
    RenderBackend, Transfer, DEFAULT_WINDOW_BYTES, PER_INSTANCE_BIT,
};
pub use draw::{DrawCommand, DrawCommands, DrawFilter, DrawRange, MotionVectorMode};
pub use layout::{BufferTarget, UploadTier, WindowLayout, VEC4_BYTES};
pub use manager::{InstanceBufferDesc, InstanceBufferManager, InstanceChunk, UploadReport};
pub use record::{InstanceRecord, INSTANCE_RECORD_BYTES, VEC4S_PER_INSTANCE};
