//! System-memory mirror of one instanced draw and its GPU upload

use crate::backend::{
    BatchId, BatchWindow, BufferId, BufferRequest, MaterialId, MeshId, RenderBackend,
};
use crate::draw::{self, DrawCommands, DrawFilter};
use crate::layout::{UploadTier, WindowLayout};
use crate::record::InstanceRecord;
use rubble_core::{Result, RubbleError};

/// Everything needed to set up one instance buffer
#[derive(Debug, Clone)]
pub struct InstanceBufferDesc {
    pub label: String,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub max_instances: usize,
    pub instance_byte_size: usize,
    pub tier: UploadTier,
    pub filter: DrawFilter,
}

/// What a single [`InstanceBufferManager::upload`] pushed to the GPU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub instances: usize,
    pub bulk_transfers: usize,
    pub partial_transfers: usize,
    pub vec4s: usize,
}

/// Mirror buffer for one mesh/material pair.
///
/// Instance `i` lives at `(window = i / K, slot = i % K)`; see
/// [`WindowLayout`] for the region offsets inside a window.
pub struct InstanceBufferManager {
    label: String,
    layout: WindowLayout,
    mesh: MeshId,
    material: MaterialId,
    filter: DrawFilter,
    buffer: BufferId,
    batches: Vec<BatchId>,
    mirror: Vec<[f32; 4]>,
    uploaded: usize,
}

impl InstanceBufferManager {
    /// Validate the descriptor, allocate the GPU buffer and register one
    /// batch per window. On failure nothing stays registered with the backend.
    pub fn configure(backend: &mut dyn RenderBackend, desc: &InstanceBufferDesc) -> Result<Self> {
        if !backend.contains_mesh(desc.mesh) {
            return Err(RubbleError::InvalidHandle(format!(
                "{}: unknown mesh {}",
                desc.label, desc.mesh.0
            )));
        }
        if !backend.contains_material(desc.material) {
            return Err(RubbleError::InvalidHandle(format!(
                "{}: unknown material {}",
                desc.label, desc.material.0
            )));
        }
        let layout = WindowLayout::new(desc.max_instances, desc.instance_byte_size, desc.tier)?;

        let buffer = backend.allocate_instance_buffer(&BufferRequest {
            label: &desc.label,
            size_bytes: layout.total_bytes() as u64,
            target: layout.target,
        })?;

        let [transforms, inverses, colors] = layout.region_byte_offsets();
        let mut batches = Vec::with_capacity(layout.window_count);
        for w in 0..layout.window_count {
            let window = BatchWindow {
                byte_offset: (w * layout.window_bytes) as u64,
                byte_size: layout.window_bytes as u64,
                transforms_offset: transforms as u32,
                inverses_offset: inverses as u32,
                colors_offset: colors as u32,
            };
            match backend.add_batch(buffer, &window) {
                Ok(id) => batches.push(id),
                Err(e) => {
                    for id in batches {
                        backend.remove_batch(id);
                    }
                    backend.release_buffer(buffer);
                    return Err(e);
                }
            }
        }

        log::info!(
            "[instances] '{}': {} instance(s), {} per window x {} window(s), {} bytes ({:?})",
            desc.label,
            layout.max_instances,
            layout.per_window,
            layout.window_count,
            layout.total_bytes(),
            layout.target
        );

        Ok(Self {
            label: desc.label.clone(),
            layout,
            mesh: desc.mesh,
            material: desc.material,
            filter: desc.filter,
            buffer,
            batches,
            mirror: vec![[0.0; 4]; layout.total_vec4s()],
            uploaded: 0,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    pub fn max_instances(&self) -> usize {
        self.layout.max_instances
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn batches(&self) -> &[BatchId] {
        &self.batches
    }

    /// Instance count of the most recent upload
    pub fn uploaded_count(&self) -> usize {
        self.uploaded
    }

    pub fn write_instance(&mut self, index: usize, record: &InstanceRecord) -> Result<()> {
        let (w, s) = self.layout.locate(index).ok_or(RubbleError::IndexOutOfRange {
            index,
            limit: self.layout.max_instances,
        })?;
        let t = self.layout.transform_offset(w, s);
        let i = self.layout.inverse_offset(w, s);
        let c = self.layout.color_offset(w, s);
        self.mirror[t..t + 3].copy_from_slice(&record.transform);
        self.mirror[i..i + 3].copy_from_slice(&record.inverse);
        self.mirror[c] = record.color;
        Ok(())
    }

    /// Read an instance back out of the mirror
    pub fn record(&self, index: usize) -> Option<InstanceRecord> {
        let (w, s) = self.layout.locate(index)?;
        let t = self.layout.transform_offset(w, s);
        let i = self.layout.inverse_offset(w, s);
        let c = self.layout.color_offset(w, s);
        let mut rec = InstanceRecord::default();
        rec.transform.copy_from_slice(&self.mirror[t..t + 3]);
        rec.inverse.copy_from_slice(&self.mirror[i..i + 3]);
        rec.color = self.mirror[c];
        Some(rec)
    }

    /// Split instances `[0, count)` into disjoint writers of at most
    /// `chunk_size` instances. Chunks never straddle a window, are returned in
    /// index order and together cover the range exactly.
    pub fn chunks_mut(&mut self, count: usize, chunk_size: usize) -> Vec<InstanceChunk<'_>> {
        let count = count.min(self.layout.max_instances);
        let chunk_size = chunk_size.max(1);
        let per_window = self.layout.per_window;
        let window_vec4s = self.layout.window_vec4s();

        let mut out = Vec::with_capacity(count.div_ceil(chunk_size) + self.layout.window_count);
        for (w, window) in self.mirror.chunks_mut(window_vec4s).enumerate() {
            let first = w * per_window;
            if first >= count {
                break;
            }
            let n = (count - first).min(per_window);

            let (transforms, rest) = window.split_at_mut(per_window * 3);
            let (inverses, rest) = rest.split_at_mut(per_window * 3);
            let colors = &mut rest[..per_window];

            let pieces = transforms[..n * 3]
                .chunks_mut(chunk_size * 3)
                .zip(inverses[..n * 3].chunks_mut(chunk_size * 3))
                .zip(colors[..n].chunks_mut(chunk_size));
            for (c, ((transforms, inverses), colors)) in pieces.enumerate() {
                out.push(InstanceChunk {
                    base: first + c * chunk_size,
                    transforms,
                    inverses,
                    colors,
                });
            }
        }
        out
    }

    /// Pair `items[i]` with the writer for instance `i`, ready for
    /// [`rubble_core::WorkerPool::run_chunks`]. Items past the instance
    /// capacity come back as the remainder.
    pub fn zip_chunks_mut<'a, T>(
        &'a mut self,
        items: &'a mut [T],
        chunk_size: usize,
    ) -> (Vec<(&'a mut [T], InstanceChunk<'a>)>, &'a mut [T]) {
        let chunks = self.chunks_mut(items.len(), chunk_size);
        let mut jobs = Vec::with_capacity(chunks.len());
        let mut rest = items;
        for chunk in chunks {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(chunk.len());
            jobs.push((head, chunk));
            rest = tail;
        }
        (jobs, rest)
    }

    /// Push the first `active_count` instances to the GPU: one transfer for
    /// all complete windows, then three bounded transfers for a partial tail.
    pub fn upload(
        &mut self,
        backend: &mut dyn RenderBackend,
        active_count: usize,
    ) -> Result<UploadReport> {
        if active_count > self.layout.max_instances {
            return Err(RubbleError::IndexOutOfRange {
                index: active_count,
                limit: self.layout.max_instances,
            });
        }

        let mut report = UploadReport {
            instances: active_count,
            ..Default::default()
        };
        let per_window = self.layout.per_window;
        let full_windows = active_count / per_window;
        let tail = active_count % per_window;

        if full_windows > 0 {
            let len = full_windows * self.layout.window_vec4s();
            backend.write_buffer(self.buffer, 0, &self.mirror[..len])?;
            report.bulk_transfers += 1;
            report.vec4s += len;
        }

        if tail > 0 {
            let w = full_windows;
            for (offset, len) in [
                (self.layout.transform_offset(w, 0), tail * 3),
                (self.layout.inverse_offset(w, 0), tail * 3),
                (self.layout.color_offset(w, 0), tail),
            ] {
                backend.write_buffer(self.buffer, offset, &self.mirror[offset..offset + len])?;
                report.partial_transfers += 1;
                report.vec4s += len;
            }
        }

        self.uploaded = active_count;
        log::debug!(
            "[instances] '{}': uploaded {} instance(s) in {} transfer(s)",
            self.label,
            active_count,
            report.bulk_transfers + report.partial_transfers
        );
        Ok(report)
    }

    /// Draw commands for the first `active_count` instances
    pub fn synthesize_draw_commands(&self, active_count: usize) -> DrawCommands {
        draw::synthesize(
            &self.batches,
            self.layout.per_window,
            active_count.min(self.layout.max_instances),
            self.mesh,
            self.material,
            self.filter,
        )
    }

    /// Unregister the batches and free the GPU buffer
    pub fn shutdown(self, backend: &mut dyn RenderBackend) {
        for id in &self.batches {
            backend.remove_batch(*id);
        }
        backend.release_buffer(self.buffer);
        log::info!("[instances] '{}': released", self.label);
    }
}

/// Exclusive writer for a contiguous run of instances inside one window
pub struct InstanceChunk<'a> {
    base: usize,
    transforms: &'a mut [[f32; 4]],
    inverses: &'a mut [[f32; 4]],
    colors: &'a mut [[f32; 4]],
}

impl InstanceChunk<'_> {
    /// Flat index of the first instance
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Write instance `base + local`; false if `local` is outside the chunk
    pub fn write(&mut self, local: usize, record: &InstanceRecord) -> bool {
        let Some(color) = self.colors.get_mut(local) else {
            return false;
        };
        *color = record.color;
        self.transforms[local * 3..local * 3 + 3].copy_from_slice(&record.transform);
        self.inverses[local * 3..local * 3 + 3].copy_from_slice(&record.inverse);
        true
    }
}
