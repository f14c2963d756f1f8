//! Draw batch synthesis
//!
//! No culling happens here: the visible set is always the contiguous prefix
//! `0..active_count`, so every batch shares one identity visibility list.

use crate::backend::{BatchId, MaterialId, MeshId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionVectorMode {
    #[default]
    Camera,
    Object,
    ForceNoMotion,
}

/// Render-state filter shared by every batch of one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawFilter {
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub layer: u32,
    pub rendering_layer_mask: u32,
    pub motion_mode: MotionVectorMode,
}

impl Default for DrawFilter {
    fn default() -> Self {
        Self {
            cast_shadows: false,
            receive_shadows: true,
            layer: 0,
            rendering_layer_mask: 1,
            motion_mode: MotionVectorMode::Camera,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub batch: BatchId,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub submesh: u32,
    /// Offset into [`DrawCommands::visible_instances`]; always 0
    pub visible_offset: u32,
    pub visible_count: u32,
    pub split_visibility_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    pub commands_begin: u32,
    pub commands_count: u32,
    pub filter: DrawFilter,
}

/// Everything the host renderer needs to draw one manager's instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCommands {
    pub commands: Vec<DrawCommand>,
    pub ranges: Vec<DrawRange>,
    pub visible_instances: Vec<u32>,
}

impl DrawCommands {
    /// Total instances drawn across all batches
    pub fn instance_count(&self) -> usize {
        self.commands.iter().map(|c| c.visible_count as usize).sum()
    }
}

pub(crate) fn synthesize(
    batches: &[BatchId],
    per_window: usize,
    active_count: usize,
    mesh: MeshId,
    material: MaterialId,
    filter: DrawFilter,
) -> DrawCommands {
    let command_count = active_count.div_ceil(per_window).min(batches.len());
    let visible_instances = (0..active_count.min(per_window) as u32).collect();

    let mut left = active_count;
    let commands = batches[..command_count]
        .iter()
        .map(|&batch| {
            let in_batch = left.min(per_window);
            left -= in_batch;
            DrawCommand {
                batch,
                mesh,
                material,
                submesh: 0,
                visible_offset: 0,
                visible_count: in_batch as u32,
                split_visibility_mask: 0xff,
            }
        })
        .collect();

    DrawCommands {
        commands,
        ranges: vec![DrawRange {
            commands_begin: 0,
            commands_count: command_count as u32,
            filter,
        }],
        visible_instances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batches(n: u32) -> Vec<BatchId> {
        (0..n).map(BatchId).collect()
    }

    #[test]
    fn one_command_per_populated_window() {
        let draws = synthesize(&batches(3), 100, 250, MeshId(0), MaterialId(0), DrawFilter::default());
        assert_eq!(draws.commands.len(), 3);
        let counts: Vec<u32> = draws.commands.iter().map(|c| c.visible_count).collect();
        assert_eq!(counts, vec![100, 100, 50]);
        assert_eq!(draws.visible_instances.len(), 100);
        assert_eq!(draws.visible_instances[99], 99);
        assert_eq!(draws.instance_count(), 250);
        assert_eq!(draws.ranges.len(), 1);
        assert_eq!(draws.ranges[0].commands_count, 3);
    }

    #[test]
    fn small_counts_shrink_the_visibility_list() {
        let draws = synthesize(&batches(2), 585, 7, MeshId(1), MaterialId(2), DrawFilter::default());
        assert_eq!(draws.commands.len(), 1);
        assert_eq!(draws.visible_instances, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(draws.commands[0].mesh, MeshId(1));
    }

    #[test]
    fn nothing_active_still_yields_the_shared_range() {
        let filter = DrawFilter {
            cast_shadows: true,
            ..Default::default()
        };
        let draws = synthesize(&batches(2), 585, 0, MeshId(0), MaterialId(0), filter);
        assert!(draws.commands.is_empty());
        assert!(draws.visible_instances.is_empty());
        assert_eq!(draws.ranges[0].commands_count, 0);
        assert!(draws.ranges[0].filter.cast_shadows);
    }
}
