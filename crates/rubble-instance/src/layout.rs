//! Window/slot addressing for the SoA instance buffer
//!
//! The buffer is split into `window_count` windows of `window_bytes` each.
//! A window holds up to `per_window` instances as three contiguous regions:
//! all transforms (3 vec4 each), then all inverse transforms (3 vec4 each),
//! then all colours (1 vec4 each). Offsets below are in vec4 units.

use crate::record::INSTANCE_RECORD_BYTES;
use rubble_core::{Result, RubbleError};

/// Size of one four-wide float record in bytes
pub const VEC4_BYTES: usize = 16;

/// What the platform allows a single bound instance range to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTier {
    /// Storage/raw buffers: one window holds every instance
    Unrestricted,
    /// Constant buffers: each bound window is at most `max_window_bytes`
    Windowed { max_window_bytes: usize },
}

/// GPU buffer kind implied by the tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Raw,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLayout {
    pub max_instances: usize,
    pub instance_bytes: usize,
    pub window_bytes: usize,
    pub per_window: usize,
    pub window_count: usize,
    pub target: BufferTarget,
}

impl WindowLayout {
    pub fn new(max_instances: usize, instance_bytes: usize, tier: UploadTier) -> Result<Self> {
        if max_instances == 0 {
            return Err(RubbleError::InvalidConfig(
                "instance capacity must be at least 1".into(),
            ));
        }
        if instance_bytes < INSTANCE_RECORD_BYTES || instance_bytes % VEC4_BYTES != 0 {
            return Err(RubbleError::InvalidConfig(format!(
                "instance size {instance_bytes} must be a multiple of {VEC4_BYTES} and at least {INSTANCE_RECORD_BYTES}"
            )));
        }

        match tier {
            UploadTier::Windowed { max_window_bytes } => {
                let window_bytes = max_window_bytes & !(VEC4_BYTES - 1);
                let per_window = window_bytes / instance_bytes;
                if per_window == 0 {
                    return Err(RubbleError::InvalidConfig(format!(
                        "window of {max_window_bytes} bytes cannot hold one {instance_bytes}-byte instance"
                    )));
                }
                let window_count = max_instances.div_ceil(per_window);
                checked_total(window_count, window_bytes)?;
                Ok(Self {
                    max_instances,
                    instance_bytes,
                    window_bytes,
                    per_window,
                    window_count,
                    target: BufferTarget::Constant,
                })
            }
            UploadTier::Unrestricted => {
                let window_bytes = checked_total(max_instances, instance_bytes)?;
                Ok(Self {
                    max_instances,
                    instance_bytes,
                    window_bytes,
                    per_window: max_instances,
                    window_count: 1,
                    target: BufferTarget::Raw,
                })
            }
        }
    }

    /// Cannot overflow for a layout built by [`WindowLayout::new`]
    pub fn total_bytes(&self) -> usize {
        self.window_count * self.window_bytes
    }

    pub fn window_vec4s(&self) -> usize {
        self.window_bytes / VEC4_BYTES
    }

    pub fn total_vec4s(&self) -> usize {
        self.total_bytes() / VEC4_BYTES
    }

    /// Flat index to `(window, slot)`; `None` past capacity
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.max_instances {
            return None;
        }
        Some((index / self.per_window, index % self.per_window))
    }

    /// `(window, slot)` back to a flat index; `None` if either is out of range
    pub fn flat_index(&self, window: usize, slot: usize) -> Option<usize> {
        if slot >= self.per_window {
            return None;
        }
        let index = window.checked_mul(self.per_window)?.checked_add(slot)?;
        (index < self.max_instances).then_some(index)
    }

    pub fn window_offset(&self, window: usize) -> usize {
        window * self.window_vec4s()
    }

    pub fn transform_offset(&self, window: usize, slot: usize) -> usize {
        self.window_offset(window) + slot * 3
    }

    pub fn inverse_offset(&self, window: usize, slot: usize) -> usize {
        self.window_offset(window) + self.per_window * 3 + slot * 3
    }

    pub fn color_offset(&self, window: usize, slot: usize) -> usize {
        self.window_offset(window) + self.per_window * 6 + slot
    }

    /// Byte offsets of the three regions relative to the window start
    pub fn region_byte_offsets(&self) -> [usize; 3] {
        [
            0,
            self.per_window * 3 * VEC4_BYTES,
            self.per_window * 6 * VEC4_BYTES,
        ]
    }
}

/// `count * bytes`, or a config error if the buffer size does not fit in `usize`
fn checked_total(count: usize, bytes: usize) -> Result<usize> {
    count
        .checked_mul(bytes)
        .and_then(|total| total.checked_next_multiple_of(VEC4_BYTES))
        .ok_or_else(|| {
            RubbleError::InvalidConfig(format!(
                "{count} x {bytes} bytes does not fit in an instance buffer"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn constant_buffer_tier_splits_into_windows() {
        let layout = WindowLayout::new(
            1000,
            112,
            UploadTier::Windowed {
                max_window_bytes: 65536,
            },
        )
        .unwrap();
        assert_eq!(layout.per_window, 585);
        assert_eq!(layout.window_count, 2);
        assert_eq!(layout.total_bytes(), 2 * 65536);
        assert_eq!(layout.locate(600), Some((1, 15)));
        assert_eq!(layout.target, BufferTarget::Constant);
    }

    #[test]
    fn unrestricted_tier_is_one_aligned_window() {
        let layout = WindowLayout::new(3000, 112, UploadTier::Unrestricted).unwrap();
        assert_eq!(layout.window_count, 1);
        assert_eq!(layout.per_window, 3000);
        assert_eq!(layout.window_bytes, 3000 * 112);
        assert_eq!(layout.window_bytes % VEC4_BYTES, 0);
        assert_eq!(layout.locate(2999), Some((0, 2999)));
        assert_eq!(layout.locate(3000), None);
    }

    #[test]
    fn regions_fit_inside_window() {
        let layout = WindowLayout::new(
            16 * 1024,
            112,
            UploadTier::Windowed {
                max_window_bytes: 16 * 1024,
            },
        )
        .unwrap();
        let last = layout.per_window - 1;
        assert!(layout.color_offset(0, last) < layout.window_vec4s());
        assert!(layout.inverse_offset(0, last) + 2 < layout.color_offset(0, 0));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(WindowLayout::new(0, 112, UploadTier::Unrestricted).is_err());
        assert!(WindowLayout::new(10, 100, UploadTier::Unrestricted).is_err());
        assert!(WindowLayout::new(10, 120, UploadTier::Unrestricted).is_err());
        assert!(WindowLayout::new(
            10,
            112,
            UploadTier::Windowed {
                max_window_bytes: 64
            }
        )
        .is_err());
    }

    #[test]
    fn oversized_buffers_are_config_errors() {
        let huge = usize::MAX / 64;
        for tier in [
            UploadTier::Unrestricted,
            UploadTier::Windowed {
                max_window_bytes: 65536,
            },
        ] {
            let err = WindowLayout::new(huge, 112, tier).unwrap_err();
            assert!(matches!(err, RubbleError::InvalidConfig(_)), "{tier:?}");
        }
    }

    proptest! {
        #[test]
        fn windowed_mapping_is_a_bijection(
            max in 1usize..5000,
            extra_vec4s in 0usize..4,
            cap in 112usize..70_000,
        ) {
            let size = 112 + extra_vec4s * 16;
            prop_assume!(cap >= size);
            let layout = WindowLayout::new(max, size, UploadTier::Windowed { max_window_bytes: cap }).unwrap();
            let mut seen = vec![false; layout.window_count * layout.per_window];
            for index in 0..max {
                let (w, s) = layout.locate(index).unwrap();
                prop_assert!(w < layout.window_count);
                prop_assert_eq!(layout.flat_index(w, s), Some(index));
                let key = w * layout.per_window + s;
                prop_assert!(!seen[key]);
                seen[key] = true;
            }
            prop_assert_eq!(layout.locate(max), None);
        }

        #[test]
        fn unrestricted_mapping_is_identity(max in 1usize..20_000, index in 0usize..20_000) {
            let layout = WindowLayout::new(max, 112, UploadTier::Unrestricted).unwrap();
            if index < max {
                prop_assert_eq!(layout.locate(index), Some((0, index)));
                prop_assert_eq!(layout.flat_index(0, index), Some(index));
            } else {
                prop_assert_eq!(layout.locate(index), None);
            }
        }
    }
}
