//! Window layout inspection

use anyhow::{Context, Result};
use rubble_instance::{BufferTarget, UploadTier, WindowLayout};
use serde::Serialize;

pub struct LayoutArgs {
    pub capacity: usize,
    pub instance_bytes: usize,
    pub window_bytes: usize,
    pub unrestricted: bool,
}

/// Window math for one instance buffer, printed as TOML
#[derive(Debug, Serialize)]
pub struct LayoutReport {
    pub max_instances: usize,
    pub instance_bytes: usize,
    pub target: String,
    pub window_bytes: usize,
    pub per_window: usize,
    pub window_count: usize,
    pub total_bytes: usize,
    pub transforms_offset: usize,
    pub inverses_offset: usize,
    pub colors_offset: usize,
}

impl LayoutReport {
    pub fn build(args: &LayoutArgs) -> Result<Self> {
        let tier = if args.unrestricted {
            UploadTier::Unrestricted
        } else {
            UploadTier::Windowed {
                max_window_bytes: args.window_bytes,
            }
        };
        let layout = WindowLayout::new(args.capacity, args.instance_bytes, tier)
            .context("Failed to compute window layout")?;
        let [transforms_offset, inverses_offset, colors_offset] = layout.region_byte_offsets();

        Ok(Self {
            max_instances: layout.max_instances,
            instance_bytes: layout.instance_bytes,
            target: match layout.target {
                BufferTarget::Raw => "raw".into(),
                BufferTarget::Constant => "constant".into(),
            },
            window_bytes: layout.window_bytes,
            per_window: layout.per_window,
            window_count: layout.window_count,
            total_bytes: layout.total_bytes(),
            transforms_offset,
            inverses_offset,
            colors_offset,
        })
    }
}

pub fn run(args: LayoutArgs) -> Result<()> {
    let report = LayoutReport::build(&args)?;
    let text = toml::to_string(&report).context("Failed to serialize layout report")?;
    print!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(capacity: usize) -> LayoutArgs {
        LayoutArgs {
            capacity,
            instance_bytes: 112,
            window_bytes: 65536,
            unrestricted: false,
        }
    }

    #[test]
    fn default_debris_buffer_needs_29_windows() {
        let report = LayoutReport::build(&args(16384)).unwrap();
        assert_eq!(report.per_window, 585);
        assert_eq!(report.window_count, 29);
        assert_eq!(report.total_bytes, 29 * 65536);
        assert_eq!(report.target, "constant");
        assert_eq!(
            [
                report.transforms_offset,
                report.inverses_offset,
                report.colors_offset
            ],
            [0, 585 * 48, 585 * 96]
        );
    }

    #[test]
    fn report_prints_as_toml() {
        let report = LayoutReport::build(&args(3000)).unwrap();
        let text = toml::to_string(&report).unwrap();
        assert!(text.contains("window_count = 6"));
        assert!(text.contains("target = \"constant\""));
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert!(LayoutReport::build(&args(0)).is_err());
    }
}
