//! Per-instance GPU data

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3, Vec4};

/// Four-wide records per instance: 3 (transform) + 3 (inverse) + 1 (colour)
pub const VEC4S_PER_INSTANCE: usize = 7;

/// Minimum bytes one instance occupies in the SoA layout.
/// 112 bytes, 16-byte aligned (7 x vec4).
pub const INSTANCE_RECORD_BYTES: usize = VEC4S_PER_INSTANCE * 16;

/// One instance's data before it is scattered into the window's three
/// sub-regions. Matrices are 3x4 affine transforms packed column-major into
/// three vec4 rows, the layout shaders unpack as `float3x4`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub transform: [[f32; 4]; 3],
    pub inverse: [[f32; 4]; 3],
    pub color: [f32; 4],
}

impl InstanceRecord {
    /// Build a record from a linear basis (rotation and scale) plus translation.
    /// The inverse is the exact affine inverse; a degenerate basis falls back
    /// to identity rather than producing NaNs.
    pub fn from_affine(basis: Mat3, translation: Vec3, color: Vec4) -> Self {
        let inv = if basis.determinant().abs() > 1e-12 {
            basis.inverse()
        } else {
            Mat3::IDENTITY
        };
        Self {
            transform: pack_affine(basis, translation),
            inverse: pack_affine(inv, -(inv * translation)),
            color: color.to_array(),
        }
    }

    /// Translation stored in the object-to-world transform
    pub fn translation(&self) -> Vec3 {
        let r = self.transform[2];
        Vec3::new(r[1], r[2], r[3])
    }
}

fn pack_affine(m: Mat3, t: Vec3) -> [[f32; 4]; 3] {
    let (c0, c1, c2) = (m.x_axis, m.y_axis, m.z_axis);
    [
        [c0.x, c0.y, c0.z, c1.x],
        [c1.y, c1.z, c2.x, c2.y],
        [c2.z, t.x, t.y, t.z],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack(rows: &[[f32; 4]; 3]) -> (Mat3, Vec3) {
        let [a, b, c] = *rows;
        let m = Mat3::from_cols(
            Vec3::new(a[0], a[1], a[2]),
            Vec3::new(a[3], b[0], b[1]),
            Vec3::new(b[2], b[3], c[0]),
        );
        (m, Vec3::new(c[1], c[2], c[3]))
    }

    #[test]
    fn record_layout() {
        assert_eq!(std::mem::size_of::<InstanceRecord>(), INSTANCE_RECORD_BYTES);
        assert_eq!(std::mem::align_of::<InstanceRecord>(), 4);
    }

    #[test]
    fn scaled_column_packs_like_a_cube_row() {
        let rec = InstanceRecord::from_affine(
            Mat3::from_diagonal(Vec3::new(1.0, 3.0, 1.0)),
            Vec3::new(4.5, 1.5, 7.0),
            Vec4::ONE,
        );
        assert_eq!(rec.transform[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(rec.transform[1], [3.0, 0.0, 0.0, 0.0]);
        assert_eq!(rec.transform[2], [1.0, 4.5, 1.5, 7.0]);
        assert_eq!(rec.translation(), Vec3::new(4.5, 1.5, 7.0));
    }

    #[test]
    fn inverse_round_trips_a_point() {
        let basis = Mat3::from_rotation_y(0.7) * Mat3::from_diagonal(Vec3::splat(0.25));
        let t = Vec3::new(3.0, -2.0, 10.0);
        let rec = InstanceRecord::from_affine(basis, t, Vec4::ONE);
        let (m, mt) = unpack(&rec.transform);
        let (inv, it) = unpack(&rec.inverse);

        let p = Vec3::new(0.3, 0.9, -1.2);
        let world = m * p + mt;
        let back = inv * world + it;
        assert!((back - p).abs().max_element() < 1e-4);
    }

    #[test]
    fn degenerate_basis_keeps_finite_inverse() {
        let rec = InstanceRecord::from_affine(Mat3::ZERO, Vec3::ONE, Vec4::ONE);
        assert!(rec.inverse.iter().flatten().all(|v| v.is_finite()));
    }
}
