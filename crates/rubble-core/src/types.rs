//! Colour and easing helpers shared by terrain and debris

use glam::{Vec3, Vec4};

/// Linear RGBA colour, alpha in `w`
pub type Rgba = Vec4;

/// Convert HSV (all components in [0, 1]) to linear RGB.
///
/// Hue wraps, so values outside [0, 1) are folded back into range.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let s = s.clamp(0.0, 1.0);
    if s <= 0.0 {
        return Vec3::splat(v);
    }

    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

/// Hermite ease on [0, 1]; input is clamped first
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
