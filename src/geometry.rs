//! Pure 2-D angle and coordinate helpers.

use crate::pose::Landmark;

/// Directed angle at vertex `p2` between the rays p2->p1 and p2->p3,
/// in degrees normalized to [0, 360).
///
/// Coordinates are treated as image-space (y grows downward). Coincident
/// points make the underlying atan2 direction undefined; the result is
/// then arbitrary but finite, never a panic.
pub fn angle(p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) -> f32 {
    let a = (p3.1 - p2.1).atan2(p3.0 - p2.0) - (p1.1 - p2.1).atan2(p1.0 - p2.0);
    let deg = a.to_degrees();
    if deg < 0.0 { deg + 360.0 } else { deg }
}

/// Convert a normalized [0,1] landmark to integer pixel coordinates.
/// Rendering-side helper; the counting engine itself stays in normalized
/// space.
#[allow(dead_code)]
pub fn pixel_coords(lm: &Landmark, frame_width: u32, frame_height: u32) -> (i32, i32) {
    let px = (lm.x * frame_width as f32) as i32;
    let py = (lm.y * frame_height as f32) as i32;
    (px, py)
}

/// Euclidean distance between two points.
pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt()
}
