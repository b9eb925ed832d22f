//! Skeleton keypoints as delivered by the external pose model.

use serde::Deserialize;

/// Joint indices in the pose model's landmark convention (33 points).
/// Only the joints the counting logic reads are named here.
pub mod joints {
    #![allow(dead_code)]

    pub const LEFT_SHOULDER: u8 = 11;
    pub const RIGHT_SHOULDER: u8 = 12;
    pub const LEFT_ELBOW: u8 = 13;
    pub const RIGHT_ELBOW: u8 = 14;
    pub const LEFT_WRIST: u8 = 15;
    pub const RIGHT_WRIST: u8 = 16;
    pub const LEFT_HIP: u8 = 23;
    pub const RIGHT_HIP: u8 = 24;
    pub const LEFT_KNEE: u8 = 25;
    pub const RIGHT_KNEE: u8 = 26;
    pub const LEFT_ANKLE: u8 = 27;
    pub const RIGHT_ANKLE: u8 = 28;
}

/// One detected keypoint. Coordinates are normalized to [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Landmark {
    pub id: u8,
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

/// One person's keypoints for one frame. Owned by the frame, never retained.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Skeleton {
    pub landmarks: Vec<Landmark>,
}

impl Skeleton {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Look a landmark up by its joint id (not by position in the vec —
    /// producers may send sparse lists).
    pub fn get(&self, id: u8) -> Option<&Landmark> {
        self.landmarks.iter().find(|lm| lm.id == id)
    }

    /// Coordinates of a joint, or None when it is absent or below the
    /// visibility floor.
    pub fn joint(&self, id: u8, min_visibility: f32) -> Option<(f32, f32)> {
        let lm = self.get(id)?;
        if lm.visibility < min_visibility {
            return None;
        }
        Some((lm.x, lm.y))
    }

    /// Mean of the visible hip/shoulder landmarks; the anchor used for
    /// frame-to-frame association. None when none of the four is usable.
    pub fn centroid(&self, min_visibility: f32) -> Option<(f32, f32)> {
        const ANCHORS: [u8; 4] = [
            joints::LEFT_SHOULDER,
            joints::RIGHT_SHOULDER,
            joints::LEFT_HIP,
            joints::RIGHT_HIP,
        ];
        let mut sum = (0.0f32, 0.0f32);
        let mut n = 0u32;
        for id in ANCHORS {
            if let Some((x, y)) = self.joint(id, min_visibility) {
                sum.0 += x;
                sum.1 += y;
                n += 1;
            }
        }
        if n == 0 {
            return None;
        }
        Some((sum.0 / n as f32, sum.1 / n as f32))
    }
}
