//! Jumping-jack qualifying pose flags and the per-person rep state machine.

use serde::Serialize;
use std::collections::VecDeque;

use crate::config::Thresholds;
use crate::geometry::angle;
use crate::pose::{Skeleton, joints};

/// Exercise phase. A rep is one full Down -> Up -> Down cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Down,
    Up,
}

/// Frame-level qualifying conditions derived from joint angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseFlags {
    pub arms_raised: bool,
    pub legs_spread: bool,
}

fn in_band(a: f32, low: f32, high: f32) -> bool {
    a > low && a < high
}

impl PoseFlags {
    /// Derive the flags for one skeleton, or None when any required joint
    /// is absent or below the visibility floor (the frame is then a no-op
    /// for the counter).
    pub fn from_skeleton(sk: &Skeleton, th: &Thresholds) -> Option<Self> {
        let mv = th.min_visibility;
        let l_shoulder = sk.joint(joints::LEFT_SHOULDER, mv)?;
        let r_shoulder = sk.joint(joints::RIGHT_SHOULDER, mv)?;
        let l_wrist = sk.joint(joints::LEFT_WRIST, mv)?;
        let r_wrist = sk.joint(joints::RIGHT_WRIST, mv)?;
        let l_hip = sk.joint(joints::LEFT_HIP, mv)?;
        let r_hip = sk.joint(joints::RIGHT_HIP, mv)?;
        let l_ankle = sk.joint(joints::LEFT_ANKLE, mv)?;
        let r_ankle = sk.joint(joints::RIGHT_ANKLE, mv)?;

        // Arm abduction: hip-shoulder-wrist straightens toward 180 with
        // the arm overhead.
        let l_arm = angle(l_hip, l_shoulder, l_wrist);
        let r_arm = angle(r_hip, r_shoulder, r_wrist);
        let arms_raised = in_band(l_arm, th.arm_up_low, th.arm_up_high)
            && in_band(r_arm, th.arm_up_low, th.arm_up_high);

        // Leg abduction via the cross-body diagonal: opposite shoulder
        // through the hip to the ankle lines up as the leg swings out.
        let l_leg = angle(r_shoulder, l_hip, l_ankle);
        let r_leg = angle(l_shoulder, r_hip, r_ankle);
        let legs_spread = in_band(l_leg, th.leg_apart_low, th.leg_apart_high)
            && in_band(r_leg, th.leg_apart_low, th.leg_apart_high);

        Some(Self {
            arms_raised,
            legs_spread,
        })
    }
}

/// DOWN/UP hysteresis machine for one tracked person. Counts exactly one
/// rep on each Up -> Down transition; partial poses hold the current stage.
#[derive(Debug)]
pub struct RepCounter {
    stage: Stage,
    count: u32,
    window: VecDeque<PoseFlags>,
    window_len: usize,
}

impl RepCounter {
    pub fn new(smoothing_window: u32) -> Self {
        Self {
            stage: Stage::Down,
            count: 0,
            window: VecDeque::new(),
            window_len: smoothing_window as usize,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Feed one frame. `None` (missing landmarks) leaves stage, count and
    /// the smoothing window untouched. Returns true when this frame
    /// completed a rep.
    pub fn update(&mut self, flags: Option<PoseFlags>) -> bool {
        let Some(raw) = flags else {
            return false;
        };
        let flags = self.smooth(raw);

        match self.stage {
            Stage::Down if flags.arms_raised && flags.legs_spread => {
                self.stage = Stage::Up;
                false
            }
            Stage::Up if !flags.arms_raised && !flags.legs_spread => {
                self.stage = Stage::Down;
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    /// Majority vote per flag over the last `window_len` frames. With a
    /// window of 0 or 1 the raw flags pass through.
    fn smooth(&mut self, raw: PoseFlags) -> PoseFlags {
        if self.window_len <= 1 {
            return raw;
        }
        if self.window.len() == self.window_len {
            self.window.pop_front();
        }
        self.window.push_back(raw);

        let n = self.window.len();
        let arms = self.window.iter().filter(|f| f.arms_raised).count();
        let legs = self.window.iter().filter(|f| f.legs_spread).count();
        PoseFlags {
            arms_raised: arms * 2 > n,
            legs_spread: legs * 2 > n,
        }
    }
}
