//! Frame orchestration: tracker -> per-person counters -> read model.

use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::Thresholds;
use crate::counter::{PoseFlags, RepCounter, Stage};
use crate::pose::Skeleton;
use crate::tracker::{PersonTracker, TrackId};

/// Exponential smoothing factor for the frame-rate estimate.
const FPS_ALPHA: f32 = 0.1;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PersonStats {
    pub jumps: u32,
    pub stage: Stage,
}

/// Read model handed to external consumers. Cheap to build, safe to ship
/// across the IPC boundary.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub people: BTreeMap<u32, PersonStats>,
    /// Smoothed frame rate, rounded to whole frames per second for display.
    pub fps: u32,
}

impl Snapshot {
    /// Lowest-id live person, for clients that surface a single counter.
    pub fn primary(&self) -> Option<(u32, PersonStats)> {
        self.people.iter().next().map(|(id, s)| (*id, *s))
    }
}

/// Owns the tracker and one RepCounter per live track. Single-writer:
/// exactly one `process_frame` runs at a time, and concurrent readers go
/// through the same exclusive lock the daemon wraps around this struct.
#[derive(Debug)]
pub struct SessionAggregator {
    tracker: PersonTracker,
    counters: BTreeMap<TrackId, RepCounter>,
    thresholds: Thresholds,
    fps: f32,
    last_frame: Option<Instant>,
}

impl SessionAggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        let tracker = PersonTracker::new(
            thresholds.max_match_distance,
            thresholds.max_missed_frames,
            thresholds.min_visibility,
        );
        Self {
            tracker,
            counters: BTreeMap::new(),
            thresholds,
            fps: 0.0,
            last_frame: None,
        }
    }

    /// Swap thresholds between frames. Live counters keep their stage and
    /// count; a changed smoothing window applies to tracks spawned later.
    pub fn apply_thresholds(&mut self, thresholds: Thresholds) {
        self.tracker.configure(
            thresholds.max_match_distance,
            thresholds.max_missed_frames,
            thresholds.min_visibility,
        );
        self.thresholds = thresholds;
    }

    pub fn process_frame(&mut self, detections: &[Skeleton]) -> Snapshot {
        self.tick_fps();

        let assoc = self.tracker.associate(detections);
        for id in &assoc.retired {
            self.counters.remove(id);
            debug!("track {id} retired");
        }
        for id in &assoc.spawned {
            debug!("track {id} spawned");
        }
        for (id, di) in &assoc.matches {
            let counter = self
                .counters
                .entry(*id)
                .or_insert_with(|| RepCounter::new(self.thresholds.smoothing_window));
            let flags = PoseFlags::from_skeleton(&detections[*di], &self.thresholds);
            counter.update(flags);
        }

        self.snapshot()
    }

    /// Current read model without advancing any state.
    pub fn snapshot(&self) -> Snapshot {
        let people = self
            .counters
            .iter()
            .map(|(id, c)| {
                (
                    id.0,
                    PersonStats {
                        jumps: c.count(),
                        stage: c.stage(),
                    },
                )
            })
            .collect();
        Snapshot {
            people,
            fps: self.fps.round() as u32,
        }
    }

    /// Clear every identity and counter. A person still in front of the
    /// camera re-enters as a fresh id at zero.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.counters.clear();
        self.fps = 0.0;
        self.last_frame = None;
    }

    fn tick_fps(&mut self) {
        let now = Instant::now();
        if let Some(prev) = self.last_frame {
            let dt = now.duration_since(prev).as_secs_f32();
            if dt > 0.0 {
                let inst = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    inst
                } else {
                    (1.0 - FPS_ALPHA) * self.fps + FPS_ALPHA * inst
                };
            }
        }
        self.last_frame = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Landmark, joints};

    fn lm(id: u8, x: f32, y: f32) -> Landmark {
        Landmark {
            id,
            x,
            y,
            visibility: 1.0,
        }
    }

    /// Full jumping-jack "open" pose centered at (cx, cy).
    fn open_at(cx: f32, cy: f32) -> Skeleton {
        Skeleton::new(vec![
            lm(joints::LEFT_SHOULDER, cx - 0.05, cy - 0.2),
            lm(joints::RIGHT_SHOULDER, cx + 0.05, cy - 0.2),
            lm(joints::LEFT_WRIST, cx - 0.05, cy - 0.4),
            lm(joints::RIGHT_WRIST, cx + 0.05, cy - 0.4),
            lm(joints::LEFT_HIP, cx - 0.05, cy),
            lm(joints::RIGHT_HIP, cx + 0.05, cy),
            lm(joints::LEFT_ANKLE, cx - 0.15, cy + 0.2),
            lm(joints::RIGHT_ANKLE, cx + 0.15, cy + 0.2),
        ])
    }

    /// Arms down, feet together, same centroid as `open_at`.
    fn closed_at(cx: f32, cy: f32) -> Skeleton {
        Skeleton::new(vec![
            lm(joints::LEFT_SHOULDER, cx - 0.05, cy - 0.2),
            lm(joints::RIGHT_SHOULDER, cx + 0.05, cy - 0.2),
            lm(joints::LEFT_WRIST, cx - 0.05, cy + 0.05),
            lm(joints::RIGHT_WRIST, cx + 0.05, cy + 0.05),
            lm(joints::LEFT_HIP, cx - 0.05, cy),
            lm(joints::RIGHT_HIP, cx + 0.05, cy),
            lm(joints::LEFT_ANKLE, cx - 0.05, cy + 0.3),
            lm(joints::RIGHT_ANKLE, cx + 0.05, cy + 0.3),
        ])
    }

    fn aggregator() -> SessionAggregator {
        SessionAggregator::new(Thresholds {
            max_missed_frames: 2,
            ..Thresholds::default()
        })
    }

    #[test]
    fn test_single_person_full_rep() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        agg.process_frame(&[open_at(0.5, 0.5)]);
        let snap = agg.process_frame(&[closed_at(0.5, 0.5)]);
        let (_, primary) = snap.primary().unwrap();
        assert_eq!(primary.jumps, 1);
        assert_eq!(primary.stage, Stage::Down);
    }

    #[test]
    fn test_two_people_count_independently() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.25, 0.5), closed_at(0.75, 0.5)]);
        // only the left person completes a rep
        agg.process_frame(&[open_at(0.25, 0.5), closed_at(0.75, 0.5)]);
        let snap = agg.process_frame(&[closed_at(0.25, 0.5), closed_at(0.75, 0.5)]);
        assert_eq!(snap.people.len(), 2);
        assert_eq!(snap.people[&0].jumps, 1);
        assert_eq!(snap.people[&1].jumps, 0);
    }

    #[test]
    fn test_missing_wrists_freeze_person_state() {
        let mut agg = aggregator();
        agg.process_frame(&[open_at(0.5, 0.5)]);
        let mut no_wrists = closed_at(0.5, 0.5);
        no_wrists
            .landmarks
            .retain(|l| l.id != joints::LEFT_WRIST && l.id != joints::RIGHT_WRIST);
        let snap = agg.process_frame(&[no_wrists]);
        // stage still Up, nothing counted
        assert_eq!(snap.people[&0].stage, Stage::Up);
        assert_eq!(snap.people[&0].jumps, 0);
    }

    #[test]
    fn test_retired_track_drops_its_counter() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        agg.process_frame(&[open_at(0.5, 0.5)]);
        agg.process_frame(&[closed_at(0.5, 0.5)]); // jumps = 1
        for _ in 0..3 {
            agg.process_frame(&[]);
        }
        assert!(agg.snapshot().people.is_empty());
        // same spot, new person: fresh id, zero count
        let snap = agg.process_frame(&[closed_at(0.5, 0.5)]);
        assert_eq!(snap.people.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(snap.people[&1].jumps, 0);
        assert_eq!(snap.people[&1].stage, Stage::Down);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        agg.process_frame(&[open_at(0.5, 0.5)]);
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        agg.reset();
        let snap = agg.snapshot();
        assert!(snap.people.is_empty());
        assert_eq!(snap.fps, 0);
    }

    #[test]
    fn test_snapshot_does_not_advance_state() {
        let mut agg = aggregator();
        agg.process_frame(&[open_at(0.5, 0.5)]);
        let a = agg.snapshot();
        let b = agg.snapshot();
        assert_eq!(a.people[&0].jumps, b.people[&0].jumps);
        assert_eq!(a.people[&0].stage, b.people[&0].stage);
    }

    #[test]
    fn test_snapshot_serializes_for_the_read_api() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        let v = serde_json::to_value(agg.snapshot()).unwrap();
        assert_eq!(v["people"]["0"]["jumps"], 0);
        assert_eq!(v["people"]["0"]["stage"], "down");
        assert!(v["fps"].is_u64());
    }

    #[test]
    fn test_fps_reads_as_whole_frames_per_second() {
        let mut agg = aggregator();
        agg.process_frame(&[closed_at(0.5, 0.5)]);
        for _ in 0..2 {
            std::thread::sleep(std::time::Duration::from_millis(20));
            agg.process_frame(&[closed_at(0.5, 0.5)]);
        }
        let v = serde_json::to_value(agg.snapshot()).unwrap();
        // the wire value is a whole number, never the raw smoothed float
        let fps = v["fps"].as_u64().expect("fps must serialize as an integer");
        assert!(fps > 0);
    }
}
