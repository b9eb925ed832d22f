//! Frame-to-frame person association and track lifecycle.

use crate::geometry::distance;
use crate::pose::Skeleton;

/// Stable handle for one physical person. Ids are allocated monotonically
/// and never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: TrackId,
    centroid: (f32, f32),
    missed: u32,
}

/// Outcome of associating one frame's detections with the live tracks.
/// `matches` indexes into the detections slice passed to `associate`.
#[derive(Debug, Default)]
pub struct Association {
    pub matches: Vec<(TrackId, usize)>,
    pub spawned: Vec<TrackId>,
    pub retired: Vec<TrackId>,
}

/// Greedy nearest-centroid tracker. Candidate (track, detection) pairs
/// inside the distance gate are claimed globally closest first, so a far
/// track cannot steal a detection that a nearer track wants. Ties resolve
/// by (distance, track id, detection index) — deterministic, older track
/// and earlier detection win.
#[derive(Debug)]
pub struct PersonTracker {
    tracks: Vec<Track>,
    next_id: u32,
    max_match_distance: f32,
    max_missed_frames: u32,
    min_visibility: f32,
}

impl PersonTracker {
    pub fn new(max_match_distance: f32, max_missed_frames: u32, min_visibility: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            max_match_distance,
            max_missed_frames,
            min_visibility,
        }
    }

    pub fn configure(&mut self, max_match_distance: f32, max_missed_frames: u32, min_visibility: f32) {
        self.max_match_distance = max_match_distance;
        self.max_missed_frames = max_missed_frames;
        self.min_visibility = min_visibility;
    }

    /// Drop every track. The id counter keeps running so a session never
    /// hands the same id to two different people.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    pub fn associate(&mut self, detections: &[Skeleton]) -> Association {
        let mut out = Association::default();

        // Detections without a usable centroid are invisible this frame.
        let centroids: Vec<Option<(f32, f32)>> = detections
            .iter()
            .map(|sk| sk.centroid(self.min_visibility))
            .collect();

        // All gated candidate pairs, globally closest first.
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, c) in centroids.iter().enumerate() {
                if let Some(c) = c {
                    let d = distance(track.centroid, *c);
                    if d <= self.max_match_distance {
                        candidates.push((d, ti, di));
                    }
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| self.tracks[a.1].id.cmp(&self.tracks[b.1].id))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut track_claimed = vec![false; self.tracks.len()];
        let mut det_claimed = vec![false; detections.len()];
        for (_, ti, di) in candidates {
            if track_claimed[ti] || det_claimed[di] {
                continue;
            }
            track_claimed[ti] = true;
            det_claimed[di] = true;
            let track = &mut self.tracks[ti];
            track.centroid = centroids[di].unwrap_or(track.centroid);
            track.missed = 0;
            out.matches.push((track.id, di));
        }

        // Unclaimed tracks age; beyond the limit they are retired.
        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if !track_claimed[ti] {
                track.missed += 1;
                if track.missed > self.max_missed_frames {
                    out.retired.push(track.id);
                }
            }
        }
        if !out.retired.is_empty() {
            let retired = &out.retired;
            self.tracks.retain(|t| !retired.contains(&t.id));
        }

        // Unclaimed detections become new people.
        for (di, c) in centroids.iter().enumerate() {
            if det_claimed[di] {
                continue;
            }
            let Some(c) = c else { continue };
            let id = TrackId(self.next_id);
            self.next_id += 1;
            self.tracks.push(Track {
                id,
                centroid: *c,
                missed: 0,
            });
            out.spawned.push(id);
            out.matches.push((id, di));
        }

        out.matches.sort_by_key(|(id, _)| *id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Landmark, joints};

    fn skeleton_at(cx: f32, cy: f32) -> Skeleton {
        let lm = |id, x, y| Landmark {
            id,
            x,
            y,
            visibility: 1.0,
        };
        Skeleton::new(vec![
            lm(joints::LEFT_SHOULDER, cx - 0.05, cy - 0.1),
            lm(joints::RIGHT_SHOULDER, cx + 0.05, cy - 0.1),
            lm(joints::LEFT_HIP, cx - 0.05, cy + 0.1),
            lm(joints::RIGHT_HIP, cx + 0.05, cy + 0.1),
        ])
    }

    fn tracker() -> PersonTracker {
        PersonTracker::new(0.25, 2, 0.5)
    }

    #[test]
    fn test_first_frame_spawns_tracks() {
        let mut t = tracker();
        let frame = vec![skeleton_at(0.2, 0.2), skeleton_at(0.8, 0.8)];
        let assoc = t.associate(&frame);
        assert_eq!(assoc.spawned, vec![TrackId(0), TrackId(1)]);
        assert_eq!(assoc.matches, vec![(TrackId(0), 0), (TrackId(1), 1)]);
        assert!(assoc.retired.is_empty());
    }

    #[test]
    fn test_two_people_keep_identities_across_frames() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.2, 0.2), skeleton_at(0.8, 0.8)]);
        // next frame, slightly moved and delivered in the opposite order
        let assoc = t.associate(&[skeleton_at(0.79, 0.79), skeleton_at(0.21, 0.21)]);
        assert_eq!(assoc.matches, vec![(TrackId(0), 1), (TrackId(1), 0)]);
        assert!(assoc.spawned.is_empty());
        assert_eq!(t.tracks.len(), 2);
    }

    #[test]
    fn test_detection_outside_gate_spawns_new_track() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.2, 0.2)]);
        let assoc = t.associate(&[skeleton_at(0.9, 0.9)]);
        assert_eq!(assoc.spawned, vec![TrackId(1)]);
        // the old track aged but is still alive
        assert_eq!(t.tracks.len(), 2);
    }

    #[test]
    fn test_retirement_after_max_missed_frames() {
        let mut t = tracker(); // max_missed_frames = 2
        t.associate(&[skeleton_at(0.5, 0.5)]);
        assert!(t.associate(&[]).retired.is_empty()); // missed = 1
        assert!(t.associate(&[]).retired.is_empty()); // missed = 2
        let assoc = t.associate(&[]); // missed = 3 > 2
        assert_eq!(assoc.retired, vec![TrackId(0)]);
        assert_eq!(t.tracks.len(), 0);
    }

    #[test]
    fn test_respawn_after_retirement_gets_fresh_id() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.5, 0.5)]);
        for _ in 0..3 {
            t.associate(&[]);
        }
        let assoc = t.associate(&[skeleton_at(0.5, 0.5)]);
        assert_eq!(assoc.spawned, vec![TrackId(1)]);
    }

    #[test]
    fn test_closest_pair_claims_first() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.3, 0.5), skeleton_at(0.5, 0.5)]);
        // one detection between the two tracks, nearer to track 1: track 0
        // must not steal it even though it is processed first
        let assoc = t.associate(&[skeleton_at(0.45, 0.5)]);
        assert_eq!(assoc.matches, vec![(TrackId(1), 0)]);
    }

    #[test]
    fn test_equidistant_tie_goes_to_older_track() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.4, 0.5), skeleton_at(0.6, 0.5)]);
        let assoc = t.associate(&[skeleton_at(0.5, 0.5)]);
        assert_eq!(assoc.matches, vec![(TrackId(0), 0)]);
    }

    #[test]
    fn test_empty_frame_is_harmless() {
        let mut t = tracker();
        let assoc = t.associate(&[]);
        assert!(assoc.matches.is_empty() && assoc.spawned.is_empty() && assoc.retired.is_empty());
    }

    #[test]
    fn test_detection_without_anchors_is_ignored() {
        let mut t = tracker();
        let bare = Skeleton::new(vec![Landmark {
            id: 0,
            x: 0.5,
            y: 0.5,
            visibility: 1.0,
        }]);
        let assoc = t.associate(&[bare]);
        assert!(assoc.spawned.is_empty());
        assert_eq!(t.tracks.len(), 0);
    }

    #[test]
    fn test_reset_keeps_id_counter_monotonic() {
        let mut t = tracker();
        t.associate(&[skeleton_at(0.5, 0.5)]);
        t.reset();
        assert_eq!(t.tracks.len(), 0);
        let assoc = t.associate(&[skeleton_at(0.5, 0.5)]);
        assert_eq!(assoc.spawned, vec![TrackId(1)]);
    }
}
