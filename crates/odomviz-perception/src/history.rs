//! Movement-gated trajectory history.
//!
//! [`HistoryBuffer`] keeps the last `capacity` [`Snapshot`]s, oldest first.
//! A new snapshot is admitted only when its pose differs enough from the
//! newest stored one (see [`AdmissionGate`]), so a parked robot does not
//! flood the buffer with duplicates.  The buffer is seeded once at startup
//! and is never empty afterwards.
//!
//! # Example
//!
//! ```rust
//! use odomviz_perception::history::{AdmissionGate, HistoryBuffer, Snapshot};
//! use odomviz_types::{Pose, Scan};
//!
//! let gate = AdmissionGate::default();
//! let seed = Snapshot::new(Scan::default(), Pose::default());
//! let mut history = HistoryBuffer::seeded(3, seed).unwrap();
//!
//! // Not far enough: rejected.
//! assert!(!history.offer_gated(Snapshot::new(Scan::default(), Pose::new(0.1, 0.0, 0.0)), &gate));
//! // 0.5 m away: admitted.
//! assert!(history.offer_gated(Snapshot::new(Scan::default(), Pose::new(0.5, 0.0, 0.0)), &gate));
//! assert_eq!(history.len(), 2);
//! ```

use std::collections::VecDeque;
use std::collections::vec_deque;
use std::f32::consts::{PI, TAU};

use chrono::{DateTime, Utc};
use odomviz_types::{Pose, Scan, VizError};
use tracing::{debug, trace};

/// Squared displacement (m²) above which a pose is admitted.
pub const DEFAULT_DISTANCE_THRESHOLD_SQ: f32 = 0.04;
/// Heading change (rad) above which a pose is admitted.
pub const DEFAULT_HEADING_THRESHOLD: f32 = 0.03;
/// Default number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 20;

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// An owned `(scan, pose)` pair captured at one moment.
///
/// Snapshots are copies: the live scan and pose that produced one keep
/// changing without affecting what is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub scan: Scan,
    pub pose: Pose,
    pub captured_at: DateTime<Utc>,
    sequence: u64,
}

impl Snapshot {
    /// Capture `scan` and `pose` now.
    pub fn new(scan: Scan, pose: Pose) -> Self {
        Self {
            scan,
            pose,
            captured_at: Utc::now(),
            sequence: 0,
        }
    }

    /// Insertion order within the owning [`HistoryBuffer`], starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AdmissionGate
// ────────────────────────────────────────────────────────────────────────────

/// Movement / rotation thresholds deciding whether a pose is worth keeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionGate {
    /// Squared planar distance (m²) that must be exceeded.
    pub distance_threshold_sq: f32,
    /// Absolute heading change (rad) that must be exceeded.
    pub heading_threshold: f32,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self {
            distance_threshold_sq: DEFAULT_DISTANCE_THRESHOLD_SQ,
            heading_threshold: DEFAULT_HEADING_THRESHOLD,
        }
    }
}

impl AdmissionGate {
    /// Validated constructor.  Both thresholds must be finite and `>= 0`.
    pub fn new(distance_threshold_sq: f32, heading_threshold: f32) -> Result<Self, VizError> {
        for (name, value) in [
            ("distance_threshold_sq", distance_threshold_sq),
            ("heading_threshold", heading_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VizError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(Self {
            distance_threshold_sq,
            heading_threshold,
        })
    }

    /// `true` when `candidate` moved or turned far enough from `baseline`.
    pub fn admits(&self, baseline: &Pose, candidate: &Pose) -> bool {
        baseline.distance_squared(candidate) > self.distance_threshold_sq
            || heading_delta(baseline.heading, candidate.heading) > self.heading_threshold
    }
}

/// Absolute shortest angular difference between two headings, in `[0, π]`.
pub fn heading_delta(from: f32, to: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(TAU);
    if delta > PI {
        delta -= TAU;
    }
    delta.abs()
}

// ────────────────────────────────────────────────────────────────────────────
// HistoryBuffer
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-capacity, insertion-ordered snapshot history.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
    next_sequence: u64,
}

impl HistoryBuffer {
    /// Create an empty buffer.  Call [`seed`][Self::seed] before offering.
    pub fn new(capacity: usize) -> Result<Self, VizError> {
        if capacity == 0 {
            return Err(VizError::InvalidConfig(
                "history capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_sequence: 0,
        })
    }

    /// Create a buffer and seed it in one step.
    pub fn seeded(capacity: usize, seed: Snapshot) -> Result<Self, VizError> {
        let mut buffer = Self::new(capacity)?;
        buffer.seed(seed)?;
        Ok(buffer)
    }

    /// Unconditionally insert the first snapshot.
    ///
    /// Returns [`VizError::AlreadySeeded`] if the buffer already holds one.
    pub fn seed(&mut self, snapshot: Snapshot) -> Result<(), VizError> {
        if !self.entries.is_empty() {
            return Err(VizError::AlreadySeeded);
        }
        self.push(snapshot);
        Ok(())
    }

    /// Admit `candidate` if its pose is more than `distance_threshold_sq`
    /// (squared) away from the newest stored pose, or its heading differs by
    /// more than `heading_threshold`.
    ///
    /// The heading change is the wrapped shortest difference (see
    /// [`heading_delta`]), not the raw `|a - b|`: a robot sitting near ±π
    /// whose heading flips sign between readings is not admitted as if it
    /// had turned a full circle.
    ///
    /// Returns whether the candidate was stored.  On an unseeded buffer the
    /// candidate is always stored.
    pub fn offer(
        &mut self,
        candidate: Snapshot,
        distance_threshold_sq: f32,
        heading_threshold: f32,
    ) -> bool {
        self.offer_gated(
            candidate,
            &AdmissionGate {
                distance_threshold_sq,
                heading_threshold,
            },
        )
    }

    /// [`offer`][Self::offer] with thresholds taken from `gate`.
    pub fn offer_gated(&mut self, candidate: Snapshot, gate: &AdmissionGate) -> bool {
        if let Some(newest) = self.entries.back()
            && !gate.admits(&newest.pose, &candidate.pose)
        {
            trace!(x = candidate.pose.x, y = candidate.pose.y, "snapshot rejected");
            return false;
        }
        debug!(
            x = candidate.pose.x,
            y = candidate.pose.y,
            heading = candidate.pose.heading,
            "snapshot admitted"
        );
        self.push(candidate);
        true
    }

    /// Oldest-first view of the stored snapshots.
    pub fn snapshots(&self) -> vec_deque::Iter<'_, Snapshot> {
        self.entries.iter()
    }

    /// Most recently admitted (or seeded) snapshot.
    pub fn newest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&mut self, mut snapshot: Snapshot) {
        snapshot.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_back(snapshot);
        // one in, at most one out
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32, heading: f32) -> Snapshot {
        Snapshot::new(Scan::default(), Pose::new(x, y, heading))
    }

    fn seeded(capacity: usize) -> HistoryBuffer {
        HistoryBuffer::seeded(capacity, at(0.0, 0.0, 0.0)).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            HistoryBuffer::new(0),
            Err(VizError::InvalidConfig(_))
        ));
    }

    #[test]
    fn seeding_twice_is_an_error() {
        let mut history = seeded(4);
        assert_eq!(history.seed(at(1.0, 1.0, 0.0)), Err(VizError::AlreadySeeded));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn unseeded_offer_is_admitted() {
        let mut history = HistoryBuffer::new(2).unwrap();
        assert!(history.offer(at(0.0, 0.0, 0.0), 1.0, 1.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn admits_on_distance_only_above_threshold() {
        let mut history = seeded(10);
        assert!(!history.offer(at(0.19, 0.0, 0.0), 0.04, 0.03));
        assert!(history.offer(at(0.25, 0.0, 0.0), 0.04, 0.03));
        assert_eq!(history.newest().unwrap().pose.x, 0.25);
    }

    #[test]
    fn admits_on_heading_change() {
        let mut history = seeded(10);
        assert!(!history.offer(at(0.0, 0.0, 0.02), 0.04, 0.03));
        assert!(history.offer(at(0.0, 0.0, -0.05), 0.04, 0.03));
    }

    #[test]
    fn compares_against_newest_not_oldest() {
        let mut history = seeded(10);
        assert!(history.offer(at(1.0, 0.0, 0.0), 0.04, 0.03));
        // 1.1 is far from the seed but close to the newest entry
        assert!(!history.offer(at(1.1, 0.0, 0.0), 0.04, 0.03));
    }

    #[test]
    fn repeated_identical_candidate_is_admitted_once() {
        let mut history = seeded(10);
        assert!(history.offer(at(2.0, 2.0, 1.0), 0.04, 0.03));
        for _ in 0..5 {
            assert!(!history.offer(at(2.0, 2.0, 1.0), 0.04, 0.03));
        }
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn heading_wraparound_is_not_a_full_turn() {
        let mut history = HistoryBuffer::seeded(4, at(0.0, 0.0, PI - 0.005)).unwrap();
        assert!(!history.offer(at(0.0, 0.0, -PI + 0.005), 0.04, 0.03));
        assert!((heading_delta(0.1, -0.1) - 0.2).abs() < 1e-5);
    }

    #[test]
    fn length_never_exceeds_capacity_and_order_is_temporal() {
        let capacity = 5;
        let mut history = seeded(capacity);
        for i in 1..=50 {
            history.offer(at(i as f32, 0.0, 0.0), 0.04, 0.03);
            assert!(history.len() <= capacity);
        }
        assert_eq!(history.len(), capacity);

        let sequences: Vec<u64> = history.snapshots().map(Snapshot::sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(history.snapshots().next().unwrap().pose.x, 46.0);
        assert_eq!(history.newest().unwrap().pose.x, 50.0);
    }

    #[test]
    fn eviction_drops_exactly_one() {
        let mut history = seeded(2);
        assert!(history.offer(at(1.0, 0.0, 0.0), 0.04, 0.03));
        assert!(history.offer(at(2.0, 0.0, 0.0), 0.04, 0.03));
        let xs: Vec<f32> = history.snapshots().map(|s| s.pose.x).collect();
        assert_eq!(xs, vec![1.0, 2.0]);
    }

    #[test]
    fn stored_snapshot_is_independent_of_caller_copy() {
        let mut history = seeded(3);
        let mut live = Scan::new(vec![1.0, 2.0], 0.0, 0.1);
        history.offer(Snapshot::new(live.clone(), Pose::new(1.0, 0.0, 0.0)), 0.04, 0.03);
        live.ranges[0] = 9.0;
        assert_eq!(history.newest().unwrap().scan.ranges[0], 1.0);
    }

    #[test]
    fn gate_rejects_negative_thresholds() {
        assert!(AdmissionGate::new(-1.0, 0.1).is_err());
        assert!(AdmissionGate::new(0.1, f32::NAN).is_err());
        assert!(AdmissionGate::new(0.0, 0.0).is_ok());
    }
}
