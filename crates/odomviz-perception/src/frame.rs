//! Pose and scan frames.
//!
//! The robot is a planar ground vehicle, so orientation collapses to a single
//! yaw angle and roll/pitch are never computed.  A range scan is expressed in
//! the robot body frame; [`project`] rotates it by a reference heading and
//! converts it into Cartesian points on a caller-chosen scale.
//!
//! # Example
//!
//! ```rust
//! use odomviz_perception::frame::{project, yaw_from_quaternion};
//! use odomviz_types::Scan;
//!
//! // Identity orientation faces +X.
//! assert_eq!(yaw_from_quaternion(0.0, 0.0, 0.0, 1.0), 0.0);
//!
//! // One return 1 m straight ahead, 40 px per metre.
//! let scan = Scan::new(vec![1.0], 0.0, 0.0);
//! let points: Vec<_> = project(&scan, 0.0, 40.0).collect();
//! assert!((points[0].x - 40.0).abs() < 1e-4);
//! ```

use odomviz_types::wire::{OdometryMessage, QuaternionMsg};
use odomviz_types::{Point2, Pose, Scan};

// ────────────────────────────────────────────────────────────────────────────
// Orientation
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Pure rotation of `yaw` radians about +Z.
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Yaw component of this rotation.  See [`yaw_from_quaternion`].
    pub fn yaw(&self) -> f32 {
        yaw_from_quaternion(self.x, self.y, self.z, self.w)
    }
}

impl From<QuaternionMsg> for Quaternion {
    fn from(q: QuaternionMsg) -> Self {
        Self::new(q.w, q.x, q.y, q.z)
    }
}

/// Heading (yaw) of the orientation `(x, y, z, w)`.
///
/// Only the yaw row of the ZYX Euler conversion is evaluated, which is exact
/// for yaw regardless of roll/pitch.  This is not a general Euler conversion;
/// recovering pitch would also need the ±90° singularity clamp.
pub fn yaw_from_quaternion(x: f32, y: f32, z: f32, w: f32) -> f32 {
    let t3 = 2.0 * (w * z + x * y);
    let t4 = 1.0 - 2.0 * (y * y + z * z);
    t3.atan2(t4)
}

/// Decode an odometry message into a [`Pose`].
///
/// Missing position or orientation keeps the corresponding component of
/// `previous`.
pub fn pose_from_message(msg: &OdometryMessage, previous: &Pose) -> Pose {
    let inner = msg.pose();
    let (x, y) = match inner.position {
        Some(p) => (p.x, p.y),
        None => (previous.x, previous.y),
    };
    let heading = match inner.orientation {
        Some(q) => Quaternion::from(q).yaw(),
        None => previous.heading,
    };
    Pose::new(x, y, heading)
}

// ────────────────────────────────────────────────────────────────────────────
// Scan projection
// ────────────────────────────────────────────────────────────────────────────

/// Project `scan` into Cartesian points.
///
/// Sample `i` lands at `scale * r_i * (cos θ, sin θ)` with
/// `θ = angle_min + i * angle_increment + heading_offset`.  Pass the emitting
/// pose's heading for a world-aligned view, or `0.0` for the body frame.
/// Negative and non-finite ranges mean "no return" and are skipped.
pub fn project(scan: &Scan, heading_offset: f32, scale: f32) -> ScanProjection<'_> {
    ScanProjection {
        scan,
        index: 0,
        heading_offset,
        scale,
    }
}

/// Lazy iterator returned by [`project`].
///
/// Yields points in sample order.  Clone it to walk the scan again.
#[derive(Debug, Clone)]
pub struct ScanProjection<'a> {
    scan: &'a Scan,
    index: usize,
    heading_offset: f32,
    scale: f32,
}

impl Iterator for ScanProjection<'_> {
    type Item = Point2;

    fn next(&mut self) -> Option<Point2> {
        while self.index < self.scan.ranges.len() {
            let i = self.index;
            self.index += 1;

            let range = self.scan.ranges[i];
            if !range.is_finite() || range < 0.0 {
                continue;
            }
            let angle = self.scan.bearing(i) + self.heading_offset;
            let reach = self.scale * range;
            return Some(Point2::new(reach * angle.cos(), reach * angle.sin()));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.scan.ranges.len() - self.index))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
