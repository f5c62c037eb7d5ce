//! `odomviz-types` – shared vocabulary of the odomviz workspace.
//!
//! Plain data types that flow between perception, teleop, middleware and the
//! runtime, plus the rosbridge wire schemas in [`wire`] and the workspace-wide
//! [`VizError`].

pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A 2-D point or vector.  Units depend on context (metres in the robot
/// world, pixels on a render surface).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The origin.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Squared Euclidean length.
    pub fn norm_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn norm(self) -> f32 {
        self.norm_squared().sqrt()
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Planar robot pose in the odometry frame.
///
/// `heading` is the yaw in radians, counter-clockwise from +X.  It is not
/// normalised to any particular range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }

    /// Position component as a point.
    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// Squared planar distance to `other`.
    pub fn distance_squared(&self, other: &Pose) -> f32 {
        self.position().sub(other.position()).norm_squared()
    }
}

/// A single range scan in the robot's body frame at capture time.
///
/// `ranges[i]` was measured at bearing `angle_min + i * angle_increment`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scan {
    pub ranges: Vec<f32>,
    pub angle_min: f32,
    pub angle_increment: f32,
}

impl Scan {
    pub fn new(ranges: Vec<f32>, angle_min: f32, angle_increment: f32) -> Self {
        Self {
            ranges,
            angle_min,
            angle_increment,
        }
    }

    /// Bearing of the `index`-th sample.
    pub fn bearing(&self, index: usize) -> f32 {
        self.angle_min + index as f32 * self.angle_increment
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Velocity command for a differential / skid-steer base.
///
/// Only forward speed and yaw rate exist; strafe, lift, roll and pitch are
/// structurally zero on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear_x: f32,
    pub angular_z: f32,
}

impl VelocityCommand {
    pub fn new(linear_x: f32, angular_z: f32) -> Self {
        Self {
            linear_x,
            angular_z,
        }
    }

    /// The explicit stop command.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.linear_x == 0.0 && self.angular_z == 0.0
    }
}

/// State of the connection to the robot's rosbridge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    NotConnected,
    Connecting,
    Connected,
    /// Connect failure or mid-session transport error.
    Error(String),
}

impl LinkStatus {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::NotConnected => "Not Connected",
            LinkStatus::Connecting => "Connecting...",
            LinkStatus::Connected => "Connected",
            LinkStatus::Error(_) => "Error Connecting",
        }
    }

    /// `true` when commands can be published.
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Error(reason) => write!(f, "{}: {reason}", self.label()),
            other => f.write_str(other.label()),
        }
    }
}

/// Envelope for out-of-band notifications routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "odomviz-middleware::rosbridge"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a new event with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// The transport changed state.
    Link(LinkStatus),
    /// An inbound frame could not be used.
    MalformedFrame { topic: String, reason: String },
}

/// Error type shared by every odomviz crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VizError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Not connected to the robot")]
    NotConnected,

    #[error("History buffer already seeded")]
    AlreadySeeded,

    #[error("Channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_distance_squared() {
        let a = Pose::new(0.0, 0.0, 0.0);
        let b = Pose::new(3.0, 4.0, 1.0);
        assert!((a.distance_squared(&b) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn scan_bearing_steps_from_angle_min() {
        let scan = Scan::new(vec![1.0; 4], -1.0, 0.5);
        assert!((scan.bearing(0) + 1.0).abs() < 1e-6);
        assert!((scan.bearing(3) - 0.5).abs() < 1e-6);
        assert!(!scan.is_empty());
        assert!(Scan::default().is_empty());
    }

    #[test]
    fn zero_command_is_zero() {
        assert!(VelocityCommand::zero().is_zero());
        assert!(!VelocityCommand::new(0.1, 0.0).is_zero());
    }

    #[test]
    fn link_status_labels() {
        assert_eq!(LinkStatus::default().label(), "Not Connected");
        assert_eq!(LinkStatus::Connecting.label(), "Connecting...");
        assert!(LinkStatus::Connected.is_ready());
        let err = LinkStatus::Error("refused".to_string());
        assert!(!err.is_ready());
        assert_eq!(err.to_string(), "Error Connecting: refused");
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "odomviz-middleware::rosbridge",
            EventPayload::Link(LinkStatus::Connected),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert!(matches!(back.payload, EventPayload::Link(LinkStatus::Connected)));
    }

    #[test]
    fn viz_error_display() {
        let err = VizError::InvalidConfig("capacity must be > 0".to_string());
        assert!(err.to_string().contains("capacity"));
        assert_eq!(VizError::NotConnected.to_string(), "Not connected to the robot");
    }
}
