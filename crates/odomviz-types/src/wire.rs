//! rosbridge JSON schemas for the three topics the front end touches.
//!
//! Inbound messages are decoded leniently: every field the core does not
//! need is ignored, and every field it does need is optional so that a
//! partially-populated message degrades to "keep the previous value" instead
//! of failing.  rosbridge encodes non-finite floats as `null`, so individual
//! range samples are `Option<f32>` as well.

use serde::{Deserialize, Serialize};

use crate::{Scan, VelocityCommand};

/// `sensor_msgs/LaserScan`, reduced to the fields the core consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanMessage {
    #[serde(default)]
    pub ranges: Option<Vec<Option<f32>>>,
    #[serde(default)]
    pub angle_min: Option<f32>,
    #[serde(default)]
    pub angle_increment: Option<f32>,
}

impl ScanMessage {
    /// Build a [`Scan`], taking any missing field from `previous`.
    ///
    /// A `null` sample becomes `+inf`, which projection treats as "no return".
    pub fn into_scan(self, previous: &Scan) -> Scan {
        let ranges = match self.ranges {
            Some(samples) => samples
                .into_iter()
                .map(|r| r.unwrap_or(f32::INFINITY))
                .collect(),
            None => previous.ranges.clone(),
        };
        Scan {
            ranges,
            angle_min: self.angle_min.unwrap_or(previous.angle_min),
            angle_increment: self.angle_increment.unwrap_or(previous.angle_increment),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PointMsg {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuaternionMsg {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "unit_w")]
    pub w: f32,
}

fn unit_w() -> f32 {
    1.0
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: unit_w(),
        }
    }
}

/// `geometry_msgs/Pose`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PoseMsg {
    #[serde(default)]
    pub position: Option<PointMsg>,
    #[serde(default)]
    pub orientation: Option<QuaternionMsg>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PoseWithCovarianceMsg {
    #[serde(default)]
    pub pose: PoseMsg,
}

/// Pose source: either a full `nav_msgs/Odometry` or a bare
/// `geometry_msgs/Pose`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum OdometryMessage {
    Odometry { pose: PoseWithCovarianceMsg },
    Bare(PoseMsg),
}

impl OdometryMessage {
    /// The inner `geometry_msgs/Pose`.
    pub fn pose(&self) -> &PoseMsg {
        match self {
            OdometryMessage::Odometry { pose } => &pose.pose,
            OdometryMessage::Bare(pose) => pose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3Msg {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// `geometry_msgs/Twist` as published on the command topic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TwistMessage {
    pub linear: Vector3Msg,
    pub angular: Vector3Msg,
}

impl From<VelocityCommand> for TwistMessage {
    fn from(cmd: VelocityCommand) -> Self {
        Self {
            linear: Vector3Msg {
                x: cmd.linear_x,
                y: 0.0,
                z: 0.0,
            },
            angular: Vector3Msg {
                x: 0.0,
                y: 0.0,
                z: cmd.angular_z,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_message_ignores_extra_fields_and_maps_null_to_inf() {
        let raw = r#"{"header":{"frame_id":"laser"},"angle_min":-1.5,"angle_max":1.5,
            "angle_increment":0.5,"range_min":0.1,"range_max":10.0,
            "ranges":[1.0,null,2.5],"intensities":[]}"#;
        let msg: ScanMessage = serde_json::from_str(raw).unwrap();
        let scan = msg.into_scan(&Scan::default());
        assert_eq!(scan.ranges.len(), 3);
        assert!(scan.ranges[1].is_infinite());
        assert!((scan.angle_min + 1.5).abs() < 1e-6);
        assert!((scan.angle_increment - 0.5).abs() < 1e-6);
    }

    #[test]
    fn scan_message_missing_fields_fall_back_to_previous() {
        let previous = Scan::new(vec![4.0, 5.0], 0.25, 0.1);
        let msg: ScanMessage = serde_json::from_str(r#"{"ranges":[]}"#).unwrap();
        let scan = msg.into_scan(&previous);
        assert!(scan.ranges.is_empty(), "an empty scan is a valid frame");
        assert!((scan.angle_min - 0.25).abs() < 1e-6);

        let msg: ScanMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg.into_scan(&previous), previous);
    }

    #[test]
    fn odometry_message_accepts_nav_msgs_layout() {
        let raw = r#"{"header":{},"child_frame_id":"base_link",
            "pose":{"pose":{"position":{"x":1.0,"y":2.0,"z":0.0},
            "orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}},"covariance":[]},
            "twist":{}}"#;
        let msg: OdometryMessage = serde_json::from_str(raw).unwrap();
        let pose = msg.pose();
        let position = pose.position.unwrap();
        assert!((position.x - 1.0).abs() < 1e-6);
        assert!((position.y - 2.0).abs() < 1e-6);
        assert!(pose.orientation.is_some());
    }

    #[test]
    fn odometry_message_accepts_bare_pose() {
        let raw = r#"{"position":{"x":3.0,"y":-1.0}}"#;
        let msg: OdometryMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, OdometryMessage::Bare(_)));
        assert!(msg.pose().orientation.is_none());
    }

    #[test]
    fn twist_from_command_zeroes_other_axes() {
        let twist = TwistMessage::from(VelocityCommand::new(1.5, -0.25));
        let linear = Vector3Msg {
            x: 1.5,
            y: 0.0,
            z: 0.0,
        };
        let angular = Vector3Msg {
            x: 0.0,
            y: 0.0,
            z: -0.25,
        };
        assert_eq!(twist.linear, linear);
        assert_eq!(twist.angular, angular);
        let json = serde_json::to_value(twist).unwrap();
        assert_eq!(json["angular"]["z"], serde_json::json!(-0.25));
    }
}
