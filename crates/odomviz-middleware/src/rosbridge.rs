//! rosbridge v2 protocol frames.
//!
//! Outbound frames are built as JSON text ready to hand to the websocket.
//! Inbound text is classified by [`decode_frame`] into an [`InboundFrame`];
//! only `publish` frames on the configured scan and odometry topics carry
//! data the session uses.

use odomviz_types::wire::{OdometryMessage, ScanMessage, TwistMessage};
use odomviz_types::{VelocityCommand, VizError};
use serde::Deserialize;
use serde_json::{Value, json};

/// One rosbridge topic and how to subscribe to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSpec {
    pub name: String,
    pub msg_type: String,
    /// Minimum milliseconds between messages rosbridge forwards to us.
    pub throttle_rate: Option<u32>,
    /// Server-side queue depth; 1 drops everything but the newest message.
    pub queue_length: Option<u32>,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, msg_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            msg_type: msg_type.into(),
            throttle_rate: None,
            queue_length: None,
        }
    }

    pub fn with_throttle_rate(mut self, millis: u32) -> Self {
        self.throttle_rate = Some(millis);
        self
    }

    pub fn with_queue_length(mut self, depth: u32) -> Self {
        self.queue_length = Some(depth);
        self
    }

    /// `true` when `topic` names this topic, ignoring a leading slash.
    pub fn matches(&self, topic: &str) -> bool {
        self.name.trim_start_matches('/') == topic.trim_start_matches('/')
    }
}

/// Endpoint and topics of a rosbridge session.
#[derive(Debug, Clone, PartialEq)]
pub struct RosbridgeConfig {
    /// `ws://host:port` of the robot's rosbridge server.
    pub endpoint: String,
    pub scan: TopicSpec,
    pub odometry: TopicSpec,
    pub command: TopicSpec,
}

impl Default for RosbridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:9090".to_string(),
            scan: TopicSpec::new("/scan", "sensor_msgs/LaserScan")
                .with_throttle_rate(500)
                .with_queue_length(1),
            odometry: TopicSpec::new("/odom", "nav_msgs/Odometry").with_queue_length(1),
            command: TopicSpec::new("cmd_vel", "geometry_msgs/Twist"),
        }
    }
}

impl RosbridgeConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn validate(&self) -> Result<(), VizError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(VizError::InvalidConfig(format!(
                "endpoint must be a ws:// or wss:// URL, got {:?}",
                self.endpoint
            )));
        }
        for topic in [&self.scan, &self.odometry, &self.command] {
            if topic.name.trim_start_matches('/').is_empty() {
                return Err(VizError::InvalidConfig("topic name is empty".to_string()));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound
// ────────────────────────────────────────────────────────────────────────────

pub fn subscribe_frame(id: &str, topic: &TopicSpec) -> String {
    let mut frame = json!({
        "op": "subscribe",
        "id": id,
        "topic": topic.name,
        "type": topic.msg_type,
    });
    if let Some(rate) = topic.throttle_rate {
        frame["throttle_rate"] = json!(rate);
    }
    if let Some(depth) = topic.queue_length {
        frame["queue_length"] = json!(depth);
    }
    frame.to_string()
}

pub fn unsubscribe_frame(id: &str, topic: &str) -> String {
    json!({ "op": "unsubscribe", "id": id, "topic": topic }).to_string()
}

pub fn advertise_frame(id: &str, topic: &TopicSpec) -> String {
    json!({
        "op": "advertise",
        "id": id,
        "topic": topic.name,
        "type": topic.msg_type,
    })
    .to_string()
}

pub fn unadvertise_frame(id: &str, topic: &str) -> String {
    json!({ "op": "unadvertise", "id": id, "topic": topic }).to_string()
}

/// `geometry_msgs/Twist` publish frame for `command`.
pub fn publish_twist_frame(topic: &str, command: VelocityCommand) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": TwistMessage::from(command),
    })
    .to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    msg: Option<Value>,
    #[serde(default)]
    level: Option<String>,
}

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Scan(ScanMessage),
    Odometry(OdometryMessage),
    /// rosbridge `status` report, e.g. a rejected subscription.
    Status { level: String, message: String },
    /// Anything else: other ops, or publishes on topics we did not ask for.
    Ignored { op: String, topic: Option<String> },
}

/// Classify one inbound text frame.
///
/// # Errors
///
/// [`VizError::Decode`] when the text is not a rosbridge frame, or when a
/// publish on the scan or odometry topic carries a message of the wrong shape.
pub fn decode_frame(text: &str, config: &RosbridgeConfig) -> Result<InboundFrame, VizError> {
    let frame: RawFrame = serde_json::from_str(text)
        .map_err(|e| VizError::Decode(format!("not a rosbridge frame: {e}")))?;

    match frame.op.as_str() {
        "publish" => {
            let topic = frame.topic.unwrap_or_default();
            let msg = frame.msg.unwrap_or(Value::Null);
            if config.scan.matches(&topic) {
                let scan = serde_json::from_value(msg)
                    .map_err(|e| VizError::Decode(format!("{topic}: {e}")))?;
                Ok(InboundFrame::Scan(scan))
            } else if config.odometry.matches(&topic) {
                let odom = serde_json::from_value(msg)
                    .map_err(|e| VizError::Decode(format!("{topic}: {e}")))?;
                Ok(InboundFrame::Odometry(odom))
            } else {
                Ok(InboundFrame::Ignored {
                    op: frame.op,
                    topic: Some(topic),
                })
            }
        }
        "status" => Ok(InboundFrame::Status {
            level: frame.level.unwrap_or_else(|| "info".to_string()),
            message: frame
                .msg
                .and_then(|m| m.as_str().map(str::to_string))
                .unwrap_or_default(),
        }),
        _ => Ok(InboundFrame::Ignored {
            op: frame.op,
            topic: frame.topic,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn default_topics_match_the_robot() {
        let config = RosbridgeConfig::default();
        assert!(config.validate().is_ok());

        let scan = parse(&subscribe_frame("s1", &config.scan));
        assert_eq!(scan["op"], "subscribe");
        assert_eq!(scan["topic"], "/scan");
        assert_eq!(scan["type"], "sensor_msgs/LaserScan");
        assert_eq!(scan["throttle_rate"], 500);
        assert_eq!(scan["queue_length"], 1);

        let odom = parse(&subscribe_frame("o1", &config.odometry));
        assert_eq!(odom["type"], "nav_msgs/Odometry");
        assert!(odom.get("throttle_rate").is_none());
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let config = RosbridgeConfig::default().with_endpoint("http://robot:9090");
        assert!(matches!(config.validate(), Err(VizError::InvalidConfig(_))));
    }

    #[test]
    fn teardown_frames_carry_id_and_topic() {
        let unsub = parse(&unsubscribe_frame("s1", "/scan"));
        assert_eq!(unsub["op"], "unsubscribe");
        assert_eq!(unsub["id"], "s1");
        let unadv = parse(&unadvertise_frame("c1", "cmd_vel"));
        assert_eq!(unadv["op"], "unadvertise");
        assert_eq!(unadv["topic"], "cmd_vel");
    }

    #[test]
    fn twist_frame_has_structural_zeros() {
        let frame = parse(&publish_twist_frame("cmd_vel", VelocityCommand::new(0.5, -0.25)));
        assert_eq!(frame["op"], "publish");
        assert_eq!(frame["topic"], "cmd_vel");
        assert_eq!(frame["msg"]["linear"]["x"], 0.5);
        assert_eq!(frame["msg"]["linear"]["y"], 0.0);
        assert_eq!(frame["msg"]["linear"]["z"], 0.0);
        assert_eq!(frame["msg"]["angular"]["x"], 0.0);
        assert_eq!(frame["msg"]["angular"]["z"], -0.25);
    }

    #[test]
    fn scan_publish_is_decoded() {
        let config = RosbridgeConfig::default();
        let text = r#"{"op":"publish","topic":"/scan","msg":{"angle_min":-1.0,"angle_increment":0.5,"ranges":[1.0,null]}}"#;
        let InboundFrame::Scan(msg) = decode_frame(text, &config).unwrap() else {
            panic!("expected scan");
        };
        let ranges = msg.ranges.unwrap();
        assert_eq!(ranges.len(), 2);
        assert!(ranges[1].is_none());
    }

    #[test]
    fn odometry_publish_without_leading_slash_is_decoded() {
        let config = RosbridgeConfig::default();
        let text = r#"{"op":"publish","topic":"odom","msg":{"pose":{"pose":{"position":{"x":1.0,"y":2.0,"z":0.0}}}}}"#;
        let frame = decode_frame(text, &config).unwrap();
        assert!(matches!(frame, InboundFrame::Odometry(_)));
    }

    #[test]
    fn wrong_shape_on_known_topic_is_a_decode_error() {
        let config = RosbridgeConfig::default();
        let text = r#"{"op":"publish","topic":"/scan","msg":{"ranges":"lots"}}"#;
        assert!(matches!(decode_frame(text, &config), Err(VizError::Decode(_))));
        assert!(matches!(decode_frame("not json", &config), Err(VizError::Decode(_))));
    }

    #[test]
    fn other_frames_are_ignored_or_reported() {
        let config = RosbridgeConfig::default();
        let other = decode_frame(r#"{"op":"publish","topic":"/tf","msg":{}}"#, &config).unwrap();
        assert!(matches!(other, InboundFrame::Ignored { .. }));

        let status = decode_frame(
            r#"{"op":"status","level":"error","msg":"Unknown topic"}"#,
            &config,
        )
        .unwrap();
        let InboundFrame::Status { level, message } = status else {
            panic!("expected status");
        };
        assert_eq!(level, "error");
        assert_eq!(message, "Unknown topic");
    }
}
