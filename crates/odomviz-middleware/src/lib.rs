//! `odomviz-middleware` – transport between the robot and the session.
//!
//! Speaks the rosbridge v2 JSON protocol over a websocket and hands the
//! latest scan and pose to the rest of the process through last-value-wins
//! channels.  Nothing in here knows how the data is drawn.
//!
//! # Modules
//!
//! - [`bus`] – [`TelemetryBus`]: `watch` lanes for the current scan, pose and
//!   link status plus a broadcast lane of [`Event`][odomviz_types::Event]s.
//! - [`rosbridge`] – frame builders (`subscribe`, `advertise`, `publish`, …)
//!   and the inbound frame decoder.
//! - [`adapter`] – [`CommandSink`], the seam the runtime publishes through.
//! - [`client`] – [`RosbridgeClient`], a tokio-tungstenite session that feeds
//!   the bus and implements [`CommandSink`].

pub mod adapter;
pub mod bus;
pub mod client;
pub mod rosbridge;

pub use adapter::CommandSink;
pub use bus::{EventReceiver, TelemetryBus};
pub use client::RosbridgeClient;
pub use rosbridge::{InboundFrame, RosbridgeConfig, TopicSpec};
