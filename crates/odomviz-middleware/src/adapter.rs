//! Command transport seam.
//!
//! The runtime never writes to a websocket directly.  It hands velocity
//! commands to a [`CommandSink`]; [`RosbridgeClient`][crate::client::RosbridgeClient]
//! is the production implementation and tests substitute a recorder.

use async_trait::async_trait;
use odomviz_types::{VelocityCommand, VizError};

/// Anything that can carry velocity commands to the robot.
///
/// # Contract
///
/// * `is_ready` – cheap check used by the render tick to decide whether a
///   publish slot may be consumed.
/// * `publish_command` – send one command.  Returns
///   [`VizError::NotConnected`] when the link is down; callers log and drop.
/// * `close` – unsubscribe everything and shut the transport down.  Safe to
///   call more than once.
#[async_trait]
pub trait CommandSink: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn publish_command(&self, command: VelocityCommand) -> Result<(), VizError>;

    async fn close(&self) -> Result<(), VizError>;
}
