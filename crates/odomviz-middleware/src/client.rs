//! rosbridge websocket session.
//!
//! [`RosbridgeClient`] owns one websocket to the robot.  After the handshake
//! it subscribes to the scan and odometry topics and advertises the command
//! topic.  Two tasks then run per connection:
//!
//! * a **reader** that decodes inbound frames and replaces the current scan or
//!   pose on the [`TelemetryBus`], merging missing fields from the previous
//!   value;
//! * a **writer** that drains an mpsc queue of outbound frames into the
//!   socket, so callers never hold the sink across an await.
//!
//! Link transitions (`Connecting`, `Connected`, `Error`, `NotConnected`) are
//! written to the bus and never abort the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use odomviz_perception::pose_from_message;
use odomviz_types::{Event, EventPayload, LinkStatus, VelocityCommand, VizError};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::adapter::CommandSink;
use crate::bus::TelemetryBus;
use crate::rosbridge::{
    InboundFrame, RosbridgeConfig, TopicSpec, advertise_frame, decode_frame,
    publish_twist_frame, subscribe_frame, unadvertise_frame, unsubscribe_frame,
};

const SOURCE: &str = "odomviz-middleware::rosbridge";
const OUTBOUND_CAPACITY: usize = 32;
/// How long `close` waits for the writer to flush the teardown frames.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
struct TopicHandle {
    id: String,
    topic: String,
}

impl TopicHandle {
    fn new(op: &str, spec: &TopicSpec) -> Self {
        Self {
            id: format!("{op}:{}:{}", spec.name, Uuid::new_v4()),
            topic: spec.name.clone(),
        }
    }
}

struct Connection {
    outbound: mpsc::Sender<Message>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    subscriptions: Vec<TopicHandle>,
    advertisement: TopicHandle,
}

/// A rosbridge session feeding a [`TelemetryBus`].
pub struct RosbridgeClient {
    config: RosbridgeConfig,
    bus: Arc<TelemetryBus>,
    connection: Mutex<Option<Connection>>,
}

impl RosbridgeClient {
    pub fn new(config: RosbridgeConfig, bus: Arc<TelemetryBus>) -> Result<Self, VizError> {
        config.validate()?;
        Ok(Self {
            config,
            bus,
            connection: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RosbridgeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<TelemetryBus> {
        &self.bus
    }

    /// Open the websocket, subscribe and advertise.
    ///
    /// Does nothing while the current session is alive.  A session whose
    /// reader has stopped (remote close or transport error) is discarded and
    /// a fresh handshake is made.  A failed handshake leaves the link in
    /// [`LinkStatus::Error`] and returns [`VizError::Transport`]; no retry is
    /// attempted.
    pub async fn connect(&self) -> Result<(), VizError> {
        let mut guard = self.connection.lock().await;
        match guard.as_ref().map(|c| c.reader.is_finished()) {
            Some(false) => {
                debug!("connect called on an open session");
                return Ok(());
            }
            Some(true) => {
                if let Some(stale) = guard.take() {
                    debug!("discarding a dropped rosbridge session");
                    stale.writer.abort();
                }
            }
            None => {}
        }

        let endpoint = self.config.endpoint.as_str();
        self.bus.set_link_status(LinkStatus::Connecting, SOURCE);
        info!(endpoint = %endpoint, "connecting to rosbridge");

        let ws = match connect_async(endpoint).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "rosbridge connect failed");
                self.bus.set_link_status(LinkStatus::Error(e.to_string()), SOURCE);
                return Err(VizError::Transport(format!("connect to {endpoint}: {e}")));
            }
        };
        self.bus.set_link_status(LinkStatus::Connected, SOURCE);
        info!(endpoint = %endpoint, "connected to rosbridge");

        let (mut ws_tx, ws_rx) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

        let writer_bus = Arc::clone(&self.bus);
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_tx.send(message).await {
                    error!(error = %e, "rosbridge write failed");
                    writer_bus.set_link_status(LinkStatus::Error(e.to_string()), SOURCE);
                    break;
                }
                if closing {
                    break;
                }
            }
        });
        let reader = tokio::spawn(read_loop(ws_rx, Arc::clone(&self.bus), self.config.clone()));

        let subscriptions = vec![
            TopicHandle::new("subscribe", &self.config.scan),
            TopicHandle::new("subscribe", &self.config.odometry),
        ];
        let advertisement = TopicHandle::new("advertise", &self.config.command);

        let mut opening = vec![
            subscribe_frame(&subscriptions[0].id, &self.config.scan),
            subscribe_frame(&subscriptions[1].id, &self.config.odometry),
        ];
        opening.push(advertise_frame(&advertisement.id, &self.config.command));
        for frame in opening {
            outbound
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| VizError::Channel(format!("outbound queue closed: {e}")))?;
        }

        *guard = Some(Connection {
            outbound,
            writer,
            reader,
            subscriptions,
            advertisement,
        });
        Ok(())
    }

    async fn outbound(&self) -> Option<mpsc::Sender<Message>> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.outbound.clone())
    }
}

#[async_trait]
impl CommandSink for RosbridgeClient {
    fn is_ready(&self) -> bool {
        self.bus.link_status().is_ready()
    }

    async fn publish_command(&self, command: VelocityCommand) -> Result<(), VizError> {
        if !self.is_ready() {
            return Err(VizError::NotConnected);
        }
        let outbound = self.outbound().await.ok_or(VizError::NotConnected)?;
        let frame = publish_twist_frame(&self.config.command.name, command);
        outbound
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| VizError::Channel(format!("outbound queue closed: {e}")))?;
        trace!(
            linear_x = command.linear_x,
            angular_z = command.angular_z,
            "command queued"
        );
        Ok(())
    }

    /// Stop the reader, send `unsubscribe`/`unadvertise`, then the close frame.
    ///
    /// The reader is cancelled and joined before anything else, so no bus
    /// update happens once this has started.
    async fn close(&self) -> Result<(), VizError> {
        let Some(connection) = self.connection.lock().await.take() else {
            self.bus.set_link_status(LinkStatus::NotConnected, SOURCE);
            return Ok(());
        };
        let Connection {
            outbound,
            writer,
            reader,
            subscriptions,
            advertisement,
        } = connection;

        reader.abort();
        let _ = reader.await;

        let mut teardown: Vec<String> = subscriptions
            .iter()
            .map(|s| unsubscribe_frame(&s.id, &s.topic))
            .collect();
        teardown.push(unadvertise_frame(&advertisement.id, &advertisement.topic));

        for frame in teardown {
            if outbound.send(Message::Text(frame.into())).await.is_err() {
                warn!("writer already stopped; skipping teardown frames");
                break;
            }
        }
        let _ = outbound.send(Message::Close(None)).await;
        drop(outbound);

        if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
            warn!("rosbridge writer did not finish before the close grace period");
        }
        self.bus.set_link_status(LinkStatus::NotConnected, SOURCE);
        info!("rosbridge session closed");
        Ok(())
    }
}

impl Drop for RosbridgeClient {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.reader.abort();
            connection.writer.abort();
        }
    }
}

async fn read_loop(
    mut ws_rx: SplitStream<WsStream>,
    bus: Arc<TelemetryBus>,
    config: RosbridgeConfig,
) {
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&bus, &config, text.as_str()),
            Ok(Message::Close(_)) => {
                info!("rosbridge closed the connection");
                bus.set_link_status(LinkStatus::NotConnected, SOURCE);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "rosbridge read failed");
                bus.set_link_status(LinkStatus::Error(e.to_string()), SOURCE);
                return;
            }
        }
    }
    bus.set_link_status(LinkStatus::NotConnected, SOURCE);
}

/// Route one inbound text frame onto the bus.
fn handle_text(bus: &TelemetryBus, config: &RosbridgeConfig, text: &str) {
    match decode_frame(text, config) {
        Ok(InboundFrame::Scan(msg)) => {
            let scan = msg.into_scan(&bus.latest_scan());
            trace!(samples = scan.ranges.len(), "scan received");
            bus.publish_scan(scan);
        }
        Ok(InboundFrame::Odometry(msg)) => {
            let pose = pose_from_message(&msg, &bus.latest_pose());
            trace!(x = pose.x, y = pose.y, heading = pose.heading, "pose received");
            bus.publish_pose(pose);
        }
        Ok(InboundFrame::Status { level, message }) => match level.as_str() {
            "error" | "warning" => warn!(level = %level, message = %message, "rosbridge status"),
            _ => debug!(level = %level, message = %message, "rosbridge status"),
        },
        Ok(InboundFrame::Ignored { op, topic }) => {
            debug!(op = %op, topic = ?topic, "frame ignored");
        }
        Err(e) => {
            let topic = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("topic").and_then(|t| t.as_str()).map(str::to_string))
                .unwrap_or_default();
            warn!(topic = %topic, error = %e, "malformed frame dropped");
            bus.publish_event(Event::new(
                SOURCE,
                EventPayload::MalformedFrame {
                    topic,
                    reason: e.to_string(),
                },
            ));
        }
    }
}
