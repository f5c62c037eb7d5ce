//! Last-value-wins telemetry bus.
//!
//! Scan, pose and link status each live on a [`tokio::sync::watch`] lane:
//! a reader always sees the newest value and never a backlog of old ones.
//! Out-of-band notifications (status transitions, malformed frames) travel
//! on a separate [`tokio::sync::broadcast`] lane so every listener gets each
//! one.
//!
//! | Lane | Channel | Writer | Typical reader |
//! |---|---|---|---|
//! | scan | `watch<Scan>` | rosbridge reader task | session driver |
//! | pose | `watch<Pose>` | rosbridge reader task | session driver |
//! | link | `watch<LinkStatus>` | rosbridge client | session driver, CLI |
//! | events | `broadcast<Event>` | rosbridge client | CLI status line |

use odomviz_types::{Event, EventPayload, LinkStatus, Pose, Scan};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Default number of buffered events before slow listeners start lagging.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Shared telemetry bus.  Wrap it in an `Arc` to share it between tasks.
#[derive(Debug)]
pub struct TelemetryBus {
    scan: watch::Sender<Scan>,
    pose: watch::Sender<Pose>,
    link: watch::Sender<LinkStatus>,
    events: broadcast::Sender<Event>,
}

impl TelemetryBus {
    /// Create a bus whose event lane buffers `event_capacity` events.
    pub fn new(event_capacity: usize) -> Self {
        let (scan, _) = watch::channel(Scan::default());
        let (pose, _) = watch::channel(Pose::default());
        let (link, _) = watch::channel(LinkStatus::default());
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            scan,
            pose,
            link,
            events,
        }
    }

    // ── Scan / pose lanes ───────────────────────────────────────────────────

    /// Replace the current scan.  Never fails, even with no readers.
    pub fn publish_scan(&self, scan: Scan) {
        self.scan.send_replace(scan);
    }

    /// Replace the current pose.
    pub fn publish_pose(&self, pose: Pose) {
        self.pose.send_replace(pose);
    }

    pub fn latest_scan(&self) -> Scan {
        self.scan.borrow().clone()
    }

    pub fn latest_pose(&self) -> Pose {
        *self.pose.borrow()
    }

    pub fn subscribe_scan(&self) -> watch::Receiver<Scan> {
        self.scan.subscribe()
    }

    pub fn subscribe_pose(&self) -> watch::Receiver<Pose> {
        self.pose.subscribe()
    }

    // ── Link lane ───────────────────────────────────────────────────────────

    /// Record a link state transition.
    ///
    /// The watch lane is only touched when the status actually changes; each
    /// change is also announced as an [`EventPayload::Link`] event stamped
    /// with `source`.
    pub fn set_link_status(&self, status: LinkStatus, source: &str) {
        let changed = self.link.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        });
        if changed {
            debug!(status = %status, "link status changed");
            self.publish_event(Event::new(source, EventPayload::Link(status)));
        }
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.borrow().clone()
    }

    pub fn subscribe_link(&self) -> watch::Receiver<LinkStatus> {
        self.link.subscribe()
    }

    // ── Event lane ──────────────────────────────────────────────────────────

    /// Broadcast `event`.  Returns how many listeners received it; zero
    /// listeners is normal and not an error.
    pub fn publish_event(&self, event: Event) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscribe_events(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.events.subscribe(),
        }
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Listener on the event lane.
///
/// Obtained via [`TelemetryBus::subscribe_events`].
pub struct EventReceiver {
    receiver: broadcast::Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// A listener that fell behind logs how many events it missed and keeps
    /// going.  Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "event listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "event listener lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
