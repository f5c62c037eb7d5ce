//! Async loop driving a [`Session`].
//!
//! One task owns the session and waits on everything that can touch it:
//!
//! 1. shutdown request,
//! 2. a new scan or pose on the [`TelemetryBus`] (last value wins, so a burst
//!    of messages between two wakeups costs one handler call),
//! 3. a link status change,
//! 4. a pointer event from the controls surface,
//! 5. the frame interval, which renders both views and publishes the sampled
//!    command through the [`CommandSink`].
//!
//! Each branch runs to completion before the next is polled, which keeps the
//! session single-writer.  On shutdown a final zero command is sent while the
//! link is up, then the sink is closed.

use std::sync::Arc;

use odomviz_middleware::{CommandSink, TelemetryBus};
use odomviz_types::{VelocityCommand, VizError};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::render::RenderSurface;
use crate::session::{PointerEvent, Session};

/// Pointer events buffered before senders wait.
const POINTER_CAPACITY: usize = 64;

/// Sending half: pointer events in, shutdown request.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    pointer: mpsc::Sender<PointerEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Receiving half, consumed by [`SessionDriver::run`].
#[derive(Debug)]
pub struct DriverInputs {
    pointer: mpsc::Receiver<PointerEvent>,
    shutdown: watch::Receiver<bool>,
}

/// Create a connected handle / inputs pair.
pub fn driver_channel() -> (DriverHandle, DriverInputs) {
    let (pointer_tx, pointer_rx) = mpsc::channel(POINTER_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (
        DriverHandle {
            pointer: pointer_tx,
            shutdown: Arc::new(shutdown_tx),
        },
        DriverInputs {
            pointer: pointer_rx,
            shutdown: shutdown_rx,
        },
    )
}

impl DriverHandle {
    pub async fn send_pointer(&self, event: PointerEvent) -> Result<(), VizError> {
        self.pointer
            .send(event)
            .await
            .map_err(|e| VizError::Channel(format!("driver stopped: {e}")))
    }

    /// Ask the driver to stop after its current step.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// A session wired to its transport and its two drawing surfaces.
pub struct SessionDriver<W, C> {
    session: Session,
    bus: Arc<TelemetryBus>,
    sink: Arc<dyn CommandSink>,
    world: W,
    controls: C,
    published: u64,
}

impl<W, C> SessionDriver<W, C>
where
    W: RenderSurface + Send,
    C: RenderSurface + Send,
{
    pub fn new(
        session: Session,
        bus: Arc<TelemetryBus>,
        sink: Arc<dyn CommandSink>,
        world: W,
        controls: C,
    ) -> Self {
        Self {
            session,
            bus,
            sink,
            world,
            controls,
            published: 0,
        }
    }

    /// Run until [`DriverHandle::shutdown`] is called or every handle is
    /// dropped.  Always closes the sink before returning.
    pub async fn run(&mut self, inputs: DriverInputs) -> Result<(), VizError> {
        let DriverInputs {
            mut pointer,
            mut shutdown,
        } = inputs;
        let mut scans = self.bus.subscribe_scan();
        let mut poses = self.bus.subscribe_pose();
        let mut link = self.bus.subscribe_link();
        // pick up whatever arrived before the driver started
        scans.mark_changed();
        poses.mark_changed();
        self.session.set_link_status(link.borrow_and_update().clone());

        let mut frames = tokio::time::interval(self.session.config().frame_period());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut pointer_open = true;

        info!(
            frame_rate_hz = self.session.config().frame_rate_hz,
            "session driver running"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                Ok(()) = scans.changed() => {
                    let scan = scans.borrow_and_update().clone();
                    self.session.on_scan(scan);
                }

                Ok(()) = poses.changed() => {
                    let pose = *poses.borrow_and_update();
                    self.session.on_pose(pose);
                }

                Ok(()) = link.changed() => {
                    let status = link.borrow_and_update().clone();
                    self.session.set_link_status(status);
                }

                event = pointer.recv(), if pointer_open => match event {
                    Some(event) => {
                        self.session.on_pointer(event);
                    }
                    None => {
                        debug!("pointer channel closed");
                        pointer_open = false;
                    }
                },

                _ = frames.tick() => {
                    let outgoing = self.session.render_tick(&mut self.world);
                    self.session.render_controls(&mut self.controls);
                    if let Some(command) = outgoing {
                        self.publish(command).await;
                    }
                }
            }
        }

        if self.sink.is_ready() {
            self.publish(VelocityCommand::zero()).await;
        }
        self.sink.close().await?;
        info!(published = self.published, ticks = self.session.ticks(), "session driver stopped");
        Ok(())
    }

    async fn publish(&mut self, command: VelocityCommand) {
        match self.sink.publish_command(command).await {
            Ok(()) => self.published += 1,
            Err(e) => warn!(error = %e, "command dropped"),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn controls(&self) -> &C {
        &self.controls
    }

    /// Commands successfully handed to the sink.
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Color, RecordingSurface};
    use crate::session::SessionConfig;
    use async_trait::async_trait;
    use odomviz_types::{LinkStatus, Point2, Pose, Scan};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const SOURCE: &str = "odomviz-runtime::test";

    #[derive(Default)]
    struct RecordingSink {
        ready: AtomicBool,
        closed: AtomicBool,
        sent: Mutex<Vec<VelocityCommand>>,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn publish_command(&self, command: VelocityCommand) -> Result<(), VizError> {
            if !self.is_ready() {
                return Err(VizError::NotConnected);
            }
            self.sent.lock().unwrap().push(command);
            Ok(())
        }

        async fn close(&self) -> Result<(), VizError> {
            self.closed.store(true, Ordering::SeqCst);
            self.ready.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    type TestDriver = SessionDriver<RecordingSurface, RecordingSurface>;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            frame_rate_hz: 200,
            publish_divisor: 2,
            ..SessionConfig::default()
        }
    }

    fn driver(bus: &Arc<TelemetryBus>, sink: &Arc<RecordingSink>) -> TestDriver {
        let session = Session::new(fast_config()).unwrap();
        let sink: Arc<dyn CommandSink> = Arc::clone(sink) as Arc<dyn CommandSink>;
        SessionDriver::new(
            session,
            Arc::clone(bus),
            sink,
            RecordingSurface::new(),
            RecordingSurface::new(),
        )
    }

    async fn run_for(
        mut driver: TestDriver,
        handle: DriverHandle,
        inputs: DriverInputs,
        millis: u64,
    ) -> TestDriver {
        let task = tokio::spawn(async move {
            driver.run(inputs).await.unwrap();
            driver
        });
        tokio::time::sleep(Duration::from_millis(millis)).await;
        handle.shutdown();
        task.await.unwrap()
    }

    #[tokio::test]
    async fn bus_updates_reach_the_session() {
        let bus = Arc::new(TelemetryBus::default());
        let sink = Arc::new(RecordingSink::default());
        let (handle, inputs) = driver_channel();
        let driver = driver(&bus, &sink);

        bus.publish_scan(Scan::new(vec![1.0], 0.0, 0.0));
        bus.publish_pose(Pose::new(3.0, 0.0, 0.0));

        let driver = run_for(driver, handle, inputs, 60).await;
        assert_eq!(driver.session().pose(), Pose::new(3.0, 0.0, 0.0));
        assert_eq!(driver.session().history().len(), 2);
        assert!(driver.world().frames() > 0);
        assert_eq!(driver.world().points(Color::RED).len(), 1);
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drag_is_published_and_stopped_on_shutdown() {
        let bus = Arc::new(TelemetryBus::default());
        bus.set_link_status(LinkStatus::Connected, SOURCE);
        let sink = Arc::new(RecordingSink::default());
        sink.ready.store(true, Ordering::SeqCst);
        let (handle, inputs) = driver_channel();
        let driver = driver(&bus, &sink);

        handle
            .send_pointer(PointerEvent::Down(Point2::new(50.0, 50.0)))
            .await
            .unwrap();
        handle
            .send_pointer(PointerEvent::Move(Point2::new(50.0, 0.0)))
            .await
            .unwrap();

        let driver = run_for(driver, handle, inputs, 100).await;
        let sent = sink.sent.lock().unwrap().clone();
        assert!(sent.len() >= 2, "expected drag publishes, got {sent:?}");
        assert!(sent[0].linear_x > 0.0);
        assert_eq!(*sent.last().unwrap(), VelocityCommand::zero());
        assert_eq!(driver.published(), sent.len() as u64);
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn nothing_is_sent_while_disconnected() {
        let bus = Arc::new(TelemetryBus::default());
        let sink = Arc::new(RecordingSink::default());
        let (handle, inputs) = driver_channel();
        let driver = driver(&bus, &sink);

        handle
            .send_pointer(PointerEvent::Down(Point2::zero()))
            .await
            .unwrap();
        handle
            .send_pointer(PointerEvent::Move(Point2::new(30.0, 0.0)))
            .await
            .unwrap();

        let driver = run_for(driver, handle, inputs, 50).await;
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(driver.published(), 0);
        assert!(driver.session().teleop().is_dragging());
        assert_eq!(driver.controls().circles().len(), 2);
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_driver() {
        let bus = Arc::new(TelemetryBus::default());
        let sink = Arc::new(RecordingSink::default());
        let (handle, inputs) = driver_channel();
        let mut driver = driver(&bus, &sink);
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), driver.run(inputs))
            .await
            .expect("driver should stop once its handle is gone")
            .unwrap();
        assert!(sink.closed.load(Ordering::SeqCst));
    }
}
