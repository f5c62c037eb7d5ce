//! Per-robot session state and the render tick.
//!
//! A [`Session`] owns everything the display needs: the latest scan and
//! pose, the trajectory [`HistoryBuffer`], the joystick and the publish
//! throttle.  It is created when the operator starts viewing a robot and
//! dropped when they stop; nothing lives in globals.
//!
//! Writers:
//!
//! * [`Session::on_scan`] / [`Session::on_pose`] – called for each inbound
//!   message.  A pose arrival also offers a snapshot to the history.
//! * [`Session::on_pointer`] – pointer events from the controls surface.
//! * [`Session::render_tick`] – once per display frame; draws the world view
//!   and, on publish slots, hands back the command to transmit.
//!
//! All of them take `&mut self`, so one task drives a session and no locking
//! is needed.

use std::time::Duration;

use odomviz_perception::history::DEFAULT_CAPACITY;
use odomviz_perception::{AdmissionGate, HistoryBuffer, Snapshot, project};
use odomviz_teleop::throttle::DEFAULT_PUBLISH_DIVISOR;
use odomviz_teleop::{PublishThrottle, TeleopConfig, TeleopController};
use odomviz_types::{LinkStatus, Point2, Pose, Scan, VelocityCommand, VizError};
use tracing::{debug, info};

use crate::render::{Color, RenderSurface};

/// Half the viewport height (400 px) over a 10 m maximum range.
pub const DEFAULT_PIXELS_PER_METER: f32 = 40.0;
/// 26 inches.
pub const DEFAULT_ROBOT_LENGTH_M: f32 = 0.6604;
pub const DEFAULT_FRAME_RATE_HZ: u32 = 60;

/// Everything a [`Session`] can be tuned with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub history_capacity: usize,
    pub gate: AdmissionGate,
    pub teleop: TeleopConfig,
    /// Render ticks per command publish slot (K).
    pub publish_divisor: u32,
    /// World-to-pixel scale of the main view.
    pub pixels_per_meter: f32,
    /// Drawn as the diameter of the robot marker.
    pub robot_length_m: f32,
    /// `Some(alpha < 1)` fades the previous frame instead of clearing it.
    pub fade_alpha: Option<f32>,
    /// Also draw every stored snapshot's scan, in grey.
    pub draw_history_scans: bool,
    pub frame_rate_hz: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            gate: AdmissionGate::default(),
            teleop: TeleopConfig::default(),
            publish_divisor: DEFAULT_PUBLISH_DIVISOR,
            pixels_per_meter: DEFAULT_PIXELS_PER_METER,
            robot_length_m: DEFAULT_ROBOT_LENGTH_M,
            fade_alpha: None,
            draw_history_scans: false,
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), VizError> {
        AdmissionGate::new(self.gate.distance_threshold_sq, self.gate.heading_threshold)?;
        self.teleop.validate()?;
        if self.history_capacity == 0 {
            return Err(VizError::InvalidConfig("history capacity must be > 0".to_string()));
        }
        if self.publish_divisor == 0 {
            return Err(VizError::InvalidConfig("publish divisor must be > 0".to_string()));
        }
        if !self.pixels_per_meter.is_finite() || self.pixels_per_meter <= 0.0 {
            return Err(VizError::InvalidConfig(format!(
                "pixels_per_meter must be positive, got {}",
                self.pixels_per_meter
            )));
        }
        if !self.robot_length_m.is_finite() || self.robot_length_m < 0.0 {
            return Err(VizError::InvalidConfig(format!(
                "robot_length_m must be non-negative, got {}",
                self.robot_length_m
            )));
        }
        if let Some(alpha) = self.fade_alpha
            && !(alpha > 0.0 && alpha <= 1.0)
        {
            return Err(VizError::InvalidConfig(format!(
                "fade_alpha must be in (0, 1], got {alpha}"
            )));
        }
        if self.frame_rate_hz == 0 {
            return Err(VizError::InvalidConfig("frame rate must be > 0".to_string()));
        }
        Ok(())
    }

    /// Time between render ticks.
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.frame_rate_hz.max(1)))
    }
}

/// Pointer input in controls-surface pixels (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point2),
    Move(Point2),
    Up,
}

/// Live state of one robot session.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    scan: Scan,
    scan_received: bool,
    pose: Pose,
    history: HistoryBuffer,
    teleop: TeleopController,
    throttle: PublishThrottle,
    link: LinkStatus,
    ticks: u64,
}

impl Session {
    /// Start a session.  The history is seeded with an empty scan at the
    /// origin so it is never empty.
    pub fn new(config: SessionConfig) -> Result<Self, VizError> {
        config.validate()?;
        let history = HistoryBuffer::seeded(
            config.history_capacity,
            Snapshot::new(Scan::default(), Pose::default()),
        )?;
        let teleop = TeleopController::new(config.teleop)?;
        let throttle = PublishThrottle::new(config.publish_divisor)?;
        info!(
            capacity = config.history_capacity,
            publish_divisor = config.publish_divisor,
            "session started"
        );
        Ok(Self {
            config,
            scan: Scan::default(),
            scan_received: false,
            pose: Pose::default(),
            history,
            teleop,
            throttle,
            link: LinkStatus::default(),
            ticks: 0,
        })
    }

    // ── Inbound messages ────────────────────────────────────────────────────

    /// Replace the current scan.
    pub fn on_scan(&mut self, scan: Scan) {
        self.scan = scan;
        self.scan_received = true;
    }

    /// Replace the current pose and offer a snapshot to the history.
    ///
    /// The snapshot pairs the new pose with a copy of the latest scan, or the
    /// newest stored scan when no scan has arrived yet.  Returns whether the
    /// snapshot was admitted.
    pub fn on_pose(&mut self, pose: Pose) -> bool {
        self.pose = pose;
        // most poses are rejected; only copy the scan for ones that pass
        if let Some(newest) = self.history.newest()
            && !self.config.gate.admits(&newest.pose, &pose)
        {
            return false;
        }
        let scan = if self.scan_received {
            self.scan.clone()
        } else {
            self.history
                .newest()
                .map(|s| s.scan.clone())
                .unwrap_or_default()
        };
        self.history.offer_gated(Snapshot::new(scan, pose), &self.config.gate)
    }

    /// Feed one pointer event to the joystick.
    ///
    /// Returns the command it produced, if any: the drag command on `Move`,
    /// the zero command on `Up`.  Publishing is still left to the render tick.
    pub fn on_pointer(&mut self, event: PointerEvent) -> Option<VelocityCommand> {
        match event {
            PointerEvent::Down(at) => {
                self.teleop.begin(at);
                None
            }
            PointerEvent::Move(at) => self.teleop.update(at),
            PointerEvent::Up => Some(self.teleop.end()),
        }
    }

    pub fn set_link_status(&mut self, status: LinkStatus) {
        if self.link != status {
            debug!(status = %status, "session link status");
            self.link = status;
        }
    }

    // ── Render ──────────────────────────────────────────────────────────────

    /// Draw one frame of the world view and sample the publish throttle.
    ///
    /// The view is centred on the robot: scans are rotated by the heading
    /// they were captured at and history is translated by its offset from the
    /// current pose.  Returns `Some(command)` on a publish slot that has a
    /// command to send.
    pub fn render_tick(&mut self, surface: &mut dyn RenderSurface) -> Option<VelocityCommand> {
        self.ticks += 1;
        let scale = self.config.pixels_per_meter;
        let here = self.pose.position();

        surface.clear_or_fade(Color::WHITE, self.config.fade_alpha.unwrap_or(1.0));

        if self.config.draw_history_scans {
            for snapshot in self.history.snapshots() {
                let offset = snapshot.pose.position().sub(here).scale(scale);
                for point in project(&snapshot.scan, snapshot.pose.heading, scale) {
                    surface.draw_point(point.add(offset), Color::GREY);
                }
            }
        }

        for point in project(&self.scan, self.pose.heading, scale) {
            surface.draw_point(point, Color::RED);
        }

        let trail: Vec<Point2> = self
            .history
            .snapshots()
            .map(|s| s.pose.position().sub(here).scale(scale))
            .collect();
        surface.draw_line_path(&trail, Color::GREEN);

        let radius = scale * self.config.robot_length_m / 2.0;
        surface.draw_circle(Point2::zero(), radius, Color::BLACK, Some(Color::WHITE));
        let nose = Point2::new(radius * self.pose.heading.cos(), radius * self.pose.heading.sin());
        surface.draw_line_path(&[Point2::zero(), nose], Color::BLACK);

        if self.throttle.tick(self.link.is_ready()) {
            self.teleop.take_outgoing()
        } else {
            None
        }
    }

    /// Draw the joystick overlay on the controls surface.
    pub fn render_controls(&self, surface: &mut dyn RenderSurface) {
        surface.clear_or_fade(Color::WHITE, 1.0);
        let (Some(anchor), Some(offset)) = (self.teleop.anchor(), self.teleop.offset()) else {
            return;
        };
        let radius = self.teleop.config().max_radius;
        surface.draw_circle(anchor, radius, Color::BLUE, None);
        // offset is y-up; the controls surface is y-down
        let knob = Point2::new(anchor.x + offset.x, anchor.y - offset.y);
        surface.draw_circle(knob, radius / 10.0, Color::BLUE, Some(Color::BLUE));
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scan(&self) -> &Scan {
        &self.scan
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn teleop(&self) -> &TeleopController {
        &self.teleop
    }

    pub fn link_status(&self) -> &LinkStatus {
        &self.link
    }

    /// Render ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
