//! Virtual joystick.
//!
//! The operator presses anywhere on the controls surface to plant an
//! anchor, then drags.  The drag vector (screen y flipped so that "up" is
//! forward) is clamped to a circle of `max_radius` and normalised into a
//! [`VelocityCommand`]: vertical deflection drives forward speed, horizontal
//! deflection drives yaw rate.
//!
//! ```text
//!   Idle ──begin(anchor)──▶ Dragging ──end()──▶ Idle (+ one zero command)
//!                            │    ▲
//!                            └────┘ update(pointer)
//! ```
//!
//! # Example
//!
//! ```rust
//! use odomviz_teleop::joystick::{TeleopConfig, TeleopController};
//! use odomviz_types::Point2;
//!
//! let mut stick = TeleopController::new(TeleopConfig::default()).unwrap();
//! stick.begin(Point2::new(200.0, 200.0));
//!
//! // Drag straight up by half the radius: half speed forward.
//! let cmd = stick.update(Point2::new(200.0, 150.0)).unwrap();
//! assert!((cmd.linear_x - 0.5 * TeleopConfig::default().linear_gain).abs() < 1e-5);
//! assert!(cmd.angular_z.abs() < 1e-5);
//! ```

use odomviz_types::{Point2, VelocityCommand, VizError};
use tracing::{debug, trace};

/// Joystick radius in controls-surface pixels (desktop pointer).
pub const DEFAULT_MAX_RADIUS: f32 = 100.0;
/// Multiplier applied to the normalised forward deflection.
pub const DEFAULT_LINEAR_GAIN: f32 = 2.0;

/// Tuning knobs for [`TeleopController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleopConfig {
    /// Deflection (pixels) that maps to full scale.  Larger drags are clamped.
    pub max_radius: f32,
    /// Scales `linear_x` after normalisation.
    pub linear_gain: f32,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            max_radius: DEFAULT_MAX_RADIUS,
            linear_gain: DEFAULT_LINEAR_GAIN,
        }
    }
}

impl TeleopConfig {
    /// Check that the radius is a positive finite number and the gain finite.
    pub fn validate(&self) -> Result<(), VizError> {
        if !self.max_radius.is_finite() || self.max_radius <= 0.0 {
            return Err(VizError::InvalidConfig(format!(
                "joystick max_radius must be positive, got {}",
                self.max_radius
            )));
        }
        if !self.linear_gain.is_finite() {
            return Err(VizError::InvalidConfig(format!(
                "linear_gain must be finite, got {}",
                self.linear_gain
            )));
        }
        Ok(())
    }
}

/// Clamp `offset` to a circle of `radius`, preserving its direction.
///
/// The angle is recomputed with `atan2` and the magnitude set to exactly
/// `radius`; components are never truncated independently.  Offsets inside
/// the circle are returned unchanged.
pub fn clamp_to_radius(offset: Point2, radius: f32) -> Point2 {
    if offset.norm_squared() > radius * radius {
        let angle = offset.y.atan2(offset.x);
        Point2::new(radius * angle.cos(), radius * angle.sin())
    } else {
        offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Dragging { anchor: Point2, offset: Point2 },
}

/// Pointer-driven drag state machine producing velocity commands.
///
/// [`update`][Self::update] may run once per pointer event; the command that
/// actually leaves the process is sampled separately through
/// [`take_outgoing`][Self::take_outgoing] on the publish tick.
#[derive(Debug, Clone)]
pub struct TeleopController {
    config: TeleopConfig,
    state: DragState,
    command: VelocityCommand,
    stop_pending: bool,
}

impl TeleopController {
    pub fn new(config: TeleopConfig) -> Result<Self, VizError> {
        config.validate()?;
        Ok(Self {
            config,
            state: DragState::Idle,
            command: VelocityCommand::zero(),
            stop_pending: false,
        })
    }

    pub fn config(&self) -> &TeleopConfig {
        &self.config
    }

    /// Start a drag at `anchor` (controls-surface coordinates, y down).
    ///
    /// Returns `false` and changes nothing when a drag is already active:
    /// only one pointer controls the robot.
    pub fn begin(&mut self, anchor: Point2) -> bool {
        if self.is_dragging() {
            debug!(x = anchor.x, y = anchor.y, "second pointer ignored");
            return false;
        }
        self.state = DragState::Dragging {
            anchor,
            offset: Point2::zero(),
        };
        true
    }

    /// Move the active pointer to `pointer` and recompute the command.
    ///
    /// Returns `None` when idle.
    pub fn update(&mut self, pointer: Point2) -> Option<VelocityCommand> {
        let DragState::Dragging { anchor, .. } = self.state else {
            return None;
        };
        // screen y grows downward; forward is up
        let raw = Point2::new(pointer.x - anchor.x, anchor.y - pointer.y);
        let offset = clamp_to_radius(raw, self.config.max_radius);
        self.state = DragState::Dragging { anchor, offset };
        self.command = self.normalise(offset);
        trace!(
            linear_x = self.command.linear_x,
            angular_z = self.command.angular_z,
            "joystick moved"
        );
        Some(self.command)
    }

    /// Release the pointer.
    ///
    /// Always returns the zero command and arms it as the next outgoing
    /// command, so the robot receives an explicit stop.
    pub fn end(&mut self) -> VelocityCommand {
        if self.is_dragging() {
            debug!("joystick released");
        }
        self.state = DragState::Idle;
        self.command = VelocityCommand::zero();
        self.stop_pending = true;
        self.command
    }

    /// Latest computed command.  Zero while idle.
    pub fn current_command(&self) -> VelocityCommand {
        self.command
    }

    /// The command to transmit on this publish slot, if any.
    ///
    /// A pending stop is handed out exactly once; while dragging the current
    /// command is returned every slot; idle with nothing pending yields `None`.
    pub fn take_outgoing(&mut self) -> Option<VelocityCommand> {
        if self.stop_pending {
            self.stop_pending = false;
            return Some(VelocityCommand::zero());
        }
        self.is_dragging().then_some(self.command)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Anchor of the active drag.
    pub fn anchor(&self) -> Option<Point2> {
        match self.state {
            DragState::Dragging { anchor, .. } => Some(anchor),
            DragState::Idle => None,
        }
    }

    /// Clamped drag offset (y up) of the active drag.
    pub fn offset(&self) -> Option<Point2> {
        match self.state {
            DragState::Dragging { offset, .. } => Some(offset),
            DragState::Idle => None,
        }
    }

    fn normalise(&self, offset: Point2) -> VelocityCommand {
        let radius = self.config.max_radius;
        if offset.norm_squared() == 0.0 || radius <= 0.0 {
            return VelocityCommand::zero();
        }
        VelocityCommand::new(
            offset.y / radius * self.config.linear_gain,
            offset.x / radius,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_gain(radius: f32) -> TeleopController {
        TeleopController::new(TeleopConfig {
            max_radius: radius,
            linear_gain: 1.0,
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let zero_radius = TeleopConfig {
            max_radius: 0.0,
            ..TeleopConfig::default()
        };
        assert!(TeleopController::new(zero_radius).is_err());
        let nan_gain = TeleopConfig {
            linear_gain: f32::NAN,
            ..TeleopConfig::default()
        };
        assert!(TeleopController::new(nan_gain).is_err());
    }

    #[test]
    fn clamp_preserves_direction_and_caps_magnitude() {
        let clamped = clamp_to_radius(Point2::new(300.0, 400.0), 100.0);
        assert!((clamped.norm() - 100.0).abs() < 1e-3);
        let expected = 400.0_f32.atan2(300.0);
        assert!((clamped.y.atan2(clamped.x) - expected).abs() < 1e-5);
        assert!((clamped.x - 60.0).abs() < 1e-3);
        assert!((clamped.y - 80.0).abs() < 1e-3);
    }

    #[test]
    fn clamp_leaves_short_offsets_alone() {
        let offset = Point2::new(30.0, -40.0);
        assert_eq!(clamp_to_radius(offset, 100.0), offset);
    }

    #[test]
    fn update_inverts_screen_y_and_clamps() {
        let mut stick = unit_gain(100.0);
        assert!(stick.begin(Point2::zero()));
        // pointer below-right on screen: backwards and to the right
        let cmd = stick.update(Point2::new(300.0, 400.0)).unwrap();
        let offset = stick.offset().unwrap();
        assert!((offset.norm() - 100.0).abs() < 1e-3);
        assert!((offset.y.atan2(offset.x) - (-400.0_f32).atan2(300.0)).abs() < 1e-5);
        assert!((cmd.linear_x + 0.8).abs() < 1e-5);
        assert!((cmd.angular_z - 0.6).abs() < 1e-5);
    }

    #[test]
    fn command_is_normalised_into_unit_range() {
        let mut stick = unit_gain(50.0);
        stick.begin(Point2::new(10.0, 10.0));
        for pointer in [
            Point2::new(1000.0, 10.0),
            Point2::new(10.0, -1000.0),
            Point2::new(-500.0, 700.0),
            Point2::new(35.0, -15.0),
        ] {
            let cmd = stick.update(pointer).unwrap();
            assert!((-1.0..=1.0).contains(&cmd.linear_x), "{cmd:?}");
            assert!((-1.0..=1.0).contains(&cmd.angular_z), "{cmd:?}");
        }
    }

    #[test]
    fn linear_gain_scales_forward_only() {
        let mut stick = TeleopController::new(TeleopConfig {
            max_radius: 100.0,
            linear_gain: 2.0,
        })
        .unwrap();
        stick.begin(Point2::zero());
        let cmd = stick.update(Point2::new(50.0, -50.0)).unwrap();
        assert!((cmd.linear_x - 1.0).abs() < 1e-5);
        assert!((cmd.angular_z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn zero_length_drag_gives_zero_command() {
        let mut stick = unit_gain(100.0);
        stick.begin(Point2::new(7.0, 7.0));
        let cmd = stick.update(Point2::new(7.0, 7.0)).unwrap();
        assert!(cmd.is_zero());
        assert!(!cmd.linear_x.is_nan());
    }

    #[test]
    fn second_begin_is_ignored() {
        let mut stick = unit_gain(100.0);
        assert!(stick.begin(Point2::new(1.0, 1.0)));
        assert!(!stick.begin(Point2::new(50.0, 50.0)));
        assert_eq!(stick.anchor(), Some(Point2::new(1.0, 1.0)));
    }

    #[test]
    fn update_while_idle_does_nothing() {
        let mut stick = unit_gain(100.0);
        assert!(stick.update(Point2::new(5.0, 5.0)).is_none());
        assert!(stick.current_command().is_zero());
    }

    #[test]
    fn end_yields_exactly_one_zero_command() {
        let mut stick = unit_gain(100.0);
        stick.begin(Point2::zero());
        stick.update(Point2::new(0.0, -80.0));
        assert!(stick.current_command().linear_x > 0.0);

        assert!(stick.end().is_zero());
        assert!(!stick.is_dragging());
        assert_eq!(stick.take_outgoing(), Some(VelocityCommand::zero()));
        assert_eq!(stick.take_outgoing(), None);
        assert_eq!(stick.take_outgoing(), None);
    }

    #[test]
    fn end_without_drag_still_sends_stop() {
        let mut stick = unit_gain(100.0);
        assert!(stick.end().is_zero());
        assert_eq!(stick.take_outgoing(), Some(VelocityCommand::zero()));
        assert_eq!(stick.take_outgoing(), None);
    }

    #[test]
    fn dragging_republishes_current_command_each_slot() {
        let mut stick = unit_gain(100.0);
        stick.begin(Point2::zero());
        let cmd = stick.update(Point2::new(20.0, -10.0)).unwrap();
        assert_eq!(stick.take_outgoing(), Some(cmd));
        assert_eq!(stick.take_outgoing(), Some(cmd));
    }
}
