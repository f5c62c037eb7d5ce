//! `odomviz-teleop` – virtual joystick teleoperation.
//!
//! # Modules
//!
//! - [`joystick`] – [`TeleopController`][joystick::TeleopController]: a
//!   single-pointer drag state machine that turns a drag vector into a
//!   radially clamped, normalised [`VelocityCommand`][odomviz_types::VelocityCommand].
//! - [`throttle`] – [`PublishThrottle`][throttle::PublishThrottle]: samples
//!   the controller's current command once every K render frames so pointer
//!   event frequency never reaches the command channel.

pub mod joystick;
pub mod throttle;

pub use joystick::{TeleopConfig, TeleopController, clamp_to_radius};
pub use throttle::PublishThrottle;
