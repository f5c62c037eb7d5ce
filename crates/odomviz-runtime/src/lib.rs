//! `odomviz-runtime` – the per-robot session and the loop that drives it.
//!
//! # Modules
//!
//! - [`render`] – [`RenderSurface`], the drawing contract a display
//!   implements, plus [`RecordingSurface`] which keeps the draw list.
//! - [`session`] – [`Session`]: the context object owning the current scan,
//!   pose, history and joystick.  Scan/pose handlers and the render tick are
//!   its only writers.
//! - [`driver`] – [`SessionDriver`]: cooperative async loop that feeds a
//!   session from the telemetry bus and pointer channel, ticks it at the
//!   frame rate and publishes the sampled commands.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP exporter setup.

pub mod driver;
pub mod render;
pub mod session;
pub mod telemetry;

pub use driver::{DriverHandle, DriverInputs, SessionDriver, driver_channel};
pub use render::{Color, DrawCommand, RecordingSurface, RenderSurface};
pub use session::{PointerEvent, Session, SessionConfig};
