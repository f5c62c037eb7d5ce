//! `odomviz-perception` – sensor frames and the trajectory history.
//!
//! # Modules
//!
//! - [`frame`] – yaw extraction from an orientation quaternion, pose
//!   decoding, and the polar→Cartesian projection of a range scan
//!   ([`project`][frame::project]).
//! - [`history`] – [`HistoryBuffer`][history::HistoryBuffer]: a bounded,
//!   oldest-first record of `(scan, pose)` [`Snapshot`][history::Snapshot]s
//!   admitted only when the robot has moved or turned enough
//!   ([`AdmissionGate`][history::AdmissionGate]).

pub mod frame;
pub mod history;

pub use frame::{Quaternion, ScanProjection, pose_from_message, project, yaw_from_quaternion};
pub use history::{AdmissionGate, HistoryBuffer, Snapshot};
