//! Configuration vault – reads/writes `~/.odomviz/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use odomviz_middleware::{RosbridgeConfig, TopicSpec};
use odomviz_perception::AdmissionGate;
use odomviz_perception::history::{
    DEFAULT_CAPACITY, DEFAULT_DISTANCE_THRESHOLD_SQ, DEFAULT_HEADING_THRESHOLD,
};
use odomviz_runtime::SessionConfig;
use odomviz_runtime::session::{
    DEFAULT_FRAME_RATE_HZ, DEFAULT_PIXELS_PER_METER, DEFAULT_ROBOT_LENGTH_M,
};
use odomviz_teleop::TeleopConfig;
use odomviz_teleop::joystick::{DEFAULT_LINEAR_GAIN, DEFAULT_MAX_RADIUS};
use odomviz_teleop::throttle::DEFAULT_PUBLISH_DIVISOR;

/// Persisted operator configuration stored in `~/.odomviz/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// rosbridge websocket URL of the robot.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Squared metres the robot must move before a snapshot is kept.
    #[serde(default = "default_distance_threshold_sq")]
    pub distance_threshold_sq: f32,

    /// Radians the robot must turn before a snapshot is kept.
    #[serde(default = "default_heading_threshold")]
    pub heading_threshold: f32,

    #[serde(default = "default_joystick_radius")]
    pub joystick_radius: f32,

    #[serde(default = "default_linear_gain")]
    pub linear_gain: f32,

    /// Render frames per published command.
    #[serde(default = "default_publish_divisor")]
    pub publish_divisor: u32,

    #[serde(default = "default_pixels_per_meter")]
    pub pixels_per_meter: f32,

    #[serde(default = "default_robot_length_m")]
    pub robot_length_m: f32,

    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_alpha: Option<f32>,

    #[serde(default)]
    pub draw_history_scans: bool,

    #[serde(default = "default_scan_topic")]
    pub scan_topic: String,

    /// Minimum milliseconds between forwarded scans.
    #[serde(default = "default_scan_throttle_ms")]
    pub scan_throttle_ms: u32,

    #[serde(default = "default_odometry_topic")]
    pub odometry_topic: String,

    #[serde(default = "default_command_topic")]
    pub command_topic: String,
}

fn default_endpoint() -> String {
    RosbridgeConfig::default().endpoint
}
fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_distance_threshold_sq() -> f32 {
    DEFAULT_DISTANCE_THRESHOLD_SQ
}
fn default_heading_threshold() -> f32 {
    DEFAULT_HEADING_THRESHOLD
}
fn default_joystick_radius() -> f32 {
    DEFAULT_MAX_RADIUS
}
fn default_linear_gain() -> f32 {
    DEFAULT_LINEAR_GAIN
}
fn default_publish_divisor() -> u32 {
    DEFAULT_PUBLISH_DIVISOR
}
fn default_pixels_per_meter() -> f32 {
    DEFAULT_PIXELS_PER_METER
}
fn default_robot_length_m() -> f32 {
    DEFAULT_ROBOT_LENGTH_M
}
fn default_frame_rate_hz() -> u32 {
    DEFAULT_FRAME_RATE_HZ
}
fn default_scan_topic() -> String {
    RosbridgeConfig::default().scan.name
}
fn default_scan_throttle_ms() -> u32 {
    RosbridgeConfig::default().scan.throttle_rate.unwrap_or(0)
}
fn default_odometry_topic() -> String {
    RosbridgeConfig::default().odometry.name
}
fn default_command_topic() -> String {
    RosbridgeConfig::default().command.name
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            history_capacity: default_history_capacity(),
            distance_threshold_sq: default_distance_threshold_sq(),
            heading_threshold: default_heading_threshold(),
            joystick_radius: default_joystick_radius(),
            linear_gain: default_linear_gain(),
            publish_divisor: default_publish_divisor(),
            pixels_per_meter: default_pixels_per_meter(),
            robot_length_m: default_robot_length_m(),
            frame_rate_hz: default_frame_rate_hz(),
            fade_alpha: None,
            draw_history_scans: false,
            scan_topic: default_scan_topic(),
            scan_throttle_ms: default_scan_throttle_ms(),
            odometry_topic: default_odometry_topic(),
            command_topic: default_command_topic(),
        }
    }
}

impl Config {
    /// Session tuning derived from this file.  Validated by `Session::new`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history_capacity: self.history_capacity,
            gate: AdmissionGate {
                distance_threshold_sq: self.distance_threshold_sq,
                heading_threshold: self.heading_threshold,
            },
            teleop: TeleopConfig {
                max_radius: self.joystick_radius,
                linear_gain: self.linear_gain,
            },
            publish_divisor: self.publish_divisor,
            pixels_per_meter: self.pixels_per_meter,
            robot_length_m: self.robot_length_m,
            fade_alpha: self.fade_alpha,
            draw_history_scans: self.draw_history_scans,
            frame_rate_hz: self.frame_rate_hz,
        }
    }

    /// Transport settings derived from this file.
    pub fn rosbridge_config(&self) -> RosbridgeConfig {
        let defaults = RosbridgeConfig::default();
        let mut scan = TopicSpec::new(self.scan_topic.clone(), defaults.scan.msg_type)
            .with_queue_length(1);
        if self.scan_throttle_ms > 0 {
            scan = scan.with_throttle_rate(self.scan_throttle_ms);
        }
        RosbridgeConfig {
            endpoint: self.endpoint.clone(),
            scan,
            odometry: TopicSpec::new(self.odometry_topic.clone(), defaults.odometry.msg_type)
                .with_queue_length(1),
            command: TopicSpec::new(self.command_topic.clone(), defaults.command.msg_type),
        }
    }
}

/// Return the path to `~/.odomviz/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".odomviz").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    Ok(load_from(&config_path())?.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ODOMVIZ_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ODOMVIZ_ENDPOINT` | `endpoint` |
/// | `ODOMVIZ_HISTORY_CAPACITY` | `history_capacity` |
/// | `ODOMVIZ_JOYSTICK_RADIUS` | `joystick_radius` |
/// | `ODOMVIZ_LINEAR_GAIN` | `linear_gain` |
/// | `ODOMVIZ_PUBLISH_DIVISOR` | `publish_divisor` |
/// | `ODOMVIZ_PIXELS_PER_METER` | `pixels_per_meter` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ODOMVIZ_ENDPOINT") {
        cfg.endpoint = v;
    }
    if let Ok(v) = std::env::var("ODOMVIZ_HISTORY_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.history_capacity = n;
    }
    if let Ok(v) = std::env::var("ODOMVIZ_JOYSTICK_RADIUS")
        && let Ok(r) = v.parse::<f32>()
    {
        cfg.joystick_radius = r;
    }
    if let Ok(v) = std::env::var("ODOMVIZ_LINEAR_GAIN")
        && let Ok(g) = v.parse::<f32>()
    {
        cfg.linear_gain = g;
    }
    if let Ok(v) = std::env::var("ODOMVIZ_PUBLISH_DIVISOR")
        && let Ok(k) = v.parse::<u32>()
    {
        cfg.publish_divisor = k;
    }
    if let Ok(v) = std::env::var("ODOMVIZ_PIXELS_PER_METER")
        && let Ok(s) = v.parse::<f32>()
    {
        cfg.pixels_per_meter = s;
    }
}

/// Save the config to disk, creating `~/.odomviz/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
