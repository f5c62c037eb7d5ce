//! `odomviz` – robot session from the terminal.
//!
//! 1. Loads `~/.odomviz/config.toml`, writing the defaults there on first
//!    run, and applies `ODOMVIZ_*` overrides.
//! 2. Connects to the robot's rosbridge endpoint and subscribes to its scan
//!    and odometry topics.
//! 3. Runs the session loop headless while a stdin console feeds joystick
//!    events.
//!    `disconnect` / `connect` drop and re-open the link without stopping
//!    the view.
//! 4. On Ctrl-C or `quit`, sends a final stop command, unsubscribes and
//!    closes the link.

mod config;
mod console;

use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use odomviz_middleware::{CommandSink, EventReceiver, RosbridgeClient, TelemetryBus};
use odomviz_runtime::{RecordingSurface, Session, SessionDriver, driver_channel};
use odomviz_types::{EventPayload, LinkStatus, VizError};

fn main() {
    let _telemetry = odomviz_runtime::telemetry::init_tracing("odomviz");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let defaults = config::Config::default();
            match config::save(&defaults) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            let mut cfg = defaults;
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(run(cfg));
    // stdin reads run on a blocking thread that never returns by itself
    runtime.shutdown_timeout(Duration::from_millis(500));

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cfg: config::Config) -> Result<(), VizError> {
    let session = Session::new(cfg.session_config())?;
    let bus = Arc::new(TelemetryBus::default());
    let client = Arc::new(RosbridgeClient::new(cfg.rosbridge_config(), Arc::clone(&bus))?);
    let (handle, inputs) = driver_channel();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let ctrlc_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        ctrlc_handle.shutdown();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use `quit` to stop the session");
    }

    let status_printer = tokio::spawn(print_events(bus.subscribe_events()));

    println!("  Connecting to {} …", cfg.endpoint.dimmed());
    if let Err(e) = client.connect().await {
        // local display keeps working without a link
        warn!(error = %e, "continuing without a robot link");
    }

    println!(
        "  Type {} for a list of commands.\n",
        "help".bold().cyan()
    );
    let console = tokio::spawn(console::run(
        handle.clone(),
        Arc::clone(&bus),
        Arc::clone(&client),
    ));
    drop(handle);

    let sink: Arc<dyn CommandSink> = client;
    let mut driver = SessionDriver::new(
        session,
        Arc::clone(&bus),
        sink,
        RecordingSurface::new(),
        RecordingSurface::new(),
    );
    let outcome = driver.run(inputs).await;

    console.abort();
    status_printer.abort();

    let session = driver.session();
    println!(
        "  {} {} frames, {} commands sent, {} snapshots kept.",
        "✓".green().bold(),
        session.ticks(),
        driver.published(),
        session.history().len()
    );
    outcome
}

async fn print_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event.payload {
            EventPayload::Link(status) => {
                println!("\n  Link: {}", console::status_label(&status));
                if let LinkStatus::Error(reason) = &status {
                    println!("        {}", reason.dimmed());
                }
            }
            EventPayload::MalformedFrame { topic, reason } => {
                println!(
                    "\n  {} on {}: {}",
                    "Dropped frame".yellow(),
                    topic.bold(),
                    reason.dimmed()
                );
            }
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"            __                      _     "#.bold().cyan());
    println!("{}", r#"  ___  ___/ /__  __ _ _  __(_)___  "#.bold().cyan());
    println!("{}", r#" / _ \/ _  / _ \/  ' \ |/ / /_ /  "#.bold().cyan());
    println!("{}", r#" \___/\_,_/\___/_/_/_/___/_//__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "odomviz".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Laser scan and odometry viewer with joystick teleop");
    println!();
}
