//! Pointer console – drives the joystick from stdin.
//!
//! Commands (coordinates are controls-surface pixels, y down):
//!   down X Y  – press at (X, Y)
//!   move X Y  – drag to (X, Y)
//!   up        – release (sends a stop)
//!   connect   – (re)open the robot link
//!   disconnect – stop the robot and close the link; the view keeps running
//!   status    – link, pose and latest scan
//!   help      – show this list
//!   quit      – stop the session

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use odomviz_middleware::{CommandSink, RosbridgeClient, TelemetryBus};
use odomviz_runtime::{DriverHandle, PointerEvent};
use odomviz_types::{LinkStatus, Point2, VelocityCommand};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Pointer(PointerEvent),
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
}

/// Parse one console line.  Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb {
        "down" => ConsoleCommand::Pointer(PointerEvent::Down(parse_point(&mut words)?)),
        "move" => ConsoleCommand::Pointer(PointerEvent::Move(parse_point(&mut words)?)),
        "up" => ConsoleCommand::Pointer(PointerEvent::Up),
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    if words.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }
    Ok(Some(command))
}

fn parse_point<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<Point2, String> {
    let mut coord = |axis: &str| -> Result<f32, String> {
        let raw = words.next().ok_or_else(|| format!("missing {axis} coordinate"))?;
        raw.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid {axis} coordinate '{raw}'"))
    };
    let x = coord("x")?;
    let y = coord("y")?;
    Ok(Point2::new(x, y))
}

/// Read commands from stdin until `quit` or EOF, then request shutdown.
pub async fn run(handle: DriverHandle, bus: Arc<TelemetryBus>, link: Arc<RosbridgeClient>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Pointer(event))) => {
                if handle.send_pointer(event).await.is_err() {
                    break;
                }
            }
            Ok(Some(ConsoleCommand::Connect)) => {
                println!("  Connecting to {} …", link.config().endpoint.dimmed());
                if let Err(e) = link.connect().await {
                    println!("{} {}", "Connect failed:".red(), e);
                }
            }
            Ok(Some(ConsoleCommand::Disconnect)) => disconnect(&link).await,
            Ok(Some(ConsoleCommand::Status)) => print_status(&bus),
            Ok(Some(ConsoleCommand::Help)) => print_help(),
            Ok(Some(ConsoleCommand::Quit)) => {
                println!("{}", "Stopping session.".green());
                break;
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e,
                "help".bold()
            ),
        }
    }
    handle.shutdown();
}

async fn disconnect(link: &RosbridgeClient) {
    if link.is_ready()
        && let Err(e) = link.publish_command(VelocityCommand::zero()).await
    {
        println!("{} {}", "Stop command not sent:".yellow(), e);
    }
    match link.close().await {
        Ok(()) => println!("  Link closed. Type {} to reconnect.", "connect".bold()),
        Err(e) => println!("{} {}", "Disconnect failed:".red(), e),
    }
}

fn prompt() {
    print!("{} ", "odomviz>".bold().cyan());
    std::io::stdout().flush().ok();
}

pub fn status_label(status: &LinkStatus) -> colored::ColoredString {
    match status {
        LinkStatus::Connected => status.label().green(),
        LinkStatus::Error(_) => status.label().red(),
        _ => status.label().normal(),
    }
}

fn print_status(bus: &TelemetryBus) {
    let status = bus.link_status();
    let pose = bus.latest_pose();
    let scan = bus.latest_scan();
    println!("  Link : {}", status_label(&status));
    if let LinkStatus::Error(reason) = &status {
        println!("         {}", reason.dimmed());
    }
    println!(
        "  Pose : x={:.3} y={:.3} heading={:.3} rad",
        pose.x, pose.y, pose.heading
    );
    if scan.is_empty() {
        println!("  Scan : {}", "none received".dimmed());
        return;
    }
    let returns = scan.ranges.iter().filter(|r| r.is_finite() && **r >= 0.0).count();
    println!("  Scan : {} samples, {} returns", scan.ranges.len(), returns);
}

fn print_help() {
    println!();
    println!("{}", "Pointer console".bold().underline());
    println!("  {}  – press the joystick at (X, Y)", "down X Y".bold().cyan());
    println!("  {}  – drag to (X, Y)", "move X Y".bold().cyan());
    println!("  {}        – release and stop the robot", "up".bold().cyan());
    println!("  {}   – open the robot link", "connect".bold().cyan());
    println!("  {} – stop the robot and close the link", "disconnect".bold().cyan());
    println!("  {}    – link, pose and scan summary", "status".bold().cyan());
    println!("  {}      – stop the session", "quit".bold().cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pointer_commands() {
        assert_eq!(
            parse_line("down 200 150").unwrap(),
            Some(ConsoleCommand::Pointer(PointerEvent::Down(Point2::new(200.0, 150.0))))
        );
        assert_eq!(
            parse_line("  move -3.5 7 ").unwrap(),
            Some(ConsoleCommand::Pointer(PointerEvent::Move(Point2::new(-3.5, 7.0))))
        );
        assert_eq!(
            parse_line("up").unwrap(),
            Some(ConsoleCommand::Pointer(PointerEvent::Up))
        );
    }

    #[test]
    fn parses_control_commands() {
        assert_eq!(parse_line("status").unwrap(), Some(ConsoleCommand::Status));
        assert_eq!(parse_line("connect").unwrap(), Some(ConsoleCommand::Connect));
        assert_eq!(
            parse_line(" disconnect ").unwrap(),
            Some(ConsoleCommand::Disconnect)
        );
        assert_eq!(parse_line("help").unwrap(), Some(ConsoleCommand::Help));
        assert_eq!(parse_line("exit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_line("down 1").is_err());
        assert!(parse_line("move x 2").is_err());
        assert!(parse_line("move 1 NaN").is_err());
        assert!(parse_line("up now").is_err());
        assert!(parse_line("connect ws://robot:9090").is_err());
        assert!(parse_line("jump").is_err());
    }
}
