use std::str::FromStr;

use crate::capture::types::{CaptureView, SensorFrame};
use crate::device::types::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Toggle,
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "connect" | "c" => Ok(ConsoleCommand::Connect),
            "disconnect" | "d" => Ok(ConsoleCommand::Disconnect),
            "toggle" | "t" => Ok(ConsoleCommand::Toggle),
            "start" | "s" => Ok(ConsoleCommand::Start),
            "stop" | "x" => Ok(ConsoleCommand::Stop),
            "status" | "" => Ok(ConsoleCommand::Status),
            "help" | "h" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "q" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(format!("Unknown command {:?}, type help for a list", other)),
        }
    }
}

pub const HELP: &str = "\
commands:
  connect (c)     scan for the glove and connect
  disconnect (d)  disconnect from the glove
  toggle (t)      connect or disconnect
  start (s)       start capturing letters (requires a connection)
  stop (x)        stop capturing
  status          print the current state
  quit (q)        exit";

fn format_vector(values: &[f32]) -> String {
    values.iter().map(|value| format!("{:6.2}", value)).collect::<Vec<_>>().join(" ")
}

pub fn describe_capture(view: &CaptureView) -> String {
    let state = if view.is_active {
        "capturing"
    } else if view.is_complete() {
        "complete"
    } else {
        "idle"
    };

    format!(
        "[{}] {}/{} \"{}\" current: {}",
        state,
        view.cursor,
        view.target.chars().count(),
        view.accumulated_text,
        view.current_char.map(String::from).unwrap_or_else(|| "-".to_string()),
    )
}

pub fn describe_frame(frame: &SensorFrame) -> String {
    format!(
        "flex [{}] accel [{}] gyro [{}]",
        format_vector(&frame.flex),
        format_vector(&frame.accel),
        format_vector(&frame.gyro),
    )
}

pub fn describe_connection(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => "device: connected".to_string(),
        other => format!("device: {} (capture disabled)", other.to_string().to_lowercase()),
    }
}
