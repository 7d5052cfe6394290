//! Console commands for the `simulate` session

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};

/// One line typed at the simulate console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Connect to the given server, or the configured one
    Connect(Option<String>),
    Disconnect,
    Intensity(f64),
    Stop,
    Pulse { intensity: f64, duration: Duration },
    Hit,
    Miss,
    Battery(f64),
    Progress(f64),
    Preview,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  connect [url]             connect to the device server
  disconnect                disconnect from the device server
  intensity <0-1>           vibrate every device at a fixed intensity
  stop                      stop every device
  pulse <0-1> <ms>          start a pulse
  hit | miss                simulate a note event
  battery <0-1>             set the battery level used for strength
  progress <0-1>            set the song progress used for strength
  preview                   pulse at max strength (if previews are enabled)
  status                    show connection and queue state
  help                      show this help
  quit                      shut down and exit";

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("connect", []) => ConsoleCommand::Connect(None),
            ("connect", [url]) => ConsoleCommand::Connect(Some(url.to_string())),
            ("disconnect", []) => ConsoleCommand::Disconnect,
            ("intensity", [value]) => ConsoleCommand::Intensity(number(value)?),
            ("stop", []) => ConsoleCommand::Stop,
            ("pulse", [intensity, ms]) => ConsoleCommand::Pulse {
                intensity: number(intensity)?,
                duration: Duration::from_millis(
                    ms.parse()
                        .with_context(|| format!("invalid duration '{ms}'"))?,
                ),
            },
            ("hit", []) => ConsoleCommand::Hit,
            ("miss", []) => ConsoleCommand::Miss,
            ("battery", [value]) => ConsoleCommand::Battery(number(value)?),
            ("progress", [value]) => ConsoleCommand::Progress(number(value)?),
            ("preview", []) => ConsoleCommand::Preview,
            ("status", []) => ConsoleCommand::Status,
            ("help" | "?", []) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            (
                "connect" | "disconnect" | "intensity" | "stop" | "pulse" | "hit" | "miss"
                | "battery" | "progress" | "preview" | "status" | "help" | "?" | "quit"
                | "exit",
                _,
            ) => bail!("wrong arguments for '{name}', type 'help' for usage"),
            _ => return Err(anyhow!("unknown command '{name}', type 'help' for the list")),
        };
        Ok(command)
    }
}

fn number(value: &str) -> anyhow::Result<f64> {
    value
        .parse::<f64>()
        .with_context(|| format!("invalid number '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ConsoleCommand {
        line.parse().unwrap()
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("disconnect"), ConsoleCommand::Disconnect);
        assert_eq!(parse("  STOP "), ConsoleCommand::Stop);
        assert_eq!(parse("exit"), ConsoleCommand::Quit);
        assert_eq!(parse("?"), ConsoleCommand::Help);
    }

    #[test]
    fn test_connect() {
        assert_eq!(parse("connect"), ConsoleCommand::Connect(None));
        assert_eq!(
            parse("connect ws://10.0.0.2:12345"),
            ConsoleCommand::Connect(Some("ws://10.0.0.2:12345".to_string()))
        );
    }

    #[test]
    fn test_numeric_arguments() {
        assert_eq!(parse("intensity 0.4"), ConsoleCommand::Intensity(0.4));
        assert_eq!(parse("battery 1"), ConsoleCommand::Battery(1.0));
        assert_eq!(
            parse("pulse 0.8 250"),
            ConsoleCommand::Pulse {
                intensity: 0.8,
                duration: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_errors() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("dance".parse::<ConsoleCommand>().is_err());
        assert!("intensity".parse::<ConsoleCommand>().is_err());
        assert!("intensity loud".parse::<ConsoleCommand>().is_err());
        assert!("pulse 0.5 -3".parse::<ConsoleCommand>().is_err());

        let err = "stop now".parse::<ConsoleCommand>().unwrap_err();
        assert!(err.to_string().contains("wrong arguments"));
    }
}
