//! Interactive console commands read from stdin while the server runs.

use std::fmt;

/// One console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Schedule a restart; the configured delay when no minutes are given.
    Restart { delay_minutes: Option<u64> },
    /// Schedule a stop.
    Stop { delay_minutes: Option<u64> },
    /// Cancel the scheduled foreground operation.
    Cancel,
    Status,
    Players,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleParseError(String);

impl fmt::Display for ConsoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const HELP: &str = "\
Commands:
  restart [minutes]  schedule a restart
  stop [minutes]     schedule a shutdown
  cancel             cancel the scheduled restart or shutdown
  status             server state and operations
  players            connected players
  quit               stop the server and exit";

impl ConsoleCommand {
    /// Parse a console line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(ConsoleParseError(format!("Unexpected argument '{extra}'")));
        }

        let command = match verb.to_ascii_lowercase().as_str() {
            "restart" => Self::Restart {
                delay_minutes: parse_minutes(arg)?,
            },
            "stop" | "shutdown" => Self::Stop {
                delay_minutes: parse_minutes(arg)?,
            },
            other => {
                if let Some(arg) = arg {
                    return Err(ConsoleParseError(format!(
                        "'{other}' takes no argument, got '{arg}'"
                    )));
                }
                match other {
                    "cancel" => Self::Cancel,
                    "status" => Self::Status,
                    "players" => Self::Players,
                    "help" | "?" => Self::Help,
                    "quit" | "exit" => Self::Quit,
                    _ => return Err(ConsoleParseError(format!("Unknown command '{other}'"))),
                }
            }
        };
        Ok(Some(command))
    }
}

fn parse_minutes(arg: Option<&str>) -> Result<Option<u64>, ConsoleParseError> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.parse::<u64>() {
        Ok(0) | Err(_) => Err(ConsoleParseError(format!(
            "Delay must be a positive number of minutes, got '{arg}'"
        ))),
        Ok(minutes) => Ok(Some(minutes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operations() {
        assert_eq!(
            ConsoleCommand::parse("restart 10"),
            Ok(Some(ConsoleCommand::Restart {
                delay_minutes: Some(10)
            }))
        );
        assert_eq!(
            ConsoleCommand::parse("  STOP  "),
            Ok(Some(ConsoleCommand::Stop {
                delay_minutes: None
            }))
        );
        assert_eq!(ConsoleCommand::parse("cancel"), Ok(Some(ConsoleCommand::Cancel)));
        assert_eq!(ConsoleCommand::parse("exit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(ConsoleCommand::parse("   "), Ok(None));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ConsoleCommand::parse("restart 0").is_err());
        assert!(ConsoleCommand::parse("restart soon").is_err());
        assert!(ConsoleCommand::parse("stop 5 now").is_err());
        assert!(ConsoleCommand::parse("status all").is_err());
        assert!(ConsoleCommand::parse("reboot").is_err());
    }
}
