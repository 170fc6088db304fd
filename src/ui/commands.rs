// Console command parsing
//
// One command per line, words separated by whitespace. Keywords are
// case-insensitive.

use crate::models::config::MAX_DELAY_SECONDS;
use crate::models::{MoveMode, Point};
use crate::services::hotkeys::parse_key;
use std::str::FromStr;
use thiserror::Error;

/// Which delay a `delay` command changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    PostClick,
    Idle,
    Smooth,
    Instant,
}

impl FromStr for DelayKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" | "click" => Ok(DelayKind::PostClick),
            "idle" => Ok(DelayKind::Idle),
            "smooth" => Ok(DelayKind::Smooth),
            "instant" => Ok(DelayKind::Instant),
            other => Err(CommandError::InvalidValue {
                argument: "delay kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    /// Drag the real pointer to draw the region
    SelectDrag,
    /// Drag from one corner to the other
    Select { from: Point, to: Point },
    /// Back to full-screen search
    Reset,
    Reload,
    Threshold(f64),
    Mode(MoveMode),
    Delay { kind: DelayKind, seconds: f64 },
    /// Global key that stops the loop
    StopKey(String),
    Status,
    Help,
    Quit,
}

/// Errors raised while parsing a console line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Invalid {argument}: '{value}'")]
    InvalidValue {
        argument: &'static str,
        value: String,
    },

    #[error("{argument} must be between {min} and {max}, got {value}")]
    OutOfRange {
        argument: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

pub const HELP: &str = "\
Commands:
  start                      start searching and clicking
  stop                       stop after the current cycle
  select                     drag with the left mouse button to pick the search area
  select X1 Y1 X2 Y2         search only the rectangle between two corners
  reset                      search the full screen again
  reload                     rescan the image folder
  threshold VALUE            match confidence, 0.0 to 1.0
  mode instant|smooth        pointer movement
  delay post|idle|smooth|instant SECONDS
  stopkey KEY                global stop key, e.g. esc, f8 or q
  status                     show the current state
  quit                       stop, save settings and exit";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let keyword = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match keyword.as_str() {
            "start" | "run" => Command::Start,
            "stop" => Command::Stop,
            "select" | "region" => match args.as_slice() {
                [] => Command::SelectDrag,
                [x1, y1, x2, y2] => Command::Select {
                    from: Point::new(coordinate(x1)?, coordinate(y1)?),
                    to: Point::new(coordinate(x2)?, coordinate(y2)?),
                },
                _ => {
                    return Err(CommandError::MissingArgument {
                        command: "select",
                        expected: "no arguments to drag, or four coordinates X1 Y1 X2 Y2",
                    });
                }
            },
            "reset" | "fullscreen" => Command::Reset,
            "reload" => Command::Reload,
            "threshold" => {
                let value = single_arg(&args, "threshold", "a value between 0.0 and 1.0")?;
                Command::Threshold(in_range(number(value, "threshold")?, "threshold", 0.0, 1.0)?)
            }
            "mode" => {
                let value = single_arg(&args, "mode", "'instant' or 'smooth'")?;
                let mode = value.parse::<MoveMode>().map_err(|_| CommandError::InvalidValue {
                    argument: "move mode",
                    value: value.to_string(),
                })?;
                Command::Mode(mode)
            }
            "delay" => {
                let [kind, seconds] = args.as_slice() else {
                    return Err(CommandError::MissingArgument {
                        command: "delay",
                        expected: "a kind and a number of seconds",
                    });
                };
                Command::Delay {
                    kind: kind.parse()?,
                    seconds: in_range(
                        number(seconds, "delay")?,
                        "delay",
                        0.0,
                        MAX_DELAY_SECONDS,
                    )?,
                }
            }
            "stopkey" | "stop-key" => {
                let value = single_arg(&args, "stopkey", "a key name such as esc, f8 or q")?;
                if parse_key(value).is_none() {
                    return Err(CommandError::InvalidValue {
                        argument: "key",
                        value: value.to_string(),
                    });
                }
                Command::StopKey(value.to_ascii_lowercase())
            }
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(keyword)),
        };

        Ok(command)
    }
}

fn single_arg<'a>(
    args: &[&'a str],
    command: &'static str,
    expected: &'static str,
) -> Result<&'a str, CommandError> {
    match args {
        [value] => Ok(*value),
        _ => Err(CommandError::MissingArgument { command, expected }),
    }
}

fn coordinate(value: &str) -> Result<i32, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidValue {
        argument: "coordinate",
        value: value.to_string(),
    })
}

fn number(value: &str, argument: &'static str) -> Result<f64, CommandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidValue {
            argument,
            value: value.to_string(),
        })
}

fn in_range(value: f64, argument: &'static str, min: f64, max: f64) -> Result<f64, CommandError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(CommandError::OutOfRange {
            argument,
            value,
            min,
            max,
        })
    }
}
