//! Inbound command lines.
//!
//! Grammar: `KIND[id]` or `KIND[id]:content`. `KIND` is uppercase
//! ASCII letters, `id` is a caller-chosen correlation token of
//! alphanumerics and hyphens (possibly empty), and `content` is
//! everything after the first colon, uninterpreted until the kind's
//! own payload rules are applied.

use plotkit_core::{Result, WorkerError};

/// Longest prefix of a rejected line echoed back in errors.
const ECHO_LEN: usize = 40;

/// A parsed command, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Stage a program without running it. Content is either raw
    /// G-code text or a JSON array of strings, one command each.
    Load { program: String },
    /// Run the staged program.
    Start,
    /// Toggle the pause flag of the running plot.
    Pause,
    /// Abandon a paused plot.
    Cancel,
    /// Send a JSON array of commands directly to the device.
    Batch { lines: Vec<String> },
    /// Rapid to a position. `absolute` coordinates are checked
    /// against the machine's travel limits; relative ones are not.
    Move { x: f64, y: f64, absolute: bool },
    /// Raise the pen.
    PenUp,
    /// Lower the pen, optionally to an explicit servo position.
    PenDown { depth: Option<u32> },
    /// Home the X and Y axes.
    Home,
    /// Declare the current position to be the origin.
    Origin,
    /// Report worker state.
    Status,
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerCommand::Load { .. } => "LOAD",
            WorkerCommand::Start => "START",
            WorkerCommand::Pause => "PAUSE",
            WorkerCommand::Cancel => "CANCEL",
            WorkerCommand::Batch { .. } => "CMD",
            WorkerCommand::Move { .. } => "MOVE",
            WorkerCommand::PenUp => "PENUP",
            WorkerCommand::PenDown { .. } => "PENDOWN",
            WorkerCommand::Home => "HOME",
            WorkerCommand::Origin => "ORIGIN",
            WorkerCommand::Status => "STATUS",
        }
    }
}

/// A command line paired with its correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: String,
    pub command: WorkerCommand,
}

impl Request {
    /// Parses one command line. Unknown kinds and lines that do not
    /// match the bracket grammar are rejected outright; payload
    /// problems on a known kind report the kind by name.
    pub fn parse(line: &str) -> Result<Request> {
        let (kind, id, content) = split_line(line)?;
        let command = match kind {
            "LOAD" => WorkerCommand::Load {
                program: parse_program(require_content("LOAD", content)?),
            },
            "START" => WorkerCommand::Start,
            "PAUSE" => WorkerCommand::Pause,
            "CANCEL" => WorkerCommand::Cancel,
            "CMD" => WorkerCommand::Batch {
                lines: parse_batch(require_content("CMD", content)?)?,
            },
            "MOVE" => parse_move(require_content("MOVE", content)?)?,
            "PENUP" => WorkerCommand::PenUp,
            "PENDOWN" => WorkerCommand::PenDown {
                depth: parse_depth(content)?,
            },
            "HOME" => WorkerCommand::Home,
            "ORIGIN" => WorkerCommand::Origin,
            "STATUS" => WorkerCommand::Status,
            _ => return Err(malformed(line)),
        };
        Ok(Request {
            id: id.to_string(),
            command,
        })
    }
}

fn malformed(line: &str) -> plotkit_core::Error {
    let echo: String = line.chars().take(ECHO_LEN).collect();
    WorkerError::MalformedCommand { line: echo }.into()
}

/// Splits `KIND[id]` / `KIND[id]:content` into its three parts.
fn split_line(line: &str) -> Result<(&str, &str, Option<&str>)> {
    let open = line.find('[').ok_or_else(|| malformed(line))?;
    let kind = &line[..open];
    if kind.is_empty() || !kind.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(malformed(line));
    }
    let rest = &line[open + 1..];
    let close = rest.find(']').ok_or_else(|| malformed(line))?;
    let id = &rest[..close];
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(malformed(line));
    }
    let tail = &rest[close + 1..];
    let content = match tail.strip_prefix(':') {
        Some(content) => Some(content),
        None if tail.is_empty() => None,
        None => return Err(malformed(line)),
    };
    Ok((kind, id, content))
}

fn require_content<'a>(kind: &str, content: Option<&'a str>) -> Result<&'a str> {
    content.ok_or_else(|| {
        WorkerError::InvalidPayload {
            command: kind.to_string(),
            reason: "missing content".to_string(),
        }
        .into()
    })
}

/// A LOAD payload is tried as a JSON array of command strings first
/// and falls back to raw program text.
fn parse_program(content: &str) -> String {
    if content.trim_start().starts_with('[') {
        if let Ok(lines) = serde_json::from_str::<Vec<String>>(content) {
            return lines.join("\n");
        }
    }
    content.to_string()
}

fn parse_batch(content: &str) -> Result<Vec<String>> {
    serde_json::from_str::<Vec<String>>(content).map_err(|e| {
        WorkerError::InvalidPayload {
            command: "CMD".to_string(),
            reason: format!("expected a JSON array of strings: {e}"),
        }
        .into()
    })
}

/// MOVE content is `x,y` for a relative move or `!x,y` for an
/// absolute one.
fn parse_move(content: &str) -> Result<WorkerCommand> {
    let bad = |reason: &str| -> plotkit_core::Error {
        WorkerError::InvalidPayload {
            command: "MOVE".to_string(),
            reason: reason.to_string(),
        }
        .into()
    };
    let (absolute, coords) = match content.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, content),
    };
    let (x, y) = coords
        .split_once(',')
        .ok_or_else(|| bad("expected x,y"))?;
    let x: f64 = x.trim().parse().map_err(|_| bad("bad x coordinate"))?;
    let y: f64 = y.trim().parse().map_err(|_| bad("bad y coordinate"))?;
    Ok(WorkerCommand::Move { x, y, absolute })
}

fn parse_depth(content: Option<&str>) -> Result<Option<u32>> {
    match content {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u32>().map(Some).map_err(|_| {
            WorkerError::InvalidPayload {
                command: "PENDOWN".to_string(),
                reason: "depth must be an unsigned integer".to_string(),
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_with_empty_id() {
        let req = Request::parse("STATUS[]").unwrap();
        assert_eq!(req.id, "");
        assert_eq!(req.command, WorkerCommand::Status);
    }

    #[test]
    fn load_raw_text() {
        let req = Request::parse("LOAD[a1]:G0 X1\nG0 X2").unwrap();
        assert_eq!(req.id, "a1");
        assert_eq!(
            req.command,
            WorkerCommand::Load {
                program: "G0 X1\nG0 X2".to_string()
            }
        );
    }

    #[test]
    fn load_json_array_is_joined() {
        let req = Request::parse(r#"LOAD[a-2]:["G0 X1", "G0 X2"]"#).unwrap();
        assert_eq!(
            req.command,
            WorkerCommand::Load {
                program: "G0 X1\nG0 X2".to_string()
            }
        );
    }

    #[test]
    fn cmd_requires_json_array() {
        let req = Request::parse(r#"CMD[7]:["M114"]"#).unwrap();
        assert_eq!(
            req.command,
            WorkerCommand::Batch {
                lines: vec!["M114".to_string()]
            }
        );
        let err = Request::parse("CMD[7]:M114").unwrap_err();
        assert!(err.to_string().contains("CMD"));
    }

    #[test]
    fn move_absolute_and_relative() {
        assert_eq!(
            Request::parse("MOVE[m]:!10.5,20").unwrap().command,
            WorkerCommand::Move {
                x: 10.5,
                y: 20.0,
                absolute: true
            }
        );
        assert_eq!(
            Request::parse("MOVE[m]:-3,4").unwrap().command,
            WorkerCommand::Move {
                x: -3.0,
                y: 4.0,
                absolute: false
            }
        );
    }

    #[test]
    fn pendown_depth_is_optional() {
        assert_eq!(
            Request::parse("PENDOWN[p]").unwrap().command,
            WorkerCommand::PenDown { depth: None }
        );
        assert_eq!(
            Request::parse("PENDOWN[p]:9").unwrap().command,
            WorkerCommand::PenDown { depth: Some(9) }
        );
        assert!(Request::parse("PENDOWN[p]:deep").is_err());
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(Request::parse("NOPE[1]").is_err());
        assert!(Request::parse("STATUS").is_err());
        assert!(Request::parse("status[1]").is_err());
        assert!(Request::parse("STATUS[bad id]").is_err());
        assert!(Request::parse("STATUS[1]trailing").is_err());
    }

    #[test]
    fn malformed_echo_is_truncated() {
        let long = format!("JUNK[{}]", "x".repeat(200));
        let err = Request::parse(&long).unwrap_err();
        assert!(err.to_string().len() < 120);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_well_formed_id_round_trips(id in "[A-Za-z0-9-]{0,16}") {
                let req = Request::parse(&format!("STATUS[{id}]")).unwrap();
                prop_assert_eq!(req.id, id);
                prop_assert_eq!(req.command, WorkerCommand::Status);
            }

            #[test]
            fn move_coordinates_round_trip(
                x in -500.0..500.0f64,
                y in -500.0..500.0f64,
                absolute: bool,
            ) {
                let prefix = if absolute { "!" } else { "" };
                let req = Request::parse(&format!("MOVE[m]:{prefix}{x},{y}")).unwrap();
                prop_assert_eq!(
                    req.command,
                    WorkerCommand::Move { x, y, absolute }
                );
            }

            #[test]
            fn load_json_payload_round_trips(
                lines in proptest::collection::vec("[GM][0-9]{1,3}( X[0-9]{1,2})?", 1..8)
            ) {
                let payload = serde_json::to_string(&lines).unwrap();
                let req = Request::parse(&format!("LOAD[j]:{payload}")).unwrap();
                prop_assert_eq!(
                    req.command,
                    WorkerCommand::Load { program: lines.join("\n") }
                );
            }
        }
    }
}
