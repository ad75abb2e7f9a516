//! Outbound result lines.
//!
//! Results mirror the command grammar: `OK[id]`, `ERR[id]:{...}` or
//! `FATAL[id]:{...}`, with any content serialized as JSON. Error
//! content is always an object with an `error` key.

use plotkit_core::{Result, WorkerError};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
    Fatal,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::Err => "ERR",
            Status::Fatal => "FATAL",
        })
    }
}

/// One result line, correlated to its command by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub id: String,
    pub content: Option<Value>,
}

impl Response {
    pub fn ok(id: &str) -> Response {
        Response {
            status: Status::Ok,
            id: id.to_string(),
            content: None,
        }
    }

    /// `OK` with a JSON payload. A `Null` payload collapses to a
    /// bare `OK[id]`.
    pub fn ok_with(id: &str, content: Value) -> Response {
        Response {
            status: Status::Ok,
            id: id.to_string(),
            content: (!content.is_null()).then_some(content),
        }
    }

    pub fn err(id: &str, message: &str) -> Response {
        Response {
            status: Status::Err,
            id: id.to_string(),
            content: Some(json!({ "error": message })),
        }
    }

    pub fn fatal(id: &str, message: &str) -> Response {
        Response {
            status: Status::Fatal,
            id: id.to_string(),
            content: Some(json!({ "error": message })),
        }
    }

    /// The `error` string of an ERR/FATAL payload, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.content.as_ref()?.get("error")?.as_str()
    }

    pub fn to_line(&self) -> String {
        match &self.content {
            Some(content) => format!("{}[{}]:{}", self.status, self.id, content),
            None => format!("{}[{}]", self.status, self.id),
        }
    }

    /// Parses a result line back into its parts. The content, when
    /// present, must be valid JSON.
    pub fn parse(line: &str) -> Result<Response> {
        let bad = || -> plotkit_core::Error {
            let echo: String = line.chars().take(40).collect();
            WorkerError::MalformedCommand { line: echo }.into()
        };
        let open = line.find('[').ok_or_else(bad)?;
        let status = match &line[..open] {
            "OK" => Status::Ok,
            "ERR" => Status::Err,
            "FATAL" => Status::Fatal,
            _ => return Err(bad()),
        };
        let rest = &line[open + 1..];
        let close = rest.find(']').ok_or_else(bad)?;
        let id = rest[..close].to_string();
        let tail = &rest[close + 1..];
        let content = match tail.strip_prefix(':') {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|_| bad())?),
            None if tail.is_empty() => None,
            None => return Err(bad()),
        };
        Ok(Response {
            status,
            id,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ok() {
        assert_eq!(Response::ok("abc").to_line(), "OK[abc]");
        assert_eq!(Response::ok_with("abc", Value::Null).to_line(), "OK[abc]");
    }

    #[test]
    fn err_carries_message() {
        let line = Response::err("x", "no program staged").to_line();
        assert_eq!(line, r#"ERR[x]:{"error":"no program staged"}"#);
        let parsed = Response::parse(&line).unwrap();
        assert_eq!(parsed.status, Status::Err);
        assert_eq!(parsed.error_message(), Some("no program staged"));
    }

    #[test]
    fn ok_payload_round_trips() {
        let line = Response::ok_with("s", json!({"state": "READY"})).to_line();
        let parsed = Response::parse(&line).unwrap();
        assert_eq!(parsed.id, "s");
        assert_eq!(parsed.content.unwrap()["state"], "READY");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Response::parse("WHAT[1]").is_err());
        assert!(Response::parse("OK[1]:not json").is_err());
        assert!(Response::parse("OK").is_err());
    }
}
