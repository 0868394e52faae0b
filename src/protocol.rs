//! The wire protocol of the Streply collector.
//!
//! Every capture produces one [`Event`] which is POSTed to the collector as
//! a JSON document.  The field names here match the collector contract, so
//! most structs rename into camelCase on serialization.

use std::collections::BTreeMap;
use std::fmt;
use std::str;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use crate::project_id::ProjectId;

/// An arbitrary (JSON) value.
pub use serde_json::Value;

/// The internally used map type.
pub type Map<K, V> = BTreeMap<K, V>;

/// The kind of a captured event.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A plain log entry.
    #[default]
    Log,
    /// An error, optionally with an exception name and stack trace.
    Error,
    /// A business-level activity record.
    Activity,
    /// A timing measurement.
    Performance,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventType::Log => write!(f, "log"),
            EventType::Error => write!(f, "error"),
            EventType::Activity => write!(f, "activity"),
            EventType::Performance => write!(f, "performance"),
        }
    }
}

/// Raised when a level or event type cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid value")]
pub struct ParseLevelError;

impl str::FromStr for EventType {
    type Err = ParseLevelError;

    fn from_str(string: &str) -> Result<EventType, Self::Err> {
        Ok(match string {
            "log" => EventType::Log,
            "error" => EventType::Error,
            "activity" => EventType::Activity,
            "performance" => EventType::Performance,
            _ => return Err(ParseLevelError),
        })
    }
}

/// Severity of an event.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// The default severity.
    #[default]
    Normal,
    /// Below normal interest.
    Low,
    /// Needs attention.
    High,
    /// Something went badly wrong.
    Critical,
}

impl Level {
    pub(crate) fn is_normal(&self) -> bool {
        *self == Level::Normal
    }

    /// Maps a conventional logging severity name onto a Streply level.
    ///
    /// This is meant for logging-bridge adapters which deal in
    /// `debug`/`info`/`warning`/`error`/`critical` vocabulary.
    pub fn from_log_severity(severity: &str) -> Level {
        severity
            .to_ascii_lowercase()
            .parse()
            .unwrap_or(Level::Normal)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Level::Normal => write!(f, "normal"),
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
            Level::Critical => write!(f, "critical"),
        }
    }
}

impl str::FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(string: &str) -> Result<Level, Self::Err> {
        Ok(match string {
            "normal" | "debug" | "info" => Level::Normal,
            "low" | "warning" | "warn" => Level::Low,
            "high" | "error" => Level::High,
            "critical" | "fatal" => Level::Critical,
            _ => return Err(ParseLevelError),
        })
    }
}

/// A single named parameter attached to an event.
///
/// Parameters are a list rather than a map because the collector keeps
/// insertion order and allows repeated names.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    /// The parameter name.
    pub name: String,
    /// The parameter value.
    pub value: Value,
}

impl Param {
    /// Creates a new parameter.
    pub fn new<N: Into<String>, V: Into<Value>>(name: N, value: V) -> Param {
        Param {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single frame of a stack trace.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// The source file, relative to the working directory when possible.
    pub file: String,
    /// The 1-based line number.
    pub line: u32,
    /// The function name, if resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The class name, if any.
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Call arguments, if known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Surrounding source lines keyed by line number, best effort.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub source: Map<u32, String>,
}

/// The user a captured event is attributed to.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct User {
    /// The ID of the user.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// A human readable name of the user.
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Additional arbitrary key/value pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

impl User {
    /// Creates a user from an id, defaulting the display name to the id.
    pub fn new<I: Into<String>>(user_id: I) -> User {
        let user_id = user_id.into();
        User {
            user_name: Some(user_id.clone()),
            user_id,
            params: Vec::new(),
        }
    }
}

/// A snapshot of the inbound HTTP request active during capture.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// The request URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Query or body parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// Request headers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, String>,
    /// Request cookies.  Stripped unless `send_default_pii` is set.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cookies: Map<String, String>,
    /// The client IP.  Stripped unless `send_default_pii` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// A breadcrumb recorded before an event, for post-hoc context.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Breadcrumb {
    /// The unix timestamp of the breadcrumb.
    pub timestamp: f64,
    /// The optional category of the breadcrumb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// An optional human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The level of the breadcrumb, defaults to normal.
    #[serde(default, skip_serializing_if = "Level::is_normal")]
    pub level: Level,
    /// Arbitrary breadcrumb data that should be sent along.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Default for Breadcrumb {
    fn default() -> Breadcrumb {
        Breadcrumb {
            timestamp: crate::utils::microtime(),
            category: None,
            message: None,
            level: Level::Normal,
            data: Map::new(),
        }
    }
}

fn default_event_type() -> String {
    "event".into()
}

fn default_http_status_code() -> u16 {
    200
}

/// One structured telemetry record, ready for transmission.
///
/// Events are created fresh per capture call and never mutated after being
/// handed to the transport.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// The fixed record discriminator on the wire, always `"event"`.
    #[serde(default = "default_event_type")]
    pub event_type: String,
    /// The session-scoped trace identifier.
    pub trace_id: String,
    /// The per-event trace identifier, `{traceId}_{counter}`.
    pub trace_unique_id: String,
    /// The session identifier of the capturing client.
    pub session_id: String,
    /// The anonymous session user identifier.
    pub user_id: String,
    /// Fixed placeholder, always 0.
    #[serde(default)]
    pub status: i64,
    /// The unix timestamp of client start.
    pub start_time: f64,
    /// The unix timestamp of the capture instant.
    pub time: f64,
    /// Elapsed seconds since client start.
    pub load_time: f64,
    /// The capture instant as a wall clock datetime string.
    pub date: String,
    /// The timezone `date` was rendered in.
    pub date_time_zone: String,
    /// The technology identifier, always `"rust"`.
    pub technology: String,
    /// The compiler version this crate was built with.
    pub technology_version: String,
    /// The version of this library.
    pub api_client_version: String,
    /// The configured environment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// The configured release, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// The project id derived from the DSN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Fixed placeholder, always 200.
    #[serde(default = "default_http_status_code")]
    pub http_status_code: u16,
    /// The kind of the event.
    #[serde(rename = "type", default)]
    pub ty: EventType,
    /// The severity of the event.
    #[serde(default)]
    pub level: Level,
    /// Ordered free-form parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    /// The message, required and non-empty.
    pub message: String,
    /// The host name of the capturing machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_user_agent: Option<String>,
    /// The process arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_params: Vec<String>,
    /// The working directory, overridable through the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// The user this event is attributed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// The scope url, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The scope flag, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// The scope channel, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// The source file the event originated in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// The source line the event originated at, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// The exception type name for error events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_name: Option<String>,
    /// The stack trace, capture point first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<Frame>,
    /// Breadcrumbs recorded on the scope before capture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// A snapshot of the scope's request data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestData>,
}

impl Default for Event {
    fn default() -> Event {
        Event {
            event_type: default_event_type(),
            trace_id: String::new(),
            trace_unique_id: String::new(),
            session_id: String::new(),
            user_id: String::new(),
            status: 0,
            start_time: 0.0,
            time: 0.0,
            load_time: 0.0,
            date: String::new(),
            date_time_zone: String::new(),
            technology: constants::TECHNOLOGY.into(),
            technology_version: constants::technology_version().into(),
            api_client_version: constants::VERSION.into(),
            environment: None,
            release: None,
            project_id: None,
            http_status_code: default_http_status_code(),
            ty: EventType::default(),
            level: Level::default(),
            params: Vec::new(),
            message: String::new(),
            request_user_agent: None,
            request_params: Vec::new(),
            dir: None,
            user: None,
            url: None,
            flag: None,
            channel: None,
            file: None,
            line: None,
            exception_name: None,
            trace: Vec::new(),
            breadcrumbs: Vec::new(),
            request: None,
        }
    }
}

/// The collector's reply to an event POST.
///
/// A body that does not parse into this shape is treated as a delivery
/// failure with status 500.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ApiResponse {
    /// `"success"` when the event was accepted.
    #[serde(default)]
    pub status: String,
    /// The server-side id of the stored event, if assigned.
    #[serde(default)]
    pub id: Option<String>,
}

impl ApiResponse {
    /// Whether the collector reported success.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for level in [Level::Normal, Level::Low, Level::High, Level::Critical] {
            assert_eq!(level.to_string().parse::<Level>().unwrap(), level);
        }
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_log_severity_mapping() {
        assert_eq!(Level::from_log_severity("debug"), Level::Normal);
        assert_eq!(Level::from_log_severity("info"), Level::Normal);
        assert_eq!(Level::from_log_severity("WARNING"), Level::Low);
        assert_eq!(Level::from_log_severity("error"), Level::High);
        assert_eq!(Level::from_log_severity("critical"), Level::Critical);
    }

    #[test]
    fn test_event_wire_format() {
        let event = Event {
            message: "hello".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "event");
        assert_eq!(value["status"], 0);
        assert_eq!(value["httpStatusCode"], 200);
        assert_eq!(value["type"], "log");
        assert_eq!(value["level"], "normal");
        assert_eq!(value["technology"], "rust");
        assert_eq!(value["message"], "hello");
        // date fields are always on the wire
        assert!(value.get("date").is_some());
        assert!(value.get("dateTimeZone").is_some());
        // sparse fields stay off the wire entirely
        assert!(value.get("exceptionName").is_none());
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_frame_order_round_trip() {
        let event = Event {
            message: "boom".into(),
            trace: vec![
                Frame {
                    file: "src/capture_site.rs".into(),
                    line: 10,
                    function: Some("capture_site".into()),
                    ..Default::default()
                },
                Frame {
                    file: "src/origin.rs".into(),
                    line: 99,
                    function: Some("origin".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        // capture point first, origin last
        assert_eq!(back.trace[0].file, "src/capture_site.rs");
        assert_eq!(back.trace[1].file, "src/origin.rs");
        assert_eq!(back.trace, event.trace);
    }

    #[test]
    fn test_api_response_parsing() {
        let resp: ApiResponse =
            serde_json::from_str(r#"{"status":"success","id":"abc"}"#).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.id.as_deref(), Some("abc"));

        let resp: ApiResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(!resp.is_success());
        assert!(serde_json::from_str::<ApiResponse>("not json").is_err());
    }
}
