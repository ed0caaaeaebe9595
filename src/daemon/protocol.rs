//! RPC wire protocol: one newline-terminated UTF-8 JSON request per
//! connection, one JSON object reply, then the server closes the stream.

use super::state::StatusSnapshot;
use serde::{Deserialize, Serialize};

/// Default pulse spacing when the request omits `interval`.
pub const DEFAULT_PULSE_INTERVAL: f64 = 2.0;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Status,
    Shutdown,
    OpenPulses { pulses: u32, interval: f64 },
    Close,
    ReadBattery,
}

/// Why a request line could not be turned into a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Invalid JSON, or no `cmd` field.
    BadRequest,
    /// Well-formed, but the command is not one we know.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    cmd: Option<String>,
    pulses: Option<u32>,
    interval: Option<f64>,
}

/// Parse one request line.
pub fn parse_request(line: &str) -> Result<Request, RequestError> {
    let raw: RawRequest =
        serde_json::from_str(line.trim()).map_err(|_| RequestError::BadRequest)?;
    let cmd = raw.cmd.ok_or(RequestError::BadRequest)?;

    match cmd.as_str() {
        "status" => Ok(Request::Status),
        "shutdown" => Ok(Request::Shutdown),
        "open_pulses" => Ok(Request::OpenPulses {
            pulses: raw.pulses.unwrap_or(1),
            interval: raw.interval.unwrap_or(DEFAULT_PULSE_INTERVAL),
        }),
        "close" => Ok(Request::Close),
        "read_battery" => Ok(Request::ReadBattery),
        _ => Err(RequestError::Unknown(cmd)),
    }
}

/// Reply written back to the client. Serializes as a bare JSON object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Status(Box<StatusSnapshot>),
    Started { started: bool },
    Ok { ok: bool },
    Battery { battery: Option<u8> },
    Error { error: String },
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Ok { ok: true }
    }

    pub fn started() -> Self {
        Reply::Started { started: true }
    }

    pub fn busy() -> Self {
        Reply::Error {
            error: "busy".to_string(),
        }
    }

    pub fn bad_request() -> Self {
        Reply::Error {
            error: "bad_request".to_string(),
        }
    }

    pub fn unknown(cmd: &str) -> Self {
        Reply::Error {
            error: format!("unknown:{cmd}"),
        }
    }

    /// Serialize for the wire. Infallible for the shapes above.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":"internal"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status() {
        assert_eq!(parse_request(r#"{"cmd":"status"}"#), Ok(Request::Status));
    }

    #[test]
    fn parses_open_pulses_with_defaults() {
        let req = parse_request(r#"{"cmd":"open_pulses","pulses":7}"#).unwrap();
        assert_eq!(
            req,
            Request::OpenPulses {
                pulses: 7,
                interval: DEFAULT_PULSE_INTERVAL
            }
        );

        let req = parse_request(r#"{"cmd":"open_pulses","pulses":3,"interval":0.5}"#).unwrap();
        assert_eq!(
            req,
            Request::OpenPulses {
                pulses: 3,
                interval: 0.5
            }
        );
    }

    #[test]
    fn invalid_json_is_bad_request() {
        assert_eq!(parse_request("not json"), Err(RequestError::BadRequest));
        assert_eq!(parse_request(""), Err(RequestError::BadRequest));
    }

    #[test]
    fn missing_cmd_is_bad_request() {
        assert_eq!(
            parse_request(r#"{"pulses":3}"#),
            Err(RequestError::BadRequest)
        );
    }

    #[test]
    fn unknown_command_echoes_name() {
        assert_eq!(
            parse_request(r#"{"cmd":"unknown_thing"}"#),
            Err(RequestError::Unknown("unknown_thing".to_string()))
        );
        assert_eq!(
            Reply::unknown("unknown_thing").to_json(),
            r#"{"error":"unknown:unknown_thing"}"#
        );
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(Reply::started().to_json(), r#"{"started":true}"#);
        assert_eq!(Reply::ok().to_json(), r#"{"ok":true}"#);
        assert_eq!(Reply::busy().to_json(), r#"{"error":"busy"}"#);
        assert_eq!(
            Reply::Battery { battery: None }.to_json(),
            r#"{"battery":null}"#
        );
    }
}
