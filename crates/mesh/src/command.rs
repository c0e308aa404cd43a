//! Control-channel envelopes and the typed command set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request as it arrives on the wire, before per-command validation.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Decoding failures. The display text is the wire error string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The request is not a `{type, payload}` object.
    #[error("Invalid message format")]
    InvalidFormat,
    /// `type` names no known command.
    #[error("Unknown message type")]
    UnknownType,
    /// The payload has the wrong shape for the command.
    #[error("Invalid {field}: expected {expected}")]
    InvalidPayload {
        field: &'static str,
        expected: &'static str,
    },
}

/// A validated control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { address: String },
    Broadcast { message: String },
    GetAddress,
    JoinTopic { topic: String },
    PublishToTopic { topic: String, data: String },
    GetPeers,
    GetNetworkStats,
    DisconnectPeer { peer_id: String },
}

impl Command {
    /// Decode one request line.
    pub fn decode(input: &str) -> Result<Self, CommandError> {
        let raw: RawEnvelope =
            serde_json::from_str(input).map_err(|_| CommandError::InvalidFormat)?;
        Self::from_parts(&raw.kind, raw.payload)
    }

    /// Validate `payload` for the command called `kind`.
    pub fn from_parts(kind: &str, payload: Value) -> Result<Self, CommandError> {
        let command = match kind {
            "connect" => Self::Connect {
                address: string_payload(payload, "peer address")?,
            },
            "broadcast" => Self::Broadcast {
                message: string_payload(payload, "message")?,
            },
            "get_address" => Self::GetAddress,
            "join_topic" => Self::JoinTopic {
                topic: string_payload(payload, "topic name")?,
            },
            "publish_to_topic" => {
                let Value::Object(mut fields) = payload else {
                    return Err(invalid("topic message", "object"));
                };
                let topic = string_payload(fields.remove("topic").unwrap_or_default(), "topic")?;
                let data = string_payload(fields.remove("data").unwrap_or_default(), "data")?;
                Self::PublishToTopic { topic, data }
            }
            "get_peers" => Self::GetPeers,
            "get_network_stats" => Self::GetNetworkStats,
            "disconnect_peer" => Self::DisconnectPeer {
                peer_id: string_payload(payload, "peer ID")?,
            },
            _ => return Err(CommandError::UnknownType),
        };
        Ok(command)
    }

    /// Wire name of the command, used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Broadcast { .. } => "broadcast",
            Self::GetAddress => "get_address",
            Self::JoinTopic { .. } => "join_topic",
            Self::PublishToTopic { .. } => "publish_to_topic",
            Self::GetPeers => "get_peers",
            Self::GetNetworkStats => "get_network_stats",
            Self::DisconnectPeer { .. } => "disconnect_peer",
        }
    }
}

fn invalid(field: &'static str, expected: &'static str) -> CommandError {
    CommandError::InvalidPayload { field, expected }
}

fn string_payload(value: Value, field: &'static str) -> Result<String, CommandError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(field, "string")),
    }
}

/// Reply sent for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_address(address: String, data: Value) -> Self {
        Self {
            success: true,
            address: Some(address),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn error(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":"failed to encode response"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_each_command() {
        let cases = [
            (
                r#"{"type":"connect","payload":"/ip4/1.2.3.4/tcp/1"}"#,
                Command::Connect {
                    address: "/ip4/1.2.3.4/tcp/1".into(),
                },
            ),
            (
                r#"{"type":"broadcast","payload":"hi"}"#,
                Command::Broadcast {
                    message: "hi".into(),
                },
            ),
            (r#"{"type":"get_address"}"#, Command::GetAddress),
            (
                r#"{"type":"join_topic","payload":"news"}"#,
                Command::JoinTopic {
                    topic: "news".into(),
                },
            ),
            (
                r#"{"type":"publish_to_topic","payload":{"topic":"news","data":"x"}}"#,
                Command::PublishToTopic {
                    topic: "news".into(),
                    data: "x".into(),
                },
            ),
            (r#"{"type":"get_peers","payload":null}"#, Command::GetPeers),
            (r#"{"type":"get_network_stats"}"#, Command::GetNetworkStats),
            (
                r#"{"type":"disconnect_peer","payload":"12D3"}"#,
                Command::DisconnectPeer {
                    peer_id: "12D3".into(),
                },
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(Command::decode(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_decode_malformed() {
        for input in ["", "not json", "[1,2]", r#"{"type":5}"#, "null"] {
            assert_eq!(Command::decode(input), Err(CommandError::InvalidFormat), "{input}");
        }
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            Command::decode(r#"{"type":"frobnicate","payload":{}}"#),
            Err(CommandError::UnknownType)
        );
        assert_eq!(Command::decode("{}"), Err(CommandError::UnknownType));
    }

    #[test]
    fn test_payload_validation_names_field() {
        let err = Command::decode(r#"{"type":"connect","payload":42}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid peer address: expected string");

        let err = Command::decode(r#"{"type":"publish_to_topic","payload":"x"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid topic message: expected object");

        let err =
            Command::decode(r#"{"type":"publish_to_topic","payload":{"topic":"t"}}"#).unwrap_err();
        assert_matches!(err, CommandError::InvalidPayload { field: "data", .. });

        let err = Command::decode(r#"{"type":"publish_to_topic","payload":{"data":"d"}}"#)
            .unwrap_err();
        assert_matches!(err, CommandError::InvalidPayload { field: "topic", .. });
    }

    #[test]
    fn test_response_omits_empty_fields() {
        assert_eq!(
            serde_json::to_value(Response::ok()).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(Response::error("boom")).unwrap(),
            json!({"success": false, "error": "boom"})
        );
        assert_eq!(
            serde_json::to_value(Response::with_data(json!([]))).unwrap(),
            json!({"success": true, "data": []})
        );
    }
}
