//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the text encoding over a single WebSocket is supported; binary
//! attachments and HTTP long-polling are out of scope for this client.

use crate::types::{DEFAULT_NAMESPACE, RealtimeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the Engine.IO OPEN packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default)]
    pub ping_interval: Option<u64>,
    #[serde(default)]
    pub ping_timeout: Option<u64>,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(RealtimeError::Protocol("empty engine packet".to_string()));
        };
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(RealtimeError::Protocol(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data),
            Self::Pong(data) => format!("3{}", data),
            Self::Message(data) => format!("4{}", data),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        })
    }
}

/// Socket.IO packet carried inside an Engine.IO MESSAGE
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    pub fn connect(auth: Option<Value>) -> Self {
        Self::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: auth,
        }
    }

    pub fn disconnect() -> Self {
        Self::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.into(),
            args: vec![data],
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(RealtimeError::Protocol("empty socket packet".to_string()));
        };
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(RealtimeError::Protocol(
                "binary socket packets are not supported".to_string(),
            ));
        }

        let mut namespace = DEFAULT_NAMESPACE.to_string();
        if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    namespace = rest[..idx].to_string();
                    rest = &rest[idx + 1..];
                }
                None => {
                    namespace = rest.to_string();
                    rest = "";
                }
            }
        }

        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let id = if digits > 0 {
            let parsed = rest[..digits]
                .parse::<u64>()
                .map_err(|e| RealtimeError::Protocol(format!("bad ack id: {}", e)))?;
            rest = &rest[digits..];
            Some(parsed)
        } else {
            None
        };

        let data: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(RealtimeError::Protocol(
                        "event packet without argument array".to_string(),
                    ));
                };
                if items.is_empty() {
                    return Err(RealtimeError::Protocol("event packet without name".to_string()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(RealtimeError::Protocol(
                        "event name is not a string".to_string(),
                    ));
                };
                Ok(Self::Event {
                    namespace,
                    id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let Some(id) = id else {
                    return Err(RealtimeError::Protocol("ack packet without id".to_string()));
                };
                let args = match data {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(Self::Ack {
                    namespace,
                    id,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                data: data.unwrap_or(Value::Null),
            }),
            other => Err(RealtimeError::Protocol(format!(
                "unknown socket packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        let (kind, namespace) = match self {
            Self::Connect { namespace, .. } => ('0', namespace),
            Self::Disconnect { namespace } => ('1', namespace),
            Self::Event { namespace, .. } => ('2', namespace),
            Self::Ack { namespace, .. } => ('3', namespace),
            Self::ConnectError { namespace, .. } => ('4', namespace),
        };
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&serde_json::to_string(data)?);
                }
            }
            Self::Disconnect { .. } => {}
            Self::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&serde_json::to_string(&items)?);
            }
            Self::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&serde_json::to_string(args)?);
            }
            Self::ConnectError { data, .. } => {
                out.push_str(&serde_json::to_string(data)?);
            }
        }
        Ok(out)
    }

    /// Wrap in an Engine.IO MESSAGE and encode as a WebSocket text frame
    pub fn to_frame(&self) -> Result<String> {
        EnginePacket::Message(self.encode()?).encode()
    }
}

/// Human-readable reason out of a CONNECT_ERROR payload
pub fn connect_error_message(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "connection refused".to_string(),
        other => other.to_string(),
    }
}
