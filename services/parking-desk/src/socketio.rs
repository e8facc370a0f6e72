//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! Only the subset a push-only client needs: the open handshake, heartbeats,
//! namespace connect/disconnect and plain (non-binary) events on the default
//! namespace.

use serde::Deserialize;
use serde_json::Value;

use crate::DeskError;

/// Engine.IO handshake payload (`0{...}`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenHandshake {
    /// How long the connection may stay silent before it is considered dead
    pub fn liveness_ms(&self) -> u64 {
        self.ping_interval + self.ping_timeout
    }
}

/// Engine.IO transport packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    /// Socket.IO packet text
    Message(String),
    Upgrade,
    Noop,
}

/// Socket.IO packet on the default namespace
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    Ack(Value),
    ConnectError(Value),
}

pub fn decode_engine(text: &str) -> crate::Result<EnginePacket> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| DeskError::Protocol("empty Engine.IO packet".to_string()))?;
    let data = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(data).map_err(|e| {
            DeskError::Protocol(format!("invalid open handshake: {}", e))
        })?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(data.to_string())),
        '3' => Ok(EnginePacket::Pong(data.to_string())),
        '4' => Ok(EnginePacket::Message(data.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(DeskError::Protocol(format!(
            "unknown Engine.IO packet type '{}'",
            other
        ))),
    }
}

pub fn encode_engine(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(_) => "0".to_string(),
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(data) => format!("2{}", data),
        EnginePacket::Pong(data) => format!("3{}", data),
        EnginePacket::Message(data) => format!("4{}", data),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

/// Namespace connect request for the default namespace
pub fn connect_packet() -> String {
    encode_engine(&EnginePacket::Message("0".to_string()))
}

/// Namespace disconnect for the default namespace
pub fn disconnect_packet() -> String {
    encode_engine(&EnginePacket::Message("1".to_string()))
}

/// Decode the Socket.IO packet carried by an Engine.IO message
pub fn decode_socket(text: &str) -> crate::Result<SocketPacket> {
    let mut rest = text;
    let kind = rest
        .chars()
        .next()
        .ok_or_else(|| DeskError::Protocol("empty Socket.IO packet".to_string()))?;
    rest = &rest[kind.len_utf8()..];

    if matches!(kind, '5' | '6') {
        return Err(DeskError::Protocol(
            "binary Socket.IO packets are not supported".to_string(),
        ));
    }

    if rest.starts_with('/') {
        let (namespace, tail) = match rest.find(',') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if namespace != "/" {
            return Err(DeskError::Protocol(format!(
                "unexpected namespace '{}'",
                namespace
            )));
        }
        rest = tail;
    }

    let ack_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    rest = &rest[ack_len..];

    let data: Option<Value> = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest).map_err(|e| {
            DeskError::Protocol(format!("invalid Socket.IO payload: {}", e))
        })?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect(data)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(data),
        '3' => Ok(SocketPacket::Ack(data.unwrap_or(Value::Null))),
        '4' => Ok(SocketPacket::ConnectError(data.unwrap_or(Value::Null))),
        other => Err(DeskError::Protocol(format!(
            "unknown Socket.IO packet type '{}'",
            other
        ))),
    }
}

fn decode_event(data: Option<Value>) -> crate::Result<SocketPacket> {
    let mut items = match data {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(DeskError::Protocol(
                "event packet without [name, ...] array".to_string(),
            ))
        }
    };

    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(DeskError::Protocol(format!(
                "event name must be a string, got {}",
                other
            )))
        }
    };

    let payload = match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    };

    Ok(SocketPacket::Event { name, payload })
}

/// `ws(s)://` Socket.IO endpoint for an `http(s)://` base URL
pub fn endpoint_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/socket.io/?EIO=4&transport=websocket", base)
}
