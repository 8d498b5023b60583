//! Server List Ping client
//!
//! Implements the status half of the Minecraft Java edition handshake:
//!
//! ```text
//! client                                   server
//!   │ ── Handshake(version, host, port, 1) ──▶ │
//!   │ ── StatusRequest ──────────────────────▶ │
//!   │ ◀───────────── StatusResponse(json) ──── │
//! ```
//!
//! Every packet is framed as `VarInt length ‖ VarInt packet id ‖ payload`.
//! The whole exchange runs under a single timeout so a stalled server can never
//! hold a worker longer than that.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{instrument, trace};

use super::{QueryClient, QueryError, QueryResult, ServerAddress};
use crate::StatusSample;
use crate::config::QueryConfig;

/// Upper bound for a status response frame (favicons are inlined as base64)
const MAX_RESPONSE_LEN: usize = 2 * 1024 * 1024;

const HANDSHAKE_PACKET_ID: i32 = 0x00;
const STATUS_PACKET_ID: i32 = 0x00;
const NEXT_STATE_STATUS: i32 = 1;

/// Query client speaking the Server List Ping protocol over TCP
#[derive(Debug, Clone)]
pub struct SlpClient {
    timeout: Duration,
    protocol_version: i32,
}

impl SlpClient {
    pub fn new(timeout: Duration, protocol_version: i32) -> Self {
        Self {
            timeout,
            protocol_version,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.protocol_version,
        )
    }

    async fn exchange(&self, address: &ServerAddress) -> QueryResult<String> {
        let mut stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
        trace!("connected to {address}");

        let mut handshake = Vec::with_capacity(address.host.len() + 16);
        write_varint(&mut handshake, HANDSHAKE_PACKET_ID);
        write_varint(&mut handshake, self.protocol_version);
        write_string(&mut handshake, &address.host);
        handshake.extend_from_slice(&address.port.to_be_bytes());
        write_varint(&mut handshake, NEXT_STATE_STATUS);

        let mut request = frame(&handshake);
        request.extend(frame(&[STATUS_PACKET_ID as u8]));
        stream.write_all(&request).await?;
        stream.flush().await?;

        let length = read_varint(&mut stream).await?;
        if length <= 0 || length as usize > MAX_RESPONSE_LEN {
            return Err(QueryError::Protocol(format!(
                "invalid response length {length}"
            )));
        }

        let mut body = vec![0u8; length as usize];
        stream.read_exact(&mut body).await?;

        let mut cursor = body.as_slice();
        let packet_id = read_varint(&mut cursor).await?;
        if packet_id != STATUS_PACKET_ID {
            return Err(QueryError::Protocol(format!(
                "unexpected packet id {packet_id:#04x}"
            )));
        }

        let json_len = read_varint(&mut cursor).await?;
        if json_len < 0 || json_len as usize > cursor.len() {
            return Err(QueryError::Protocol(format!(
                "status string length {json_len} exceeds frame"
            )));
        }

        String::from_utf8(cursor[..json_len as usize].to_vec())
            .map_err(|e| QueryError::Protocol(format!("status is not UTF-8: {e}")))
    }
}

#[async_trait]
impl QueryClient for SlpClient {
    #[instrument(skip(self))]
    async fn query(&self, address: &str) -> QueryResult<StatusSample> {
        let address: ServerAddress = address.parse()?;

        let json = tokio::time::timeout(self.timeout, self.exchange(&address))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??;

        trace!("received {} bytes of status JSON", json.len());
        parse_status(&json)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    players: Players,
    #[serde(default)]
    description: Value,
    favicon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Players {
    online: u32,
    max: u32,
}

/// Decode the JSON payload of a status response
pub fn parse_status(json: &str) -> QueryResult<StatusSample> {
    let response: StatusResponse = serde_json::from_str(json)?;

    let mut description = String::new();
    flatten_chat(&response.description, &mut description);

    Ok(StatusSample {
        online: response.players.online,
        max: response.players.max,
        description: strip_formatting(&description).trim().to_string(),
        favicon: response.favicon,
    })
}

/// Collect the plain text of a chat component (string, array or `{text, extra}`)
fn flatten_chat(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| flatten_chat(part, out)),
        Value::Object(component) => {
            if let Some(text) = component.get("text") {
                flatten_chat(text, out);
            }
            if let Some(extra) = component.get("extra") {
                flatten_chat(extra, out);
            }
        }
        _ => {}
    }
}

/// Remove `§x` formatting codes
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> QueryResult<i32> {
    let mut value: u32 = 0;
    for position in 0..5 {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7F) as u32) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("VarInt is too big".to_string()))
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut out, payload.len() as i32);
    out.extend_from_slice(payload);
    out
}
