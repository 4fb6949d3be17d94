//! Native messaging protocol types and validation for the tabtime host.
//!
//! The extension shim forwards browser activity to the host and answers the
//! tab/window lookups the host asks for. Both directions use the browser's
//! native messaging framing: a 4-byte native-endian length followed by a
//! UTF-8 JSON body. Keeping the types here prevents schema drift between the
//! host, its tests, and the shim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024; // 1MB

/// Browser sentinel for "no window has focus" (`chrome.windows.WINDOW_ID_NONE`).
pub const WINDOW_ID_NONE: i64 = -1;

/// Tab status reported once navigation has finished.
pub const STATUS_COMPLETE: &str = "complete";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shim → host
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub protocol_version: u32,
    #[serde(flatten)]
    pub message: Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Inbound {
    TabActivated {
        tab_id: i64,
        recorded_at: i64,
    },
    TabUpdated {
        tab_id: i64,
        #[serde(default)]
        status: Option<String>,
        recorded_at: i64,
    },
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<i64>,
        recorded_at: i64,
    },
    WindowRemoved {
        window_id: i64,
        recorded_at: i64,
    },
    LookupReply {
        request_id: u64,
        result: LookupResult,
    },
}

/// Normalizes a focus-change target: both `null` and the browser's
/// `WINDOW_ID_NONE` sentinel mean focus left the browser.
pub fn focused_window(window_id: Option<i64>) -> Option<i64> {
    window_id.filter(|id| *id != WINDOW_ID_NONE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: i64,
    pub window_id: i64,
    #[serde(default)]
    pub url: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupResult {
    /// Reply to `tab` and `active_tab` queries. `None` means the tab is gone
    /// or the browser refused the lookup.
    Tab {
        #[serde(default)]
        tab: Option<TabInfo>,
    },
    WindowCount {
        count: u32,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Host → shim
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LookupQuery {
    Tab { tab_id: i64 },
    ActiveTab { window_id: i64 },
    WindowCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub protocol_version: u32,
    #[serde(flatten)]
    pub message: Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Outbound {
    Lookup { request_id: u64, query: LookupQuery },
    Error { code: String, message: String },
}

impl OutboundEnvelope {
    pub fn lookup(request_id: u64, query: LookupQuery) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message: Outbound::Lookup { request_id, query },
        }
    }

    pub fn error(info: ErrorInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message: Outbound::Error {
                code: info.code,
                message: info.message,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

impl InboundEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(ErrorInfo::new(
                "unsupported_version",
                format!(
                    "protocolVersion {} is not supported (expected {})",
                    self.protocol_version, PROTOCOL_VERSION
                ),
            ));
        }

        match &self.message {
            Inbound::TabActivated {
                tab_id,
                recorded_at,
            }
            | Inbound::TabUpdated {
                tab_id,
                recorded_at,
                ..
            } => {
                require_tab_id(*tab_id)?;
                require_timestamp(*recorded_at)?;
            }
            Inbound::WindowFocusChanged { recorded_at, .. }
            | Inbound::WindowRemoved { recorded_at, .. } => {
                require_timestamp(*recorded_at)?;
            }
            Inbound::LookupReply { request_id, .. } => {
                if *request_id == 0 {
                    return Err(ErrorInfo::new(
                        "invalid_request_id",
                        "requestId must be positive",
                    ));
                }
            }
        }

        Ok(())
    }
}

pub fn parse_inbound(bytes: &[u8]) -> Result<Inbound, ErrorInfo> {
    let envelope: InboundEnvelope = serde_json::from_slice(bytes).map_err(|err| {
        ErrorInfo::new("invalid_message", format!("message is invalid: {}", err))
    })?;
    envelope.validate()?;
    Ok(envelope.message)
}

fn require_tab_id(tab_id: i64) -> Result<(), ErrorInfo> {
    if tab_id < 0 {
        return Err(ErrorInfo::new("invalid_tab_id", "tabId must be non-negative"));
    }
    Ok(())
}

fn require_timestamp(recorded_at: i64) -> Result<(), ErrorInfo> {
    if recorded_at <= 0 {
        return Err(ErrorInfo::new(
            "invalid_timestamp",
            "recordedAt must be positive epoch milliseconds",
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    /// The frame was skipped; the stream is still aligned on the next frame.
    TooLarge(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(err) => write!(f, "frame I/O failed: {}", err),
            FrameError::TooLarge(len) => write!(
                f,
                "frame of {} bytes exceeds the {} byte limit",
                len, MAX_MESSAGE_BYTES
            ),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(err) => Some(err),
            FrameError::TooLarge(_) => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        FrameError::Io(err)
    }
}

impl FrameError {
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            FrameError::Io(err) => ErrorInfo::new("io_error", err.to_string()),
            FrameError::TooLarge(_) => ErrorInfo::new("message_too_large", self.to_string()),
        }
    }
}

/// Reads one frame. Returns `Ok(None)` on a clean EOF before the length prefix.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated frame length",
            )));
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    if len > MAX_MESSAGE_BYTES {
        io::copy(&mut reader.take(len as u64), &mut io::sink())?;
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let body = serde_json::to_vec(message)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    if body.len() > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("outbound message of {} bytes is too large", body.len()),
        ));
    }
    writer.write_all(&(body.len() as u32).to_ne_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn parse(value: serde_json::Value) -> Result<Inbound, ErrorInfo> {
        parse_inbound(value.to_string().as_bytes())
    }

    #[test]
    fn parses_tab_activated() {
        let message = parse(json!({
            "protocolVersion": 1,
            "type": "tab_activated",
            "tabId": 7,
            "recordedAt": 1_700_000_000_000i64
        }))
        .expect("valid message");
        assert_eq!(
            message,
            Inbound::TabActivated {
                tab_id: 7,
                recorded_at: 1_700_000_000_000
            }
        );
    }

    #[test]
    fn tab_updated_status_is_optional() {
        let message = parse(json!({
            "protocolVersion": 1,
            "type": "tab_updated",
            "tabId": 3,
            "recordedAt": 5
        }))
        .expect("valid message");
        assert!(matches!(message, Inbound::TabUpdated { status: None, .. }));
    }

    #[test]
    fn parses_lookup_reply_with_missing_tab() {
        let message = parse(json!({
            "protocolVersion": 1,
            "type": "lookup_reply",
            "requestId": 4,
            "result": { "kind": "tab", "tab": null }
        }))
        .expect("valid message");
        assert_eq!(
            message,
            Inbound::LookupReply {
                request_id: 4,
                result: LookupResult::Tab { tab: None }
            }
        );
    }

    #[test]
    fn parses_lookup_reply_with_tab() {
        let message = parse(json!({
            "protocolVersion": 1,
            "type": "lookup_reply",
            "requestId": 2,
            "result": {
                "kind": "tab",
                "tab": { "id": 9, "windowId": 1, "url": "https://example.com/a", "active": true }
            }
        }))
        .expect("valid message");
        let Inbound::LookupReply { result, .. } = message else {
            panic!("expected lookup reply");
        };
        let LookupResult::Tab { tab: Some(tab) } = result else {
            panic!("expected tab result");
        };
        assert_eq!(tab.window_id, 1);
        assert_eq!(tab.url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn rejects_wrong_protocol_version() {
        let err = parse(json!({
            "protocolVersion": 99,
            "type": "window_removed",
            "windowId": 1,
            "recordedAt": 5
        }))
        .unwrap_err();
        assert_eq!(err.code, "unsupported_version");
    }

    #[test]
    fn rejects_non_positive_timestamp() {
        let err = parse(json!({
            "protocolVersion": 1,
            "type": "tab_activated",
            "tabId": 1,
            "recordedAt": 0
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_timestamp");
    }

    #[test]
    fn rejects_negative_tab_id() {
        let err = parse(json!({
            "protocolVersion": 1,
            "type": "tab_updated",
            "tabId": -4,
            "status": "complete",
            "recordedAt": 10
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_tab_id");
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse(json!({
            "protocolVersion": 1,
            "type": "tab_exploded",
            "recordedAt": 10
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_message");
    }

    #[test]
    fn focus_sentinel_means_no_window() {
        assert_eq!(focused_window(Some(WINDOW_ID_NONE)), None);
        assert_eq!(focused_window(None), None);
        assert_eq!(focused_window(Some(12)), Some(12));
    }

    #[test]
    fn lookup_serializes_with_camel_case_fields() {
        let value = serde_json::to_value(OutboundEnvelope::lookup(
            3,
            LookupQuery::ActiveTab { window_id: 8 },
        ))
        .expect("serialize");
        assert_eq!(
            value,
            json!({
                "protocolVersion": 1,
                "type": "lookup",
                "requestId": 3,
                "query": { "kind": "active_tab", "windowId": 8 }
            })
        );
    }

    #[test]
    fn frame_round_trip_and_clean_eof() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &OutboundEnvelope::lookup(1, LookupQuery::WindowCount))
            .expect("write frame");

        let mut cursor = Cursor::new(buffer);
        let body = read_frame(&mut cursor).expect("read").expect("frame present");
        let decoded: OutboundEnvelope = serde_json::from_slice(&body).expect("decode");
        assert_eq!(decoded, OutboundEnvelope::lookup(1, LookupQuery::WindowCount));
        assert!(read_frame(&mut cursor).expect("eof").is_none());
    }

    #[test]
    fn oversized_frame_is_skipped_and_stream_stays_aligned() {
        let oversized = MAX_MESSAGE_BYTES + 1;
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(oversized as u32).to_ne_bytes());
        buffer.extend(std::iter::repeat(b' ').take(oversized));
        write_frame(&mut buffer, &json!({"next": true})).expect("write follow-up");

        let mut cursor = Cursor::new(buffer);
        match read_frame(&mut cursor) {
            Err(FrameError::TooLarge(len)) => assert_eq!(len, oversized),
            other => panic!("expected TooLarge, got {:?}", other),
        }
        let body = read_frame(&mut cursor).expect("read").expect("frame present");
        assert_eq!(body, br#"{"next":true}"#.to_vec());
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        let mut cursor = Cursor::new(vec![1u8, 0]);
        assert!(matches!(read_frame(&mut cursor), Err(FrameError::Io(_))));
    }
}
