//! Tool-Call Protocol
//!
//! The three channels that make up the wire contract between the host and
//! the sandboxed program: stdout line sentinels, request files, and
//! response files. This module is the Rust mirror of those JSON
//! structures plus the sentinel grammar used to multiplex them out of a
//! byte stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TOOL_REQUEST_PREFIX: &str = "__PTC_TOOL_REQUEST__";
pub const FINAL_PREFIX: &str = "__PTC_FINAL__";
pub const ERROR_PREFIX: &str = "__PTC_ERROR__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub tool: String,
    pub args: Value,
    #[serde(rename = "cacheKey")]
    pub cache_key: String,
}

/// `{requestId, success: true, result}` or `{requestId, success: false, error}`,
/// modeled with an explicit `success` discriminant rather than an untagged
/// enum so the on-disk JSON is exactly the shape the in-sandbox runtime
/// and the host agree on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn success(request_id: impl Into<String>, result: Value) -> Self {
        Self { request_id: request_id.into(), success: true, result: Some(result), error: None }
    }

    pub fn failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), success: false, result: None, error: Some(error.into()) }
    }
}

/// One parsed sentinel line observed on the sandboxed program's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum SentinelEvent {
    ToolRequest(String),
    Final(Value),
    Error(String),
}

/// Parse a single complete line for a sentinel, after any execution-scoped
/// nonce prefix has already been stripped by the caller. Returns `None`
/// for ordinary program output, which is simply not a sentinel.
pub fn parse_sentinel(line: &str) -> Option<SentinelEvent> {
    if let Some(rest) = line.strip_prefix(TOOL_REQUEST_PREFIX) {
        let id = rest.trim();
        if id.is_empty() {
            return None;
        }
        return Some(SentinelEvent::ToolRequest(id.to_string()));
    }
    if let Some(rest) = line.strip_prefix(FINAL_PREFIX) {
        let value: Value = serde_json::from_str(rest.trim()).unwrap_or(Value::Null);
        return Some(SentinelEvent::Final(value));
    }
    if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
        let parsed: Result<Value, _> = serde_json::from_str(rest.trim());
        let message = match parsed {
            Ok(value) => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| value.to_string()),
            Err(_) => return None,
        };
        return Some(SentinelEvent::Error(message));
    }
    None
}
