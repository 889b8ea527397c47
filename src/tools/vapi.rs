//! Voice platform tool-call envelope.
//!
//! Requests carry one tool call, found in any of several places depending
//! on the webhook flavor. Responses always use the
//! `{"results": [{"toolCallId", "result"}]}` shape.

use serde::Serialize;
use serde_json::{Map, Value};

/// One tool invocation from the voice platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Echoed back in the response; empty when the platform sent none
    pub id: String,
    pub name: Option<String>,
    /// Always a JSON value; string-encoded arguments are decoded, and
    /// undecodable ones become `null`
    pub arguments: Value,
}

/// Find the tool call in a request body.
///
/// Checked in order: `message.toolCalls[0]`, `message.toolCallList[0]`,
/// `message.toolCall`, then the body itself when it has a `function`.
pub fn extract_tool_call(body: &Value) -> Option<ToolCall> {
    let message = body.get("message");
    let first = |key: &str| {
        message
            .and_then(|message| message.get(key))
            .and_then(Value::as_array)
            .and_then(|calls| calls.first())
    };

    let call = first("toolCalls")
        .or_else(|| first("toolCallList"))
        .or_else(|| message.and_then(|message| message.get("toolCall")))
        .filter(|call| call.is_object())
        .or_else(|| body.get("function").map(|_| body))?;

    let function = call.get("function");
    let raw_arguments = function
        .and_then(|function| function.get("arguments"))
        .or_else(|| call.get("arguments"));

    let arguments = match raw_arguments {
        Some(Value::String(encoded)) => serde_json::from_str(encoded).unwrap_or(Value::Null),
        Some(value) => value.clone(),
        None => Value::Object(Map::new()),
    };

    Some(ToolCall {
        id: call
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: function
            .and_then(|function| function.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        arguments,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub results: Vec<ToolResult>,
}

impl ToolResponse {
    pub fn new(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            results: vec![ToolResult {
                tool_call_id: tool_call_id.into(),
                result: result.into(),
            }],
        }
    }
}
