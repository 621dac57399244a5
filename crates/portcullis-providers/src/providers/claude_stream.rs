//! Shared plumbing for adapters whose upstream isn't HTTP-request/response
//! shaped (`ws_claude`, `protobuf_agent`). Both drive a live session that
//! emits a sequence of [`AgentEvent`]s; this module renders that sequence
//! either as live Anthropic-shaped SSE (streaming requests) or as a single
//! aggregated `BetaMessage` JSON body (non-streaming requests).
//!
//! Tool calls are assumed to arrive one at a time: a `ToolUseStart` is
//! always followed by its `ToolUseInputDelta`s and a matching `ToolUseStop`
//! before the next tool starts. Both upstreams this module serves are
//! single-turn agent backends that satisfy this in practice.

use bytes::Bytes;
use tokio::sync::mpsc;

use portcullis_core::{Headers, UpstreamBody, UpstreamHttpResponse, header_set};
use portcullis_protocol::claude::count_tokens::types::{
    BetaContentBlockParam, BetaMessageContent, BetaMessageParam, BetaMessageRole,
    BetaToolResultContent, BetaToolResultContentBlockParam, Model,
};

/// `Model` serializes as a bare string (it's an untagged enum over known and
/// custom model ids), so round-tripping through `serde_json` is the
/// shortest path to the plain model name these agent backends expect.
pub(crate) fn model_name(model: &Model) -> String {
    match serde_json::to_value(model) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

/// Flattens Anthropic message history down to a single plain-text transcript.
/// Both agent backends this module serves take one prompt string per turn,
/// not structured content blocks, so tool-result/image blocks collapse to
/// their text where present and are otherwise dropped.
///
/// A `tool_use_id -> name` map is built from every `tool_use` block seen
/// along the way so a later `tool_result` block (which only carries the id)
/// can still be rendered against the name of the tool it answers.
pub(crate) fn flatten_messages_to_prompt(messages: &[BetaMessageParam]) -> String {
    let mut tool_names: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for message in messages {
        if let BetaMessageContent::Blocks(blocks) = &message.content {
            for block in blocks {
                if let BetaContentBlockParam::ToolUse(tool_use) = block {
                    tool_names.insert(tool_use.id.clone(), tool_use.name.clone());
                }
            }
        }
    }

    let mut out = String::new();
    for message in messages {
        let role = match message.role {
            BetaMessageRole::User => "User",
            BetaMessageRole::Assistant => "Assistant",
        };
        let text = match &message.content {
            BetaMessageContent::Text(text) => text.clone(),
            BetaMessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| block_text(block, &tool_names))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(role);
        out.push_str(": ");
        out.push_str(&text);
    }
    out
}

fn block_text(
    block: &BetaContentBlockParam,
    tool_names: &std::collections::HashMap<String, String>,
) -> Option<String> {
    match block {
        BetaContentBlockParam::Text(text) => Some(text.text.clone()),
        BetaContentBlockParam::ToolUse(tool_use) => {
            Some(format!("[tool_use {} {}]", tool_use.name, tool_use.id))
        }
        BetaContentBlockParam::ToolResult(result) => {
            let name = tool_names
                .get(&result.tool_use_id)
                .map(String::as_str)
                .unwrap_or("unknown_tool");
            let body = match &result.content {
                Some(BetaToolResultContent::Text(text)) => text.clone(),
                Some(BetaToolResultContent::Blocks(blocks)) => blocks
                    .iter()
                    .filter_map(|b| match b {
                        BetaToolResultContentBlockParam::Text(t) => Some(t.text.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => String::new(),
            };
            Some(format!("[tool_result {name} {}: {body}]", result.tool_use_id))
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub(crate) enum AgentEvent {
    TextDelta(String),
    ToolUseStart { id: String, name: String },
    ToolUseInputDelta { partial_json: String },
    ToolUseStop,
    Usage { input_tokens: u32, output_tokens: u32 },
    Stop { reason: &'static str },
}

pub(crate) fn local_json_response(status: u16, body: serde_json::Value) -> UpstreamHttpResponse {
    let mut headers = Headers::new();
    header_set(&mut headers, "content-type", "application/json");
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    UpstreamHttpResponse {
        status,
        headers,
        body: UpstreamBody::Bytes(Bytes::from(bytes)),
    }
}

pub(crate) fn claude_sse_headers() -> Headers {
    let mut headers = Headers::new();
    header_set(&mut headers, "content-type", "text/event-stream");
    header_set(&mut headers, "cache-control", "no-cache");
    headers
}

fn sse_frame(event: &str, data: serde_json::Value) -> Bytes {
    let payload = serde_json::to_string(&data).unwrap_or_default();
    Bytes::from(format!("event: {event}\ndata: {payload}\n\n"))
}

fn message_start_frame(message_id: &str, model: &str) -> Bytes {
    sse_frame(
        "message_start",
        serde_json::json!({
            "type": "message_start",
            "message": {
                "id": message_id,
                "type": "message",
                "role": "assistant",
                "model": model,
                "content": [],
                "stop_reason": null,
                "stop_sequence": null,
                "usage": {"input_tokens": 0, "output_tokens": 0},
            }
        }),
    )
}

fn content_block_start_text(index: u32) -> Bytes {
    sse_frame(
        "content_block_start",
        serde_json::json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "text", "text": ""},
        }),
    )
}

fn content_block_delta_text(index: u32, text: &str) -> Bytes {
    sse_frame(
        "content_block_delta",
        serde_json::json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "text_delta", "text": text},
        }),
    )
}

fn content_block_start_tool(index: u32, id: &str, name: &str) -> Bytes {
    sse_frame(
        "content_block_start",
        serde_json::json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}},
        }),
    )
}

fn content_block_delta_tool(index: u32, partial_json: &str) -> Bytes {
    sse_frame(
        "content_block_delta",
        serde_json::json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "input_json_delta", "partial_json": partial_json},
        }),
    )
}

fn content_block_stop(index: u32) -> Bytes {
    sse_frame(
        "content_block_stop",
        serde_json::json!({"type": "content_block_stop", "index": index}),
    )
}

fn message_delta_frame(stop_reason: &str, usage: (u32, u32)) -> Bytes {
    sse_frame(
        "message_delta",
        serde_json::json!({
            "type": "message_delta",
            "delta": {"stop_reason": stop_reason, "stop_sequence": null},
            "usage": {"input_tokens": usage.0, "output_tokens": usage.1},
        }),
    )
}

fn message_stop_frame() -> Bytes {
    sse_frame("message_stop", serde_json::json!({"type": "message_stop"}))
}

/// Consumes `events` and forwards Anthropic-shaped SSE frames into `out` as
/// they arrive. Runs to completion (or until the downstream reader drops
/// `out`) inside a spawned task — never call this from `local_response`
/// itself, it would block the caller for the whole session.
pub(crate) async fn drive_stream(
    model: String,
    mut events: mpsc::UnboundedReceiver<AgentEvent>,
    out: mpsc::Sender<Bytes>,
) {
    let message_id = format!("msg_{}", uuid::Uuid::new_v4());
    if out.send(message_start_frame(&message_id, &model)).await.is_err() {
        return;
    }

    let mut text_open = false;
    let mut tool_open = false;
    let mut next_index: u32 = 0;
    let mut usage = (0u32, 0u32);
    let mut stop_reason = "end_turn";

    while let Some(ev) = events.recv().await {
        match ev {
            AgentEvent::TextDelta(text) => {
                if !text_open {
                    if out.send(content_block_start_text(next_index)).await.is_err() {
                        return;
                    }
                    text_open = true;
                }
                if out
                    .send(content_block_delta_text(next_index, &text))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            AgentEvent::ToolUseStart { id, name } => {
                if text_open {
                    let _ = out.send(content_block_stop(next_index)).await;
                    text_open = false;
                    next_index += 1;
                }
                if out
                    .send(content_block_start_tool(next_index, &id, &name))
                    .await
                    .is_err()
                {
                    return;
                }
                tool_open = true;
            }
            AgentEvent::ToolUseInputDelta { partial_json } => {
                if tool_open
                    && out
                        .send(content_block_delta_tool(next_index, &partial_json))
                        .await
                        .is_err()
                {
                    return;
                }
            }
            AgentEvent::ToolUseStop => {
                if tool_open {
                    let _ = out.send(content_block_stop(next_index)).await;
                    tool_open = false;
                    next_index += 1;
                }
            }
            AgentEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                usage = (input_tokens, output_tokens);
            }
            AgentEvent::Stop { reason } => stop_reason = reason,
        }
    }

    if text_open || tool_open {
        let _ = out.send(content_block_stop(next_index)).await;
    }
    let _ = out.send(message_delta_frame(stop_reason, usage)).await;
    let _ = out.send(message_stop_frame()).await;
}

/// Drains `events` fully and returns them for `aggregate_to_message`. Used
/// for non-streaming requests, which must wait for the whole conversation
/// to finish before a single JSON body can be returned.
pub(crate) async fn collect_events(
    mut events: mpsc::UnboundedReceiver<AgentEvent>,
) -> Vec<AgentEvent> {
    let mut all = Vec::new();
    while let Some(ev) = events.recv().await {
        all.push(ev);
    }
    all
}

pub(crate) fn aggregate_to_message(model: &str, events: Vec<AgentEvent>) -> serde_json::Value {
    let mut content = Vec::new();
    let mut text_buf = String::new();
    let mut current_tool: Option<(String, String, String)> = None;
    let mut usage = (0u32, 0u32);
    let mut stop_reason = "end_turn";

    for ev in events {
        match ev {
            AgentEvent::TextDelta(text) => text_buf.push_str(&text),
            AgentEvent::ToolUseStart { id, name } => {
                if !text_buf.is_empty() {
                    content.push(serde_json::json!({"type": "text", "text": text_buf}));
                    text_buf = String::new();
                }
                current_tool = Some((id, name, String::new()));
            }
            AgentEvent::ToolUseInputDelta { partial_json } => {
                if let Some((_, _, buf)) = current_tool.as_mut() {
                    buf.push_str(&partial_json);
                }
            }
            AgentEvent::ToolUseStop => {
                if let Some((id, name, buf)) = current_tool.take() {
                    let input: serde_json::Value =
                        serde_json::from_str(&buf).unwrap_or_else(|_| serde_json::json!({}));
                    content.push(serde_json::json!({
                        "type": "tool_use", "id": id, "name": name, "input": input,
                    }));
                }
            }
            AgentEvent::Usage {
                input_tokens,
                output_tokens,
            } => usage = (input_tokens, output_tokens),
            AgentEvent::Stop { reason } => stop_reason = reason,
        }
    }
    if !text_buf.is_empty() {
        content.push(serde_json::json!({"type": "text", "text": text_buf}));
    }

    serde_json::json!({
        "id": format!("msg_{}", uuid::Uuid::new_v4()),
        "content": content,
        "model": model,
        "role": "assistant",
        "stop_reason": stop_reason,
        "stop_sequence": null,
        "type": "message",
        "usage": {
            "cache_creation": {"ephemeral_1h_input_tokens": 0, "ephemeral_5m_input_tokens": 0},
            "cache_creation_input_tokens": 0,
            "cache_read_input_tokens": 0,
            "input_tokens": usage.0,
            "output_tokens": usage.1,
            "service_tier": "standard",
        },
    })
}
