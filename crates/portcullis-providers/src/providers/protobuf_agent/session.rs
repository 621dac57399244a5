//! Drives a single protobuf-agent HTTP exchange: a protobuf-encoded
//! `Request` goes out as the POST body, and the response comes back as a
//! base64-line SSE stream of protobuf `ResponseEvent` messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures_util::StreamExt;
use prost::Message as _;
use tokio::sync::mpsc::UnboundedSender;

use portcullis_core::{ProviderError, ProviderResult, UpstreamCtx};

use crate::providers::claude_stream::AgentEvent;
use crate::providers::http_client::{SharedClientKind, client_for_ctx};
use crate::providers::protobuf_agent::pb;
use crate::providers::protobuf_agent::tools;

pub(super) async fn run_session(
    ctx: &UpstreamCtx,
    base_url: &str,
    api_key: &str,
    model: String,
    prompt: String,
    tool_defs: Vec<pb::ToolDefinition>,
    is_stream: bool,
    events: UnboundedSender<AgentEvent>,
) -> ProviderResult<()> {
    let request = pb::Request {
        task: Some(pb::Task {
            id: uuid::Uuid::new_v4().to_string(),
            prompt,
            history: Vec::new(),
            context: None,
            tools: tool_defs,
        }),
        model,
        stream: is_stream,
    };
    let body = request.encode_to_vec();

    let client = client_for_ctx(ctx, SharedClientKind::ProtobufAgent)?;
    let response = client
        .post(format!("{}/v1/agent/run", base_url.trim_end_matches('/')))
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/x-protobuf")
        .header("Accept", "text/event-stream")
        .body(Bytes::from(body))
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Other(format!(
            "protobuf agent request failed: {status} {body}"
        )));
    }

    let mut stream = response.bytes_stream();
    let mut buf = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| ProviderError::Other(err.to_string()))?;
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(idx) = buf.find('\n') {
            let line = buf[..idx].trim_end_matches('\r').to_string();
            buf.drain(..=idx);
            process_line(&line, &events);
        }
    }
    if !buf.trim().is_empty() {
        process_line(buf.trim_end_matches('\r'), &events);
    }

    Ok(())
}

fn process_line(line: &str, events: &UnboundedSender<AgentEvent>) {
    let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
        return;
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return;
    }
    let Ok(bytes) = BASE64.decode(payload) else {
        return;
    };
    let Ok(event) = pb::ResponseEvent::decode(bytes.as_slice()) else {
        return;
    };
    let Some(kind) = event.event else {
        return;
    };
    match kind {
        pb::response_event::Event::AgentOutput(text) => {
            let _ = events.send(AgentEvent::TextDelta(text));
        }
        pb::response_event::Event::ToolCall(call) => {
            let downstream_name = tools::to_downstream_name(&call.name, &call.input_json);
            let input_json = if downstream_name == "Bash" {
                tools::annotate_shell_input(&call.input_json)
            } else {
                call.input_json
            };
            let _ = events.send(AgentEvent::ToolUseStart {
                id: call.id,
                name: downstream_name,
            });
            if !input_json.is_empty() {
                let _ = events.send(AgentEvent::ToolUseInputDelta {
                    partial_json: input_json,
                });
            }
            let _ = events.send(AgentEvent::ToolUseStop);
        }
        pb::response_event::Event::ToolResult(_) => {}
        pb::response_event::Event::StreamFinished(finished) => {
            let usage = finished.usage.unwrap_or_default();
            let _ = events.send(AgentEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            });
            let reason = match finished.stop_reason.as_str() {
                "max_tokens" => "max_tokens",
                "tool_use" => "tool_use",
                _ => "end_turn",
            };
            let _ = events.send(AgentEvent::Stop { reason });
        }
    }
}
