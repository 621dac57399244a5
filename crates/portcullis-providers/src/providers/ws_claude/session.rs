//! Drives a single WebSocket conversation against the orchids-style agent
//! backend and normalizes its event stream into [`AgentEvent`]s.
//!
//! One user-request frame goes out; everything after that is the agent's
//! event stream, with one exception: `fs_operation` requests are serviced
//! inline with a synthetic success reply, since this proxy doesn't run a
//! filesystem for the agent to operate on.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use portcullis_core::ProviderError;

use crate::providers::claude_stream::AgentEvent;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsAgentEvent {
    TextDelta {
        text: String,
    },
    ToolInputPreview {
        id: String,
        name: String,
        #[serde(default)]
        partial_input: String,
    },
    ToolInputComplete {
        id: String,
    },
    FsOperation {
        id: String,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done {
        #[serde(default)]
        stop_reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

pub(super) async fn run_session(
    ws_url: String,
    jwt: String,
    prompt: String,
    events: UnboundedSender<AgentEvent>,
) -> Result<(), ProviderError> {
    let mut request = ws_url
        .into_client_request()
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {jwt}"))
            .map_err(|err| ProviderError::Other(format!("invalid jwt header: {err}")))?,
    );

    let (stream, _response) = tokio::time::timeout(
        CONNECT_TIMEOUT,
        tokio_tungstenite::connect_async(request),
    )
    .await
    .map_err(|_| ProviderError::Other("websocket connect timed out".to_string()))?
    .map_err(|err| ProviderError::Other(format!("websocket connect failed: {err}")))?;

    let (mut sink, mut source) = stream.split();

    let initial = serde_json::json!({"type": "user_request", "prompt": prompt});
    sink.send(Message::Text(initial.to_string().into()))
        .await
        .map_err(|err| ProviderError::Other(format!("websocket send failed: {err}")))?;

    let mut open_tool: Option<String> = None;

    while let Some(frame) = source.next().await {
        let frame = frame.map_err(|err| ProviderError::Other(format!("websocket read failed: {err}")))?;
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        let Ok(event) = serde_json::from_str::<WsAgentEvent>(&text) else {
            continue;
        };

        match event {
            WsAgentEvent::TextDelta { text } => {
                let _ = events.send(AgentEvent::TextDelta(text));
            }
            WsAgentEvent::ToolInputPreview {
                id,
                name,
                partial_input,
            } => {
                if open_tool.as_deref() != Some(id.as_str()) {
                    let _ = events.send(AgentEvent::ToolUseStart { id: id.clone(), name });
                    open_tool = Some(id);
                }
                let _ = events.send(AgentEvent::ToolUseInputDelta {
                    partial_json: partial_input,
                });
            }
            WsAgentEvent::ToolInputComplete { id } => {
                if open_tool.as_deref() == Some(id.as_str()) {
                    let _ = events.send(AgentEvent::ToolUseStop);
                    open_tool = None;
                }
            }
            WsAgentEvent::FsOperation { id } => {
                let reply = serde_json::json!({
                    "type": "fs_operation_result",
                    "id": id,
                    "success": true,
                    "result": {},
                });
                if sink
                    .send(Message::Text(reply.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            WsAgentEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                let _ = events.send(AgentEvent::Usage {
                    input_tokens,
                    output_tokens,
                });
            }
            WsAgentEvent::Done { stop_reason } => {
                let reason = match stop_reason.as_deref() {
                    Some("max_tokens") => "max_tokens",
                    Some("tool_use") => "tool_use",
                    _ => "end_turn",
                };
                let _ = events.send(AgentEvent::Stop { reason });
                break;
            }
            WsAgentEvent::Unknown => {}
        }
    }

    let _ = sink.close().await;
    Ok(())
}
