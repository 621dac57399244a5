//! ProtobufAgent: a coding-agent backend reached over a protobuf-over-HTTPS
//! wire format instead of JSON.
//!
//! The request is a single protobuf `Request` message; the response is a
//! base64-line SSE stream of protobuf `ResponseEvent` messages. Like
//! `ws_claude`, this isn't an HTTP-request/response shaped upstream from
//! the engine's point of view, so the whole exchange happens behind
//! `local_response` and `claude_stream` renders it back out as Claude SSE
//! or an aggregated `BetaMessage`.

use tokio::sync::mpsc;

use portcullis_core::{
    Credential, DispatchRule, DispatchTable, Proto, ProviderConfig, ProviderError, ProviderResult,
    Request, UpstreamBody, UpstreamCtx, UpstreamHttpResponse, UpstreamProvider,
};
use portcullis_translate::middleware::types::GenerateContentRequest;

use crate::providers::claude_stream::{
    self, AgentEvent, claude_sse_headers, collect_events, drive_stream, flatten_messages_to_prompt,
    local_json_response, model_name,
};
use crate::providers::oauth_common;

mod session;
mod tools;

pub(crate) mod pb {
    include!(concat!(env!("OUT_DIR"), "/portcullis.protobuf_agent.rs"));
}

const PROVIDER_NAME: &str = "protobuf_agent";
const DEFAULT_BASE_URL: &str = "https://agent.internal.example.com";

#[derive(Debug, Default)]
pub struct ProtobufAgentProvider;

impl ProtobufAgentProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for ProtobufAgentProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn dispatch_table(&self, _config: &ProviderConfig) -> DispatchTable {
        DispatchTable::new([
            // Claude
            DispatchRule::Native,
            DispatchRule::Native,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            // Gemini
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            // OpenAI chat completions
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            // OpenAI Responses
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            // OpenAI basic ops, OAuth, usage: all unsupported
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
        ])
    }

    fn local_response(
        &self,
        ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        req: &Request,
    ) -> ProviderResult<Option<UpstreamHttpResponse>> {
        let Request::GenerateContent(GenerateContentRequest::Claude(msg_req)) = req else {
            return Ok(None);
        };
        let Credential::ProtobufAgent(secret) = credential else {
            return Err(ProviderError::InvalidConfig(
                "expected Credential::ProtobufAgent".to_string(),
            ));
        };
        let base_url = protobuf_agent_base_url(config)?.to_string();
        let api_key = secret.api_key.clone();
        if api_key.is_empty() {
            return Err(ProviderError::MissingCredentialField("api_key"));
        }
        let model = model_name(&msg_req.body.model);
        let prompt = flatten_messages_to_prompt(&msg_req.body.messages);
        let is_stream = msg_req.body.stream.unwrap_or(false);
        let tool_defs = msg_req
            .body
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(tools::tool_to_definition).collect())
            .unwrap_or_default();
        let ctx_owned = ctx.clone();

        let (session_tx, session_rx) = mpsc::unbounded_channel::<AgentEvent>();
        let run_model = model.clone();
        tokio::spawn(async move {
            let result = session::run_session(
                &ctx_owned,
                &base_url,
                &api_key,
                run_model,
                prompt,
                tool_defs,
                is_stream,
                session_tx.clone(),
            )
            .await;
            if let Err(err) = result {
                let _ = session_tx.send(AgentEvent::TextDelta(format!(
                    "[protobuf_agent session error: {err}]"
                )));
                let _ = session_tx.send(AgentEvent::Stop { reason: "end_turn" });
            }
        });

        if is_stream {
            let (byte_tx, byte_rx) = mpsc::channel(64);
            tokio::spawn(drive_stream(model, session_rx, byte_tx));
            Ok(Some(UpstreamHttpResponse {
                status: 200,
                headers: claude_sse_headers(),
                body: UpstreamBody::Stream(byte_rx),
            }))
        } else {
            let collected = oauth_common::block_on(collect_events(session_rx));
            let body = claude_stream::aggregate_to_message(&model, collected);
            Ok(Some(local_json_response(200, body)))
        }
    }
}

fn protobuf_agent_base_url(config: &ProviderConfig) -> ProviderResult<&str> {
    match config {
        ProviderConfig::ProtobufAgent(cfg) => {
            Ok(cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
        }
        _ => Err(ProviderError::InvalidConfig(
            "expected ProviderConfig::ProtobufAgent".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_marks_claude_generate_native() {
        use portcullis_core::OperationKind;
        let provider = ProtobufAgentProvider::new();
        let cfg = ProviderConfig::ProtobufAgent(Default::default());
        let table = provider.dispatch_table(&cfg);
        assert!(matches!(
            table.rule(OperationKind::ClaudeGenerateStream),
            DispatchRule::Native
        ));
    }

    #[test]
    fn base_url_defaults_when_unset() {
        let cfg = ProviderConfig::ProtobufAgent(Default::default());
        assert_eq!(protobuf_agent_base_url(&cfg).unwrap(), DEFAULT_BASE_URL);
    }
}
