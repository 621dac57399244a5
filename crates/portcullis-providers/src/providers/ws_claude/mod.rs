//! WebSocketClaude: an internal coding-agent backend reached over a
//! WebSocket session rather than request/response HTTP.
//!
//! Downstream requests still arrive as Anthropic Messages; this provider
//! opens a WebSocket per request, sends the flattened prompt as a single
//! frame, and renders the agent's event stream back out as Claude SSE (or,
//! for non-streaming callers, as one aggregated `BetaMessage`). See
//! `claude_stream` for that rendering and `session` for the socket itself.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use portcullis_core::credential::WsClaudeCredential;
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

mod refresh;
mod session;

const PROVIDER_NAME: &str = "ws_claude";
const DEFAULT_WS_URL: &str = "wss://www.orchids.app/api/agent/ws";
const DEFAULT_SESSIONS_URL: &str = "https://clerk.orchids.app/v1/client/sessions";
const JWT_REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Default)]
pub struct WsClaudeProvider;

impl WsClaudeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for WsClaudeProvider {
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

    fn upgrade_credential<'a>(
        &'a self,
        ctx: &'a UpstreamCtx,
        config: &'a ProviderConfig,
        credential: &'a Credential,
        _req: &'a Request,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<Option<Credential>>> + Send + 'a>> {
        Box::pin(async move {
            let Credential::WsClaude(secret) = credential else {
                return Ok(None);
            };
            if jwt_is_fresh(secret) {
                return Ok(None);
            }
            let sessions_url = ws_claude_sessions_url(config)?;
            let refreshed =
                refresh::refresh_session_jwt(ctx, sessions_url, &secret.session_key).await?;
            let mut updated = secret.clone();
            updated.cached_jwt = Some(refreshed.jwt);
            updated.jwt_expires_at = Some(refreshed.expires_at);
            Ok(Some(Credential::WsClaude(updated)))
        })
    }

    fn local_response(
        &self,
        _ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        req: &Request,
    ) -> ProviderResult<Option<UpstreamHttpResponse>> {
        let Request::GenerateContent(GenerateContentRequest::Claude(msg_req)) = req else {
            return Ok(None);
        };
        let Credential::WsClaude(secret) = credential else {
            return Err(ProviderError::InvalidConfig(
                "expected Credential::WsClaude".to_string(),
            ));
        };
        let jwt = secret
            .cached_jwt
            .clone()
            .ok_or(ProviderError::MissingCredentialField("cached_jwt"))?;
        let ws_url = ws_claude_base_url(config)?.to_string();
        let model = model_name(&msg_req.body.model);
        let prompt = flatten_messages_to_prompt(&msg_req.body.messages);
        let is_stream = msg_req.body.stream.unwrap_or(false);

        let (session_tx, session_rx) = mpsc::unbounded_channel::<AgentEvent>();
        tokio::spawn(async move {
            if let Err(err) = session::run_session(ws_url, jwt, prompt, session_tx.clone()).await {
                let _ = session_tx.send(AgentEvent::TextDelta(format!(
                    "[ws_claude session error: {err}]"
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

fn jwt_is_fresh(secret: &WsClaudeCredential) -> bool {
    let (Some(_), Some(expires_at)) = (&secret.cached_jwt, secret.jwt_expires_at) else {
        return false;
    };
    expires_at - JWT_REFRESH_SKEW_SECS > now_secs()
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn ws_claude_base_url(config: &ProviderConfig) -> ProviderResult<&str> {
    match config {
        ProviderConfig::WsClaude(cfg) => Ok(cfg.base_url.as_deref().unwrap_or(DEFAULT_WS_URL)),
        _ => Err(ProviderError::InvalidConfig(
            "expected ProviderConfig::WsClaude".to_string(),
        )),
    }
}

fn ws_claude_sessions_url(config: &ProviderConfig) -> ProviderResult<&str> {
    match config {
        ProviderConfig::WsClaude(cfg) => {
            Ok(cfg.sessions_url.as_deref().unwrap_or(DEFAULT_SESSIONS_URL))
        }
        _ => Err(ProviderError::InvalidConfig(
            "expected ProviderConfig::WsClaude".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_marks_claude_generate_native() {
        use portcullis_core::OperationKind;
        let provider = WsClaudeProvider::new();
        let cfg = ProviderConfig::WsClaude(Default::default());
        let table = provider.dispatch_table(&cfg);
        assert!(matches!(
            table.rule(OperationKind::ClaudeGenerate),
            DispatchRule::Native
        ));
        assert!(matches!(
            table.rule(OperationKind::ClaudeCountTokens),
            DispatchRule::Unsupported
        ));
    }

    #[test]
    fn jwt_freshness_requires_both_fields() {
        let secret = WsClaudeCredential {
            session_key: "sk".to_string(),
            cached_jwt: None,
            jwt_expires_at: None,
        };
        assert!(!jwt_is_fresh(&secret));
    }

    #[test]
    fn jwt_freshness_honors_skew() {
        let secret = WsClaudeCredential {
            session_key: "sk".to_string(),
            cached_jwt: Some("jwt".to_string()),
            jwt_expires_at: Some(now_secs() + 5),
        };
        assert!(!jwt_is_fresh(&secret));
    }

    #[test]
    fn base_url_defaults_when_unset() {
        let cfg = ProviderConfig::WsClaude(Default::default());
        assert_eq!(ws_claude_base_url(&cfg).unwrap(), DEFAULT_WS_URL);
    }
}
