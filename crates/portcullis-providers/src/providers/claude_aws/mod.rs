//! ClaudeAWS: Claude models served through an AWS-fronted coding-agent backend
//! (Kiro/CodeWhisperer-style `GenerateAssistantResponse` endpoint).
//!
//! The downstream-facing shape is Anthropic Messages; this provider wraps that
//! body in the backend's `conversationState` envelope and unwraps headers on
//! the way out. Auth is refresh-token only — there is no browser OAuth flow
//! here, just the two refresh grants named by `ClaudeAwsAuthMethod`.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use portcullis_core::credential::{ClaudeAwsAuthMethod, ClaudeAwsCredential};
use portcullis_core::provider::UpstreamFailure;
use portcullis_core::{
    AuthRetryAction, Credential, DispatchRule, DispatchTable, HttpMethod, Proto, ProviderConfig,
    ProviderError, ProviderResult, Request, UpstreamCtx, UpstreamHttpRequest, UpstreamProvider,
};

use crate::auth_extractor;

mod refresh;

const PROVIDER_NAME: &str = "claude_aws";
const DEFAULT_BASE_URL: &str = "https://codewhisperer.us-east-1.amazonaws.com";
const GENERATE_PATH: &str = "/GenerateAssistantResponse";
const CLAUDE_AWS_USER_AGENT: &str = "portcullis-claude-aws/1.0";

#[derive(Debug, Default)]
pub struct ClaudeAwsProvider;

impl ClaudeAwsProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for ClaudeAwsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn dispatch_table(&self, _config: &ProviderConfig) -> DispatchTable {
        DispatchTable::new([
            // Claude
            DispatchRule::Native,
            DispatchRule::Native,
            DispatchRule::Native,
            DispatchRule::Native,
            DispatchRule::Native,
            // Gemini
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
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
            // OpenAI basic ops
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            DispatchRule::Transform {
                target: Proto::Claude,
            },
            // OAuth start/callback are not offered (refresh-token only); usage unsupported.
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
            DispatchRule::Unsupported,
        ])
    }

    async fn build_claude_messages(
        &self,
        _ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        req: &portcullis_protocol::claude::create_message::request::CreateMessageRequest,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = claude_aws_base_url(config)?;
        let access_token = claude_aws_access_token(credential)?;
        let url = format!("{}{}", base_url.trim_end_matches('/'), GENERATE_PATH);
        let envelope = wrap_conversation_state(&req.body);

        let mut headers = portcullis_core::Headers::new();
        auth_extractor::set_bearer(&mut headers, &access_token);
        auth_extractor::set_content_type_json(&mut headers);
        auth_extractor::set_accept_json(&mut headers);
        auth_extractor::set_user_agent(&mut headers, CLAUDE_AWS_USER_AGENT);

        let body = serde_json::to_vec(&envelope).map_err(|err| ProviderError::Other(err.to_string()))?;
        let is_stream = req.body.stream.unwrap_or(false);
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream,
        })
    }

    async fn build_claude_count_tokens(
        &self,
        _ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        req: &portcullis_protocol::claude::count_tokens::request::CountTokensRequest,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = claude_aws_base_url(config)?;
        let access_token = claude_aws_access_token(credential)?;
        let url = format!(
            "{}/CountTokens",
            base_url.trim_end_matches('/')
        );
        let mut headers = portcullis_core::Headers::new();
        auth_extractor::set_bearer(&mut headers, &access_token);
        auth_extractor::set_content_type_json(&mut headers);
        auth_extractor::set_user_agent(&mut headers, CLAUDE_AWS_USER_AGENT);
        let body =
            serde_json::to_vec(&req.body).map_err(|err| ProviderError::Other(err.to_string()))?;
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream: false,
        })
    }

    async fn build_claude_models_list(
        &self,
        _ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        _req: &portcullis_protocol::claude::list_models::request::ListModelsRequest,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = claude_aws_base_url(config)?;
        let access_token = claude_aws_access_token(credential)?;
        let url = format!("{}/ListAvailableModels", base_url.trim_end_matches('/'));
        let mut headers = portcullis_core::Headers::new();
        auth_extractor::set_bearer(&mut headers, &access_token);
        auth_extractor::set_accept_json(&mut headers);
        auth_extractor::set_user_agent(&mut headers, CLAUDE_AWS_USER_AGENT);
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
            is_stream: false,
        })
    }

    async fn build_claude_models_get(
        &self,
        _ctx: &UpstreamCtx,
        config: &ProviderConfig,
        credential: &Credential,
        req: &portcullis_protocol::claude::get_model::request::GetModelRequest,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base_url = claude_aws_base_url(config)?;
        let access_token = claude_aws_access_token(credential)?;
        let url = format!(
            "{}/ListAvailableModels/{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&req.path.model_id)
        );
        let mut headers = portcullis_core::Headers::new();
        auth_extractor::set_bearer(&mut headers, &access_token);
        auth_extractor::set_accept_json(&mut headers);
        auth_extractor::set_user_agent(&mut headers, CLAUDE_AWS_USER_AGENT);
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
            is_stream: false,
        })
    }

    fn on_auth_failure<'a>(
        &'a self,
        ctx: &'a UpstreamCtx,
        _config: &'a ProviderConfig,
        credential: &'a Credential,
        _req: &'a Request,
        failure: &'a UpstreamFailure,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<AuthRetryAction>> + Send + 'a>> {
        Box::pin(async move {
            let UpstreamFailure::Http { status, .. } = failure else {
                return Ok(AuthRetryAction::None);
            };
            if *status != 401 && *status != 403 {
                return Ok(AuthRetryAction::None);
            }
            let Credential::ClaudeAws(secret) = credential else {
                return Ok(AuthRetryAction::None);
            };

            let refreshed = match secret.auth_method {
                ClaudeAwsAuthMethod::Social => {
                    refresh::refresh_social(ctx, &secret.refresh_token, secret.region.as_deref())
                        .await?
                }
                ClaudeAwsAuthMethod::DeviceCode | ClaudeAwsAuthMethod::IdC => {
                    let client_id = secret
                        .client_id
                        .as_deref()
                        .ok_or(ProviderError::MissingCredentialField("client_id"))?;
                    let client_secret = secret
                        .client_secret
                        .as_deref()
                        .ok_or(ProviderError::MissingCredentialField("client_secret"))?;
                    refresh::refresh_oidc(
                        ctx,
                        &secret.refresh_token,
                        client_id,
                        client_secret,
                        secret.region.as_deref(),
                    )
                    .await?
                }
            };

            let mut updated = secret.clone();
            updated.access_token = refreshed.access_token;
            if let Some(refresh_token) = refreshed.refresh_token {
                updated.refresh_token = refresh_token;
            }
            updated.expires_at = refreshed.expires_at;
            Ok(AuthRetryAction::UpdateCredential(Box::new(
                Credential::ClaudeAws(updated),
            )))
        })
    }
}

fn claude_aws_base_url(config: &ProviderConfig) -> ProviderResult<&str> {
    match config {
        ProviderConfig::ClaudeAws(cfg) => Ok(cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        _ => Err(ProviderError::InvalidConfig(
            "expected ProviderConfig::ClaudeAws".to_string(),
        )),
    }
}

fn claude_aws_access_token(credential: &Credential) -> ProviderResult<String> {
    match credential {
        Credential::ClaudeAws(secret) => {
            if secret.access_token.is_empty() {
                Err(ProviderError::MissingCredentialField("access_token"))
            } else {
                Ok(secret.access_token.clone())
            }
        }
        _ => Err(ProviderError::InvalidConfig(
            "expected Credential::ClaudeAws".to_string(),
        )),
    }
}

/// Wraps the literal Anthropic Messages body inside the backend's
/// `conversationState` envelope. The raw `userInputMessage.content` carries
/// the Anthropic JSON verbatim so the downstream SSE/JSON shape round-trips
/// without a second translation layer.
fn wrap_conversation_state(
    body: &portcullis_protocol::claude::create_message::request::CreateMessageRequestBody,
) -> serde_json::Value {
    serde_json::json!({
        "conversationState": {
            "chatTriggerType": "MANUAL",
            "currentMessage": {
                "userInputMessage": {
                    "modelId": body.model,
                    "content": body,
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_secret(auth_method: ClaudeAwsAuthMethod) -> ClaudeAwsCredential {
        ClaudeAwsCredential {
            access_token: "tok".to_string(),
            refresh_token: "rtok".to_string(),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            region: Some("us-east-1".to_string()),
            auth_method,
            expires_at: 0,
        }
    }

    #[test]
    fn dispatch_table_marks_claude_ops_native() {
        use portcullis_core::OperationKind;
        let provider = ClaudeAwsProvider::new();
        let cfg = ProviderConfig::ClaudeAws(Default::default());
        let table = provider.dispatch_table(&cfg);
        assert!(matches!(
            table.rule(OperationKind::ClaudeGenerate),
            DispatchRule::Native
        ));
        assert!(matches!(
            table.rule(OperationKind::GeminiGenerate),
            DispatchRule::Transform {
                target: Proto::Claude
            }
        ));
    }

    #[test]
    fn base_url_defaults_when_unset() {
        let cfg = ProviderConfig::ClaudeAws(Default::default());
        assert_eq!(claude_aws_base_url(&cfg).unwrap(), DEFAULT_BASE_URL);
    }

    #[test]
    fn access_token_requires_non_empty_value() {
        let mut secret = default_secret(ClaudeAwsAuthMethod::Social);
        secret.access_token = String::new();
        let err = claude_aws_access_token(&Credential::ClaudeAws(secret)).unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentialField("access_token")));
    }

    #[test]
    fn wrap_conversation_state_embeds_model_id() {
        let body = portcullis_protocol::claude::create_message::request::CreateMessageRequestBody {
            max_tokens: 16,
            messages: vec![],
            model: serde_json::from_value(serde_json::json!("claude-sonnet-4-5")).unwrap(),
            container: None,
            context_management: None,
            mcp_servers: None,
            metadata: None,
            output_config: None,
            output_format: None,
            service_tier: None,
            stop_sequences: None,
            stream: None,
            system: None,
            temperature: None,
            thinking: None,
            tool_choice: None,
            tools: None,
            top_k: None,
            top_p: None,
        };
        let value = wrap_conversation_state(&body);
        assert_eq!(
            value["conversationState"]["currentMessage"]["userInputMessage"]["modelId"],
            serde_json::json!("claude-sonnet-4-5")
        );
    }
}
