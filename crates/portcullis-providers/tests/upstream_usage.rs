use portcullis_core::credential::{ClaudeAwsAuthMethod, ClaudeAwsCredential, GeminiGcpCredential};
use portcullis_core::{Credential, HttpMethod, ProviderConfig, UpstreamCtx, header_get};

use portcullis_core::config::{ClaudeAwsConfig, GeminiGcpConfig};

use portcullis_providers::register_builtin_providers;

fn ctx(provider: &str, credential_id: i64) -> UpstreamCtx {
    UpstreamCtx {
        trace_id: None,
        user_id: None,
        user_key_id: None,
        user_agent: None,
        outbound_proxy: None,
        provider: provider.to_string(),
        credential_id: Some(credential_id),
        op: portcullis_core::Op::GenerateContent,
        internal: true,
        attempt_no: 0,
    }
}

#[tokio::test]
async fn gemini_gcp_upstream_usage_request_shape() {
    let mut reg = portcullis_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("gemini_gcp").unwrap();

    let config = ProviderConfig::GeminiGcp(GeminiGcpConfig {
        base_url: Some("https://daily-cloudcode-pa.sandbox.googleapis.com".to_string()),
        ..Default::default()
    });
    let cred = Credential::GeminiGcp(GeminiGcpCredential {
        access_token: "t".to_string(),
        refresh_token: "rtok".to_string(),
        expires_at: 0,
        project_id: "proj".to_string(),
        client_id: "cid".to_string(),
        client_secret: "csecret".to_string(),
        user_email: None,
    });

    let req = provider
        .build_upstream_usage(&ctx("gemini_gcp", 1), &config, &cred)
        .await
        .unwrap();
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(
        req.url,
        "https://daily-cloudcode-pa.sandbox.googleapis.com/v1internal:fetchAvailableModels"
    );
    assert_eq!(header_get(&req.headers, "authorization"), Some("Bearer t"));
    assert_eq!(
        header_get(&req.headers, "content-type"),
        Some("application/json")
    );
    assert!(req.body.is_some());
}

/// `claude_aws` and `ws_claude`/`protobuf_agent` don't expose a usage endpoint
/// (spec.md §6 names none), so `build_upstream_usage` falls back to the
/// default `Unsupported` hook.
#[tokio::test]
async fn claude_aws_has_no_usage_endpoint() {
    let mut reg = portcullis_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("claude_aws").unwrap();

    let config = ProviderConfig::ClaudeAws(ClaudeAwsConfig::default());
    let cred = Credential::ClaudeAws(ClaudeAwsCredential {
        access_token: "t".to_string(),
        refresh_token: "rtok".to_string(),
        client_id: None,
        client_secret: None,
        region: None,
        auth_method: ClaudeAwsAuthMethod::Social,
        expires_at: 0,
    });

    let err = provider
        .build_upstream_usage(&ctx("claude_aws", 2), &config, &cred)
        .await
        .unwrap_err();
    assert!(matches!(err, portcullis_core::ProviderError::Other(_)));
}

#[tokio::test]
async fn claude_aws_builds_generate_assistant_response_request() {
    let mut reg = portcullis_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("claude_aws").unwrap();

    let config = ProviderConfig::ClaudeAws(ClaudeAwsConfig {
        base_url: Some("https://codewhisperer.us-east-1.amazonaws.com".to_string()),
        ..Default::default()
    });
    let cred = Credential::ClaudeAws(ClaudeAwsCredential {
        access_token: "access-tok".to_string(),
        refresh_token: "refresh-tok".to_string(),
        client_id: None,
        client_secret: None,
        region: Some("us-east-1".to_string()),
        auth_method: ClaudeAwsAuthMethod::Social,
        expires_at: 0,
    });

    let body = portcullis_protocol::claude::create_message::request::CreateMessageRequestBody {
        max_tokens: 1024,
        messages: Vec::new(),
        model: portcullis_protocol::claude::count_tokens::types::Model::Custom(
            "claude-opus-4-20250514".to_string(),
        ),
        container: None,
        context_management: None,
        mcp_servers: None,
        metadata: None,
        output_config: None,
        output_format: None,
        service_tier: None,
        stop_sequences: None,
        stream: Some(false),
        system: None,
        temperature: None,
        thinking: None,
        tool_choice: None,
        tools: None,
        top_k: None,
        top_p: None,
    };
    let req_dto = portcullis_protocol::claude::create_message::request::CreateMessageRequest {
        headers: Default::default(),
        body,
    };

    let req = provider
        .build_claude_messages(&ctx("claude_aws", 3), &config, &cred, &req_dto)
        .await
        .unwrap();
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(
        req.url,
        "https://codewhisperer.us-east-1.amazonaws.com/GenerateAssistantResponse"
    );
    assert_eq!(
        header_get(&req.headers, "authorization"),
        Some("Bearer access-tok")
    );
    assert!(!req.is_stream);
    assert!(req.body.is_some());
}
