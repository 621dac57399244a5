mod model_unavailable_queue;
mod pool;
mod state;
mod unavailable_queue;

pub use pool::{AcquireError, CredentialLockGuard, CredentialPool};
pub use state::{CredentialId, CredentialState, UnavailableReason};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Credential {
    ClaudeAws(ClaudeAwsCredential),
    GeminiGcp(GeminiGcpCredential),
    WsClaude(WsClaudeCredential),
    ProtobufAgent(ProtobufAgentCredential),
}

/// `auth_method` determines which refresh endpoint applies (see
/// `portcullis-providers::providers::claude_aws::refresh`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaudeAwsAuthMethod {
    Social,
    DeviceCode,
    IdC,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeAwsCredential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub auth_method: ClaudeAwsAuthMethod,
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiGcpCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    /// Populated by the one-time onboarding step; empty until discovered.
    #[serde(default)]
    pub project_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// "Refresh" for this provider means re-deriving a session JWT from the Clerk
/// sessions endpoint using `session_key`, not an OAuth refresh grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsClaudeCredential {
    pub session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_jwt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_expires_at: Option<i64>,
}

/// Treated as a long-lived key with no expiry; `refresh` is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtobufAgentCredential {
    pub api_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_claude_allows_session_key_only() {
        let value = serde_json::json!({
            "WsClaude": {
                "session_key": "sess_123"
            }
        });
        let cred: Credential = serde_json::from_value(value).expect("credential should parse");
        match cred {
            Credential::WsClaude(secret) => {
                assert_eq!(secret.session_key, "sess_123");
                assert_eq!(secret.cached_jwt, None);
            }
            other => panic!("unexpected credential variant: {other:?}"),
        }
    }

    #[test]
    fn claude_aws_round_trips_auth_method() {
        let cred = Credential::ClaudeAws(ClaudeAwsCredential {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            client_id: None,
            client_secret: None,
            region: Some("us-east-1".to_string()),
            auth_method: ClaudeAwsAuthMethod::Social,
            expires_at: 0,
        });
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        match back {
            Credential::ClaudeAws(secret) => {
                assert_eq!(secret.auth_method, ClaudeAwsAuthMethod::Social);
                assert_eq!(secret.region.as_deref(), Some("us-east-1"));
            }
            other => panic!("unexpected credential variant: {other:?}"),
        }
    }
}
