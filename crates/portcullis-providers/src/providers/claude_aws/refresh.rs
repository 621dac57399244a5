//! Refresh-token exchange for the two Kiro/CodeWhisperer auth families.
//!
//! `Social` credentials refresh against the desktop-auth host; `DeviceCode`/`IdC`
//! credentials refresh against the regional OIDC token endpoint.

use serde::Deserialize;

use portcullis_core::{ProviderError, ProviderResult, UpstreamCtx};

use crate::providers::http_client::{SharedClientKind, client_for_ctx};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Deserialize)]
struct SocialRefreshResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OidcRefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub(super) struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

pub(super) async fn refresh_social(
    ctx: &UpstreamCtx,
    refresh_token: &str,
    region: Option<&str>,
) -> ProviderResult<RefreshedTokens> {
    let region = region.unwrap_or(DEFAULT_REGION);
    let url = format!("https://prod.{region}.auth.desktop.kiro.dev/refreshToken");
    let client = client_for_ctx(ctx, SharedClientKind::ClaudeAws)?;
    let resp = client
        .post(&url)
        .json(&serde_json::json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    if !status.is_success() {
        return Err(ProviderError::Other(format!(
            "kiro refreshToken failed: {status} {body}"
        )));
    }
    let parsed: SocialRefreshResponse =
        serde_json::from_str(&body).map_err(|err| ProviderError::Other(err.to_string()))?;
    Ok(RefreshedTokens {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at: chrono_now() + parsed.expires_in.unwrap_or(3600),
    })
}

pub(super) async fn refresh_oidc(
    ctx: &UpstreamCtx,
    refresh_token: &str,
    client_id: &str,
    client_secret: &str,
    region: Option<&str>,
) -> ProviderResult<RefreshedTokens> {
    let region = region.unwrap_or(DEFAULT_REGION);
    let url = format!("https://oidc.{region}.amazonaws.com/token");
    let client = client_for_ctx(ctx, SharedClientKind::ClaudeAws)?;
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "refreshToken": refresh_token,
            "clientId": client_id,
            "clientSecret": client_secret,
            "grantType": "refresh_token",
        }))
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    if !status.is_success() {
        return Err(ProviderError::Other(format!(
            "oidc token refresh failed: {status} {body}"
        )));
    }
    let parsed: OidcRefreshResponse =
        serde_json::from_str(&body).map_err(|err| ProviderError::Other(err.to_string()))?;
    Ok(RefreshedTokens {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at: chrono_now() + parsed.expires_in.unwrap_or(3600),
    })
}

fn chrono_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
