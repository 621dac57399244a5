//! Session-JWT derivation for WsClaude.
//!
//! "Refresh" for this provider isn't an OAuth grant: it's a GET against the
//! Clerk sessions endpoint using the long-lived client JWT stored in
//! `session_key`, picking the freshest session's token out of the response.

use serde::Deserialize;

use portcullis_core::{ProviderError, ProviderResult, UpstreamCtx};

use crate::providers::http_client::{SharedClientKind, client_for_ctx};

#[derive(Debug, Deserialize)]
struct ClerkSessionsResponse {
    response: Vec<ClerkSession>,
}

#[derive(Debug, Deserialize)]
struct ClerkSession {
    #[serde(default)]
    last_active_token: Option<ClerkToken>,
    #[serde(default)]
    expire_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClerkToken {
    jwt: String,
}

pub(super) struct RefreshedJwt {
    pub jwt: String,
    pub expires_at: i64,
}

pub(super) async fn refresh_session_jwt(
    ctx: &UpstreamCtx,
    sessions_url: &str,
    client_jwt: &str,
) -> ProviderResult<RefreshedJwt> {
    let client = client_for_ctx(ctx, SharedClientKind::WsClaude)?;
    let response = client
        .get(sessions_url)
        .header("Authorization", format!("Bearer {client_jwt}"))
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    if !status.is_success() {
        return Err(ProviderError::Other(format!(
            "clerk sessions fetch failed: {status} {body}"
        )));
    }

    let parsed: ClerkSessionsResponse =
        serde_json::from_str(&body).map_err(|err| ProviderError::Other(err.to_string()))?;
    let freshest = parsed
        .response
        .into_iter()
        .max_by_key(|session| session.expire_at.unwrap_or(0))
        .ok_or_else(|| ProviderError::Other("clerk sessions response had no sessions".to_string()))?;
    let token = freshest.last_active_token.ok_or_else(|| {
        ProviderError::Other("clerk session missing last_active_token".to_string())
    })?;
    let expires_at = freshest.expire_at.unwrap_or_else(|| now_secs() + 3600);
    Ok(RefreshedJwt {
        jwt: token.jwt,
        expires_at,
    })
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
