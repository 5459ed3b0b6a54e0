use crate::auth::Credential;
use crate::types::{REFRESH_PATH, RefreshError, Result};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedTokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    data: Option<RefreshedTokens>,
}

/// Exchanges a refresh token for a new credential pair over the backend REST API
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    refresh_url: Url,
    http: reqwest::Client,
}

impl HttpTokenRefresher {
    pub fn new(refresh_url: Url) -> Self {
        Self {
            refresh_url,
            http: reqwest::Client::new(),
        }
    }

    /// Refresher for the standard refresh route under `api_base`
    /// (e.g. `http://localhost:4000`).
    pub fn for_api_base(api_base: &str) -> Result<Self> {
        let base = Url::parse(&http_base(api_base))?;
        Ok(Self::new(base.join(REFRESH_PATH)?))
    }

    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    /// POSTs `{"refreshToken": ..}` and reads `{"data": {"accessToken", "refreshToken"}}`
    pub async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credential, RefreshError> {
        let body = serde_json::json!({ "refreshToken": refresh_token });

        let response = self
            .http
            .post(self.refresh_url.clone())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RefreshError::Rejected(format!(
                "refresh endpoint answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(RefreshError::Failed(format!(
                "refresh endpoint answered {}",
                status
            )));
        }

        let parsed: RefreshResponse = response.json().await?;
        let Some(tokens) = parsed.data else {
            return Err(RefreshError::Failed(
                "refresh response carried no token data".to_string(),
            ));
        };

        tracing::debug!("Token refresh succeeded");
        Ok(Credential::new(tokens.access_token, tokens.refresh_token))
    }
}

/// Converts a WebSocket endpoint to its HTTP counterpart, dropping the query
pub fn http_base(endpoint: &str) -> String {
    endpoint
        .replace("ws://", "http://")
        .replace("wss://", "https://")
        .split('?')
        .next()
        .unwrap_or(endpoint)
        .to_string()
}
