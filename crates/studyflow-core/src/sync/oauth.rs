//! OAuth 2.0 authorization-code flow against the calendar provider.
//!
//! State carried through the redirect is a URL-safe base64 JSON blob
//! holding the user id and issue timestamp, so the callback can recover
//! which user initiated the flow without server-side session state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OAuthSettings;
use crate::error::{AuthorizationError, Result, ValidationError};
use crate::sync::types::OAuthTokens;

/// Payload round-tripped through the OAuth `state` parameter.
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthState {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh: Option<String>) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            // Refresh tokens are only issued on first consent; keep the
            // stored one when the response omits it.
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
        }
    }
}

/// Client for the provider's OAuth token endpoints.
pub struct OAuthClient {
    settings: OAuthSettings,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    /// Build the consent URL for a user.
    ///
    /// Requests offline access with forced consent so a refresh token
    /// is issued even on re-authorization.
    pub fn authorization_url(&self, user_id: &str) -> Result<String> {
        let state = OAuthState {
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
        };
        let encoded_state = URL_SAFE_NO_PAD.encode(serde_json::to_string(&state)?);
        let scopes = self.settings.scopes.join(" ");

        let mut url = url::Url::parse(&self.settings.auth_url).map_err(|e| {
            crate::error::ConfigError::InvalidValue {
                key: "oauth.auth_url".to_string(),
                message: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &scopes)
            .append_pair("state", &encoded_state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.into())
    }

    /// Recover the state payload from the callback.
    pub fn decode_state(&self, state: &str) -> Result<OAuthState> {
        let bytes = URL_SAFE_NO_PAD.decode(state).map_err(|_| {
            ValidationError::InvalidValue {
                field: "state".to_string(),
                message: "not valid base64".to_string(),
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|_| {
            ValidationError::InvalidValue {
                field: "state".to_string(),
                message: "unrecognized state payload".to_string(),
            }
            .into()
        })
    }

    /// Exchange an authorization code for tokens.
    pub fn exchange_code(&self, code: &str) -> Result<OAuthTokens> {
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let handle = tokio::runtime::Handle::current();
        handle.block_on(async {
            let response = self
                .http
                .post(&self.settings.token_url)
                .form(&params)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(AuthorizationError::TokenExchangeFailed(format!(
                    "status {status}: {body}"
                ))
                .into());
            }
            let parsed: TokenResponse = response.json().await?;
            Ok(parsed.into_tokens(None))
        })
    }

    /// Refresh an expired token set.
    ///
    /// # Errors
    /// Returns a refresh failure (re-authorization required) when no
    /// refresh token is held or when the provider rejects it.
    pub fn refresh(&self, tokens: &OAuthTokens) -> Result<OAuthTokens> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            AuthorizationError::TokenRefreshFailed("no refresh token held".to_string())
        })?;

        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let handle = tokio::runtime::Handle::current();
        handle.block_on(async {
            let response = self
                .http
                .post(&self.settings.token_url)
                .form(&params)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(AuthorizationError::TokenRefreshFailed(format!(
                    "status {status}: {body}"
                ))
                .into());
            }
            let parsed: TokenResponse = response.json().await?;
            Ok(parsed.into_tokens(tokens.refresh_token.clone()))
        })
    }

    /// Override the token endpoint. Tests point this at a mock server.
    #[cfg(test)]
    pub fn with_token_url(mut self, url: &str) -> Self {
        self.settings.token_url = url.to_string();
        self
    }
}
