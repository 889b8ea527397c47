//! OAuth token exchange, refresh, and identity lookup.

use super::provider::OAuthProviderConfig;
use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// The provider's token and identity endpoints.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Exchange an authorization code for a credential.
    async fn exchange_code(&self, code: &str) -> Result<Credentials>;

    /// Obtain a fresh access token. The returned credential keeps the old
    /// refresh token when the provider does not rotate it.
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials>;

    /// Look up who an access token belongs to.
    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity>;
}

/// Identity endpoint response
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ProviderIdentity {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}

/// [`OAuthClient`] over the provider's HTTP endpoints.
pub struct HttpOAuthClient {
    config: OAuthProviderConfig,
    http: reqwest::Client,
}

impl HttpOAuthClient {
    pub fn new(config: OAuthProviderConfig, timeout: StdDuration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("aria-scheduler/0.1")
            .build()
            .context("Failed to build OAuth HTTP client")?;
        Ok(Self { config, http })
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Token endpoint returned status {}: {}",
                status,
                body
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .context("Failed to parse token response")
    }
}

#[async_trait]
impl OAuthClient for HttpOAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<Credentials> {
        tracing::debug!(token_url = %self.config.token_url, "Exchanging authorization code");

        let token = self
            .post_token_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .await?;

        tracing::debug!(
            has_refresh_token = token.refresh_token.is_some(),
            expires_in = ?token.expires_in,
            "Token exchange successful"
        );
        Ok(token.into_credentials())
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .context("Credential has no refresh token")?;

        let token = self
            .post_token_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .await?;

        let mut refreshed = credentials.clone();
        refreshed.merge_refreshed(token.into_credentials());
        Ok(refreshed)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send identity request")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Identity endpoint returned status {}",
                response.status()
            ));
        }

        response
            .json::<ProviderIdentity>()
            .await
            .context("Failed to parse identity response")
    }
}
