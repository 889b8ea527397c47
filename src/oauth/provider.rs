//! OAuth provider configuration.
//!
//! Endpoints, scopes and client credentials for the calendar provider's
//! authorization-code flow.

use crate::config::{AriaConfig, GoogleConfig};
use serde::{Deserialize, Serialize};

/// OAuth provider configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Endpoint returning the authenticated user's email and name
    pub userinfo_url: String,

    /// Required OAuth scopes
    pub scopes: Vec<String>,

    pub client_id: String,

    pub client_secret: String,

    /// Callback URL registered with the provider
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    pub fn from_google(google: &GoogleConfig, public_url: &str) -> Self {
        Self {
            auth_url: google.auth_url.clone(),
            token_url: google.token_url.clone(),
            userinfo_url: google.userinfo_url.clone(),
            scopes: google.scopes.clone(),
            client_id: google.client_id.clone(),
            client_secret: google.client_secret.clone(),
            redirect_uri: google.redirect_uri(public_url),
        }
    }

    pub fn from_config(config: &AriaConfig) -> Self {
        Self::from_google(&config.google, &config.server.public_url)
    }

    /// True once a client id and secret are configured.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Build the authorization URL for `state`.
    ///
    /// Requests offline access with a forced consent prompt so the provider
    /// always returns a refresh token.
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&include_granted_scopes=true&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }
}
