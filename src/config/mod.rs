use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default location of the optional TOML config file.
pub const DEFAULT_CONFIG_PATH: &str = "config/aria.toml";

/// Complete Aria configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AriaConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Externally reachable base URL, used to build the OAuth redirect URI
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Bearer token guarding the tenant admin endpoints. Unset = open.
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_url: default_public_url(),
            admin_token: None,
        }
    }
}

/// Google OAuth and Calendar API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Defaults to `{public_url}/auth/callback`
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/calendar".to_string(),
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            api_base: default_api_base(),
            calendar_id: default_calendar_id(),
            scopes: default_scopes(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl GoogleConfig {
    pub fn redirect_uri(&self, public_url: &str) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/auth/callback", public_url.trim_end_matches('/')))
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_db")]
    pub credentials_db: String,
    #[serde(default = "default_bookings_db")]
    pub bookings_db: String,
    /// Base64-encoded 32-byte key sealing stored credentials. Required at startup.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_credentials_db() -> String {
    "credentials.db".to_string()
}

fn default_bookings_db() -> String {
    "bookings.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_db: default_credentials_db(),
            bookings_db: default_bookings_db(),
            encryption_key: None,
        }
    }
}

/// OAuth handshake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
    #[serde(default = "default_state_capacity")]
    pub state_capacity: usize,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_state_ttl() -> u64 {
    600
}

fn default_state_capacity() -> usize {
    10_000
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: default_state_ttl(),
            state_capacity: default_state_capacity(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Booking defaults
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Name the agent uses for itself in event descriptions
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    /// IANA timezone used when a tool call does not name one
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
}

fn default_agent_name() -> String {
    "Aria".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_duration() -> u32 {
    30
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            default_timezone: default_timezone(),
            default_duration_minutes: default_duration(),
        }
    }
}

impl AriaConfig {
    /// Load `.env`, the TOML file named by `ARIA_CONFIG` (or the default path,
    /// if present), then apply environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("ARIA_CONFIG").ok();
        let mut config = match path.as_deref() {
            Some(path) => load_config(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH)?,
            None => AriaConfig::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override fields from variables returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str, field: &mut String| {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *field = value;
            }
        };

        set("ARIA_BIND_ADDRESS", &mut self.server.bind_address);
        if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.bind_address = format!("0.0.0.0:{}", port);
        }
        set("ARIA_PUBLIC_URL", &mut self.server.public_url);
        set("GOOGLE_CLIENT_ID", &mut self.google.client_id);
        set("GOOGLE_CLIENT_SECRET", &mut self.google.client_secret);
        set("GOOGLE_CALENDAR_ID", &mut self.google.calendar_id);
        set("ARIA_CREDENTIALS_DB", &mut self.storage.credentials_db);
        set("ARIA_BOOKINGS_DB", &mut self.storage.bookings_db);
        set("ARIA_DEFAULT_TIMEZONE", &mut self.scheduling.default_timezone);
        set("ARIA_AGENT_NAME", &mut self.scheduling.agent_name);

        if let Some(uri) = lookup("GOOGLE_REDIRECT_URI").filter(|v| !v.is_empty()) {
            self.google.redirect_uri = Some(uri);
        }
        if let Some(key) = lookup("ARIA_ENCRYPTION_KEY").filter(|v| !v.is_empty()) {
            self.storage.encryption_key = Some(key);
        }
        if let Some(token) = lookup("ARIA_ADMIN_TOKEN").filter(|v| !v.is_empty()) {
            self.server.admin_token = Some(token);
        }
        if let Some(minutes) = lookup("ARIA_DEFAULT_DURATION_MINUTES").and_then(|v| v.parse().ok()) {
            self.scheduling.default_duration_minutes = minutes;
        }
        if let Some(seconds) = lookup("ARIA_STATE_TTL_SECONDS").and_then(|v| v.parse().ok()) {
            self.oauth.state_ttl_seconds = seconds;
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AriaConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))
}
