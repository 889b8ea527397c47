use anyhow::{Context, Result};
use aria::api::{create_app, AppComponents};
use aria::bookings::BookingLog;
use aria::calendar::GoogleCalendar;
use aria::config::AriaConfig;
use aria::credentials::SqliteCredentialStore;
use aria::default_client::DefaultCredentialHolder;
use aria::oauth::{run_state_cleanup, HttpOAuthClient, OAuthProviderConfig, StateManager};
use aria::resolver::ClientResolver;
use aria::tenant::TenantCredentials;
use aria::tools::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aria=info,tower_http=info".into()),
        )
        .init();

    info!("Aria starting...");

    let config = AriaConfig::load().context("Failed to load configuration")?;
    let encryption_key = config
        .storage
        .encryption_key
        .as_deref()
        .context("ARIA_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    info!(
        bind_address = %config.server.bind_address,
        public_url = %config.server.public_url,
        credentials_db = %config.storage.credentials_db,
        bookings_db = %config.storage.bookings_db,
        timezone = %config.scheduling.default_timezone,
        "Configuration loaded"
    );

    let credential_store = Arc::new(
        SqliteCredentialStore::new(&config.storage.credentials_db, encryption_key)
            .context("Failed to initialize credential store")?,
    );
    let bookings = Arc::new(
        BookingLog::new(&config.storage.bookings_db).context("Failed to initialize booking log")?,
    );

    let timeout = Duration::from_secs(config.google.request_timeout_seconds);
    let provider = OAuthProviderConfig::from_config(&config);
    if !provider.is_configured() {
        warn!("Google OAuth client is not configured; /auth/login is disabled");
    }
    let oauth = Arc::new(HttpOAuthClient::new(provider.clone(), timeout)?);
    let calendar = Arc::new(GoogleCalendar::new(
        &config.google.api_base,
        &config.google.calendar_id,
        timeout,
    )?);

    let tenants = Arc::new(TenantCredentials::new(
        credential_store,
        oauth.clone(),
        calendar.clone(),
    ));
    let default_token = std::env::var("GOOGLE_TOKEN_JSON").ok();
    let default_holder = Arc::new(DefaultCredentialHolder::from_env_json(
        default_token.as_deref(),
        oauth,
        calendar,
    ));

    let scheduler = Scheduler::new(
        ClientResolver::new(tenants, default_holder),
        Arc::clone(&bookings),
        config.scheduling.clone(),
    );

    let state_manager = StateManager::with_capacity(
        Duration::from_secs(config.oauth.state_ttl_seconds),
        config.oauth.state_capacity,
    );
    let cleanup_handle = tokio::spawn(run_state_cleanup(
        state_manager.clone(),
        Duration::from_secs(config.oauth.cleanup_interval_seconds.max(1)),
    ));

    let router = create_app(AppComponents {
        scheduler,
        bookings,
        state_manager,
        provider,
        admin_token: config.server.admin_token.clone(),
        secure_cookies: config.server.public_url.starts_with("https://"),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!(address = %config.server.bind_address, "Aria listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    cleanup_handle.abort();
    info!("Aria stopped");

    Ok(())
}
