//! OAuth 2.0 authorization-code flow for connecting tenant calendars.
//!
//! 1. `GET /auth/login` issues a CSRF state token and redirects to the provider
//! 2. The user authorizes on the provider's site
//! 3. The provider redirects to `/auth/callback?code&state`
//! 4. The state is validated and consumed, the code exchanged for a credential
//! 5. The credential is stored under the authenticated email

mod exchange;
mod provider;
mod state_manager;

pub use exchange::{HttpOAuthClient, OAuthClient, ProviderIdentity};
pub use provider::OAuthProviderConfig;
pub use state_manager::{run_state_cleanup, StateManager, DEFAULT_CAPACITY};
