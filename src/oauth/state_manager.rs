//! OAuth state management for CSRF protection.
//!
//! Issues one-time, expiring state tokens that bind an authorization request
//! to its callback. Expiry is measured on the monotonic clock.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Random bytes per state token (256 bits)
const TOKEN_BYTES: usize = 32;

/// Default number of outstanding states kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// OAuth state store with TTL expiry.
///
/// Every access to the token map happens under one mutex, and no I/O is done
/// while it is held.
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
    capacity: usize,
}

impl StateManager {
    /// Create a state manager whose tokens live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a new state token and register it.
    ///
    /// Expired entries are swept here to bound memory; validation does not
    /// depend on this sweep.
    pub fn issue(&self) -> String {
        let now = Instant::now();
        let mut states = self.states.lock();

        states.retain(|_, expiry| *expiry >= now);
        if states.len() >= self.capacity {
            let oldest = states
                .iter()
                .min_by_key(|(_, expiry)| **expiry)
                .map(|(token, _)| token.clone());
            if let Some(oldest) = oldest {
                states.remove(&oldest);
            }
        }

        let token = loop {
            let candidate = generate_token();
            if !states.contains_key(&candidate) {
                break candidate;
            }
        };
        states.insert(token.clone(), now + self.ttl);

        token
    }

    /// Validate and consume a state token.
    ///
    /// A known token is always removed, so it can never be presented twice,
    /// even when this call reports it expired.
    pub fn validate_and_consume(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let mut states = self.states.lock();
        match states.remove(token) {
            Some(expiry) => Instant::now() <= expiry,
            None => false,
        }
    }

    /// Remove every expired state.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.states.lock().retain(|_, expiry| *expiry >= now);
    }

    /// Number of outstanding states, expired ones included until swept.
    pub fn count(&self) -> usize {
        self.states.lock().len()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Background task that periodically sweeps expired states.
pub async fn run_state_cleanup(manager: StateManager, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        manager.cleanup_expired();
        tracing::debug!(remaining = manager.count(), "OAuth state cleanup complete");
    }
}
