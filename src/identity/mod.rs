//! Tenant identity: a validated email address.
//!
//! Every tenant lookup goes through [`TenantIdentity::parse`] first, so a
//! malformed identifier never reaches the credential store.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;


/// Longest address accepted (RFC 5321 path limit).
const MAX_EMAIL_LEN: usize = 254;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

/// A tenant's email address, trimmed and lower-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantIdentity(String);

impl TenantIdentity {
    /// Validate and normalize a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(IdentityError::Empty);
        }
        if candidate.len() > MAX_EMAIL_LEN {
            return Err(IdentityError::TooLong);
        }

        let normalized = candidate.to_ascii_lowercase();
        if !email_pattern().is_match(&normalized) || normalized.contains("..") {
            return Err(IdentityError::Malformed);
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe form: first character of the local part plus the domain.
    pub fn redacted(&self) -> String {
        redact_email(&self.0)
    }
}

impl fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Redact an email-like string for logs (`b***@example.com`).
///
/// Works on unvalidated input too, so rejected identifiers can be logged.
pub fn redact_email(raw: &str) -> String {
    match raw.trim().split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

/// Identity validation errors
#[derive(Debug, PartialEq, Clone)]
pub enum IdentityError {
    /// Empty or whitespace-only input
    Empty,
    /// Longer than an email address can be
    TooLong,
    /// Does not look like an email address
    Malformed,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::Empty => write!(f, "Tenant identity is empty"),
            IdentityError::TooLong => write!(f, "Tenant identity is too long"),
            IdentityError::Malformed => write!(f, "Tenant identity is not a valid email address"),
        }
    }
}

impl std::error::Error for IdentityError {}
