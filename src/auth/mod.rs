use axum::http::HeaderMap;

#[cfg(test)]
mod tests;

/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

/// Check the request against the configured admin token.
///
/// With no token configured every request is allowed.
pub fn authorize_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<(), TokenError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let token = extract_bearer_token(headers)?;
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        return Err(TokenError::Mismatch);
    }
    Ok(())
}

/// Compare secrets without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(TokenError::InvalidFormat);
    }

    if !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidFormat);
    }

    let token = parts[1].trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header not present
    Missing,
    /// Not "Bearer <token>"
    InvalidFormat,
    Empty,
    /// Well-formed token that is not the admin token
    Mismatch,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
            TokenError::Mismatch => write!(f, "Authorization token not accepted"),
        }
    }
}

impl std::error::Error for TokenError {}
