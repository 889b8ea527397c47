use super::*;
use axum::http::HeaderMap;

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", value.parse().unwrap());
    headers
}

#[cfg(test)]
mod extract_bearer_token_tests {
    use super::*;

    #[test]
    fn valid_bearer_token() {
        let result = extract_bearer_token(&headers_with("Bearer admin-secret-1"));
        assert_eq!(result, Ok("admin-secret-1".to_string()));
    }

    #[test]
    fn valid_bearer_token_with_extra_whitespace() {
        let result = extract_bearer_token(&headers_with("Bearer   admin-secret-1  "));
        assert_eq!(result, Ok("admin-secret-1".to_string()));
    }

    #[test]
    fn case_insensitive_bearer() {
        let result = extract_bearer_token(&headers_with("bearer admin-secret-1"));
        assert_eq!(result, Ok("admin-secret-1".to_string()));
    }

    #[test]
    fn missing_authorization_header() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), Err(TokenError::Missing));
    }

    #[test]
    fn empty_authorization_header() {
        assert_eq!(extract_bearer_token(&headers_with("")), Err(TokenError::InvalidFormat));
    }

    #[test]
    fn missing_bearer_prefix() {
        assert_eq!(
            extract_bearer_token(&headers_with("admin-secret-1")),
            Err(TokenError::InvalidFormat)
        );
    }

    #[test]
    fn wrong_scheme() {
        assert_eq!(
            extract_bearer_token(&headers_with("Basic dXNlcjpwYXNz")),
            Err(TokenError::InvalidFormat)
        );
    }

    #[test]
    fn bearer_without_token() {
        assert_eq!(extract_bearer_token(&headers_with("Bearer   ")), Err(TokenError::Empty));
    }
}

#[cfg(test)]
mod authorize_admin_tests {
    use super::*;

    #[test]
    fn open_when_no_token_configured() {
        assert_eq!(authorize_admin(&HeaderMap::new(), None), Ok(()));
    }

    #[test]
    fn matching_token_allowed() {
        let headers = headers_with("Bearer admin-secret-1");
        assert_eq!(authorize_admin(&headers, Some("admin-secret-1")), Ok(()));
    }

    #[test]
    fn wrong_token_rejected() {
        let headers = headers_with("Bearer guess");
        assert_eq!(
            authorize_admin(&headers, Some("admin-secret-1")),
            Err(TokenError::Mismatch)
        );
    }

    #[test]
    fn prefix_or_longer_token_rejected() {
        for presented in ["Bearer admin-secret", "Bearer admin-secret-12", "Bearer Admin-secret-1"] {
            assert_eq!(
                authorize_admin(&headers_with(presented), Some("admin-secret-1")),
                Err(TokenError::Mismatch),
                "{}",
                presented
            );
        }
    }

    #[test]
    fn constant_time_eq_compares_bytes() {
        assert!(constant_time_eq(b"admin-secret-1", b"admin-secret-1"));
        assert!(!constant_time_eq(b"admin-secret-1", b"admin-secret-2"));
        assert!(!constant_time_eq(b"admin", b"admin-secret-1"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn missing_header_rejected() {
        assert_eq!(
            authorize_admin(&HeaderMap::new(), Some("admin-secret-1")),
            Err(TokenError::Missing)
        );
    }
}
