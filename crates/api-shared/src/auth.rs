/// Header carrying the bearer token issued by `/connect`.
pub const TOKEN_HEADER: &str = "X-Token";

const BASIC_SCHEME: &str = "Basic";

/// Extracts the base64 credentials from an `Authorization: Basic <credentials>` value.
///
/// The scheme is matched case-insensitively. Returns `None` for any other scheme or an empty
/// credential part; decoding is left to the session manager.
pub fn basic_credentials(authorization: &str) -> Option<&str> {
    let (scheme, credentials) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
        return None;
    }

    let credentials = credentials.trim();
    (!credentials.is_empty()).then_some(credentials)
}

/// Returns the token from an `X-Token` header value, ignoring surrounding whitespace.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_accepts_basic_scheme_only() {
        assert_eq!(basic_credentials("Basic YTpi"), Some("YTpi"));
        assert_eq!(basic_credentials("basic   YTpi "), Some("YTpi"));
        assert_eq!(basic_credentials("Bearer YTpi"), None);
        assert_eq!(basic_credentials("Basic "), None);
        assert_eq!(basic_credentials("YTpi"), None);
    }

    #[test]
    fn bearer_token_ignores_blank_values() {
        assert_eq!(bearer_token(Some(" abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("   ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
