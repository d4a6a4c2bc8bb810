//! Bearer token authentication formatting (RFC 6750).

/// Formats a token into a Bearer authentication header value.
///
/// # Examples
///
/// ```
/// use collection_runner::auth::bearer::bearer_token;
///
/// assert_eq!(bearer_token("abc123"), "Bearer abc123");
/// ```
pub fn bearer_token(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_format() {
        assert_eq!(bearer_token("mytoken"), "Bearer mytoken");
    }

    #[test]
    fn test_bearer_token_jwt() {
        let jwt = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxMjM0In0.sig";
        assert_eq!(bearer_token(jwt), format!("Bearer {}", jwt));
    }
}
