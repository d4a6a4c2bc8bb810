//! Basic HTTP authentication encoding.
//!
//! Credentials are encoded according to RFC 7617: the UTF-8 bytes of
//! `username:password` are base64-encoded verbatim. No escaping is applied
//! to colons inside the username or password.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encodes username and password into a Basic authentication header value.
///
/// # Arguments
///
/// * `username` - The username for authentication
/// * `password` - The password for authentication
///
/// # Returns
///
/// A `String` in the format "Basic <base64_encoded_credentials>".
///
/// # Examples
///
/// ```
/// use collection_runner::auth::basic::basic_auth;
///
/// let auth_header = basic_auth("user", "pass123");
/// assert_eq!(auth_header, "Basic dXNlcjpwYXNzMTIz");
/// ```
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = STANDARD.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}
