//! Authentication configuration and resolution.
//!
//! A declarative [`AuthConfig`] attached to a request, folder, or collection
//! is resolved into concrete header and query-parameter values. Templated
//! fields (tokens, usernames, key names) pass through variable substitution
//! before being combined, so auth credentials can reference `{{variables}}`
//! like any other request text.
//!
//! Resolution never fails: absent, inherit-only, and unsupported
//! configurations all degrade to the empty result.

pub mod basic;
pub mod bearer;

use crate::variables::substitute;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an API-key credential is placed on the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyTarget {
    /// Sent as a request header (the default).
    Header,
    /// Sent as a URL query parameter.
    Query,
}

impl Default for ApiKeyTarget {
    fn default() -> Self {
        ApiKeyTarget::Header
    }
}

/// Declarative authentication scheme configuration.
///
/// One variant per supported scheme; the variant data carries the templated
/// credential fields. `Inherit` defers to the enclosing folder chain and
/// collection, and `Unsupported` captures unknown scheme tags from stored
/// configurations, degrading to no authentication at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthConfig {
    /// Explicitly no authentication.
    NoAuth,
    /// Defer to the nearest ancestor that declares authentication.
    Inherit,
    /// Bearer token authentication (RFC 6750).
    Bearer {
        /// Token value, possibly templated.
        token: String,
    },
    /// HTTP Basic authentication (RFC 7617).
    Basic {
        /// Username, possibly templated.
        username: String,
        /// Password, possibly templated.
        password: String,
    },
    /// API key sent as a header or query parameter.
    ApiKey {
        /// Credential name (header name or query parameter name).
        key: String,
        /// Credential value, possibly templated.
        value: String,
        /// Placement of the credential.
        #[serde(default)]
        target: ApiKeyTarget,
    },
    /// OAuth 2.0 with a previously obtained access token.
    OAuth2 {
        /// Access token, possibly templated.
        access_token: String,
    },
    /// JWT bearer authentication.
    JwtBearer {
        /// Signed token, possibly templated.
        token: String,
    },
    /// Unknown scheme tag; resolves to no authentication.
    #[serde(other)]
    Unsupported,
}

impl AuthConfig {
    /// Whether this configuration defers to an ancestor scope.
    pub fn is_inherit(&self) -> bool {
        matches!(self, AuthConfig::Inherit)
    }

    /// Resolves this configuration into concrete header/query values.
    ///
    /// Every templated field is substituted against the merged variable map
    /// first. Unknown and non-credential variants yield
    /// [`ResolvedAuth::empty`].
    pub fn resolve(&self, variables: &HashMap<String, String>) -> ResolvedAuth {
        match self {
            AuthConfig::NoAuth | AuthConfig::Inherit | AuthConfig::Unsupported => {
                ResolvedAuth::empty()
            }
            AuthConfig::Bearer { token }
            | AuthConfig::JwtBearer { token } => {
                let token = substitute(token, variables);
                ResolvedAuth::with_header("Authorization", bearer::bearer_token(&token))
            }
            AuthConfig::OAuth2 { access_token } => {
                let token = substitute(access_token, variables);
                ResolvedAuth::with_header("Authorization", bearer::bearer_token(&token))
            }
            AuthConfig::Basic { username, password } => {
                let username = substitute(username, variables);
                let password = substitute(password, variables);
                ResolvedAuth::with_header("Authorization", basic::basic_auth(&username, &password))
            }
            AuthConfig::ApiKey { key, value, target } => {
                let key = substitute(key, variables);
                let value = substitute(value, variables);
                match target {
                    ApiKeyTarget::Query => ResolvedAuth::with_query_param(key, value),
                    ApiKeyTarget::Header => ResolvedAuth::with_header(key, value),
                }
            }
        }
    }
}

/// Concrete authentication values ready to merge into a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAuth {
    /// Headers contributed by the auth scheme.
    pub headers: HashMap<String, String>,

    /// Query parameters contributed by the auth scheme.
    pub query_params: HashMap<String, String>,
}

impl ResolvedAuth {
    /// The no-auth result: no headers, no query parameters.
    pub fn empty() -> Self {
        Self {
            headers: HashMap::new(),
            query_params: HashMap::new(),
        }
    }

    /// A result carrying one header.
    pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut resolved = Self::empty();
        resolved.headers.insert(name.into(), value.into());
        resolved
    }

    /// A result carrying one query parameter.
    pub fn with_query_param(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut resolved = Self::empty();
        resolved.query_params.insert(name.into(), value.into());
        resolved
    }

    /// Whether the result contributes nothing to the request.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query_params.is_empty()
    }
}

/// Resolves an optional auth configuration against the merged variable map.
///
/// `None` behaves like [`AuthConfig::NoAuth`].
pub fn resolve_auth(
    config: Option<&AuthConfig>,
    variables: &HashMap<String, String>,
) -> ResolvedAuth {
    match config {
        Some(config) => config.resolve(variables),
        None => ResolvedAuth::empty(),
    }
}
