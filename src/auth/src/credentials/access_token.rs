// Copyright 2025 Meridian Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Credentials holding a fixed access token.
//!
//! Use these credentials when the application obtained an access token out
//! of band, for example from a CLI login flow or a secrets manager. The
//! token is attached to every request as-is. These credentials cannot renew
//! the token: when it expires or is revoked, requests fail until the
//! application installs new credentials.

use crate::Result;
use crate::credentials::Credentials;
use crate::credentials::dynamic::CredentialsProvider;
use crate::headers_util::build_bearer_headers;
use crate::token::Token;
use http::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

/// A builder for credentials holding a fixed access token.
///
/// # Example
/// ```
/// # use meridian_auth::credentials::access_token::Builder;
/// let credentials = Builder::new("an-access-token").build();
/// ```
pub struct Builder {
    token: String,
    expires_at: Option<Instant>,
}

impl Builder {
    /// Creates a new builder holding `token`.
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Records the instant at which the token expires.
    ///
    /// The expiration is informational: these credentials keep serving the
    /// token past its expiration, since there is no way to renew it.
    pub fn with_expires_at(mut self, expires_at: Instant) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns a [Credentials] instance with the configured token.
    pub fn build(self) -> Credentials {
        Credentials {
            inner: Arc::new(AccessTokenCredentials {
                token: Token {
                    token: self.token,
                    token_type: "Bearer".to_string(),
                    expires_at: self.expires_at,
                    metadata: None,
                },
            }),
        }
    }
}

struct AccessTokenCredentials {
    token: Token,
}

impl std::fmt::Debug for AccessTokenCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCredentials")
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for AccessTokenCredentials {
    async fn token(&self) -> Result<Token> {
        Ok(self.token.clone())
    }

    async fn headers(&self) -> Result<HeaderMap> {
        build_bearer_headers(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::HV;
    use http::header::AUTHORIZATION;

    #[tokio::test]
    async fn fixed_token_headers() {
        let credentials = Builder::new("test-token").build();

        let headers = HV::from(credentials.headers().await.unwrap());
        assert_eq!(
            headers,
            vec![HV {
                header: AUTHORIZATION.to_string(),
                value: "Bearer test-token".to_string(),
                is_sensitive: true,
            }]
        );

        let token = credentials.token().await.unwrap();
        assert_eq!(token.token, "test-token");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, None);
    }

    #[tokio::test]
    async fn expiration_is_informational() {
        let expires_at = Instant::now();
        let credentials = Builder::new("test-token")
            .with_expires_at(expires_at)
            .build();

        // The token is served even though it is expired.
        let token = credentials.token().await.unwrap();
        assert_eq!(token.expires_at, Some(expires_at));
        assert!(credentials.headers().await.is_ok());
    }

    #[tokio::test]
    async fn unauthorized_is_final() {
        let credentials = Builder::new("test-token").build();
        assert!(!credentials.handle_unauthorized().await);
    }

    #[test]
    fn debug_censors_token() {
        let credentials = Builder::new("super-secret").build();
        let got = format!("{credentials:?}");
        assert!(!got.contains("super-secret"), "{got}");
    }
}
