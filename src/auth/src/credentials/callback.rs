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

//! Credentials backed by a caller-supplied refresh callback.
//!
//! Some applications obtain access tokens through a channel this crate does
//! not model: a hardware token broker, a sidecar process, a proprietary
//! vault. These credentials delegate the fetch to an async callback while
//! keeping the full renewal machinery: the token is cached until it is
//! close to expiring, concurrent refreshes collapse into one callback
//! invocation, and a `401 Unauthorized` discards the cached token and
//! makes exactly one renewed attempt.
//!
//! The callback is invoked every time a new token is needed. Return
//! [Token::expires_at][crate::token::Token] to control how long each
//! result is served from the cache.

use crate::Result;
use crate::credentials::Credentials;
use crate::credentials::internal::RenewingCredentials;
use crate::token::{Token, TokenProvider};
use std::future::Future;
use std::sync::Arc;

/// A builder for callback-backed credentials.
///
/// # Example
/// ```
/// # use meridian_auth::credentials::callback::Builder;
/// # use meridian_auth::errors::CredentialsError;
/// # use meridian_auth::token::Token;
/// let credentials = Builder::new(|| async {
///     // Consult the token broker of your choosing.
///     Ok::<_, CredentialsError>(Token {
///         token: "an-access-token".to_string(),
///         token_type: "Bearer".to_string(),
///         expires_at: None,
///         metadata: None,
///     })
/// })
/// .build();
/// ```
pub struct Builder<F> {
    callback: F,
    initial_token: Option<Token>,
}

impl<F, Fut> Builder<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    /// Creates a new builder from an async token-fetching callback.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            initial_token: None,
        }
    }

    /// Seeds the credentials with a token the application already holds.
    /// The callback is not invoked until this token is close to expiring.
    pub fn with_initial_token(mut self, token: Token) -> Self {
        self.initial_token = Some(token);
        self
    }

    /// Returns a [Credentials] instance invoking the configured callback.
    pub fn build(self) -> Credentials {
        let token_provider = CallbackTokenProvider {
            callback: self.callback,
        };
        let inner = match self.initial_token {
            Some(token) => RenewingCredentials::with_initial_token(token_provider, token),
            None => RenewingCredentials::new(token_provider),
        };
        Credentials {
            inner: Arc::new(inner),
        }
    }
}

struct CallbackTokenProvider<F> {
    callback: F,
}

impl<F> std::fmt::Debug for CallbackTokenProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackTokenProvider")
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<F, Fut> TokenProvider for CallbackTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Token>> + Send,
{
    async fn token(&self) -> Result<Token> {
        (self.callback)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::HV;
    use crate::errors::CredentialsError;
    use http::header::AUTHORIZATION;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_token(value: String) -> Token {
        Token {
            token: value,
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        }
    }

    fn counting_credentials(calls: Arc<AtomicUsize>) -> Credentials {
        Builder::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(test_token(format!("token-{n}"))) }
        })
        .build()
    }

    #[tokio::test]
    async fn callback_result_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credentials = counting_credentials(calls.clone());

        let headers = HV::from(credentials.headers().await.unwrap());
        assert_eq!(
            headers,
            vec![HV {
                header: AUTHORIZATION.to_string(),
                value: "Bearer token-0".to_string(),
                is_sensitive: true,
            }]
        );

        // The token has no expiration, so the callback runs only once.
        let token = credentials.token().await.unwrap();
        assert_eq!(token.token, "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_installs_new_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credentials = counting_credentials(calls.clone());

        assert_eq!(credentials.token().await.unwrap().token, "token-0");

        // A 401 discards the cached token and invokes the callback once.
        assert!(credentials.handle_unauthorized().await);
        assert_eq!(credentials.token().await.unwrap().token, "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_failure_is_not_sticky() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let credentials = Builder::new(move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    1 => Err(CredentialsError::from_str(true, "broker unreachable")),
                    _ => Ok(test_token(format!("token-{n}"))),
                }
            }
        })
        .build();

        assert_eq!(credentials.token().await.unwrap().token, "token-0");

        // The first 401 fails to renew...
        assert!(!credentials.handle_unauthorized().await);
        // ... but a later one triggers a fresh callback invocation.
        assert!(credentials.handle_unauthorized().await);
        assert_eq!(credentials.token().await.unwrap().token, "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn initial_token_skips_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let credentials = Builder::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async move { Ok(test_token("fresh".to_string())) }
        })
        .with_initial_token(test_token("seed-token".to_string()))
        .build();

        assert_eq!(credentials.token().await.unwrap().token, "seed-token");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_omits_callback() {
        let provider = CallbackTokenProvider {
            callback: || async { Ok::<_, CredentialsError>(test_token("t".to_string())) },
        };
        let fmt = format!("{provider:?}");
        assert!(fmt.contains("CallbackTokenProvider"), "{fmt}");
    }
}
