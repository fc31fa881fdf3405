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

//! User account credentials.
//!
//! User accounts represent a researcher, administrator, or any other person
//! who interacts with the Meridian services. This module provides
//! [Credentials] backed by an OAuth 2.0 refresh token: each time the access
//! token expires, the refresh token is exchanged for a new one
//! ([RFC 6749 Section 6]).
//!
//! This module is designed for refresh tokens obtained via the standard
//! [Authorization Code grant]. Acquiring the initial refresh token (e.g.,
//! through user consent) is outside the scope of this library.
//!
//! Example usage:
//!
//! ```no_run
//! # use meridian_auth::credentials::user_account::Builder;
//! # tokio_test::block_on(async {
//! let credentials = Builder::new(
//!     "YOUR_CLIENT_ID",
//!     "YOUR_CLIENT_SECRET", // LOAD SECURELY!
//!     "YOUR_REFRESH_TOKEN", // LOAD SECURELY!
//! )
//! .build();
//! let headers = credentials.headers().await?;
//! # Ok::<(), meridian_auth::errors::CredentialsError>(())
//! # });
//! ```
//!
//! [Authorization Code grant]: https://datatracker.ietf.org/doc/html/rfc6749#section-4.1
//! [RFC 6749 Section 6]: https://datatracker.ietf.org/doc/html/rfc6749#section-6

use crate::Result;
use crate::credentials::internal::{RenewingCredentials, exchange_token};
use crate::credentials::{Credentials, OAUTH2_ENDPOINT};
use crate::token::{Token, TokenProvider};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A builder for user account [Credentials].
///
/// # Example
/// ```
/// # use meridian_auth::credentials::user_account::Builder;
/// let credentials = Builder::new("client-id", "client-secret", "refresh-token")
///     .with_scopes(["urn:meridian:auth:scope:transfer.api.meridian.science:all"])
///     .build();
/// ```
pub struct Builder {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: Option<String>,
    scopes: Option<Vec<String>>,
    initial_token: Option<Token>,
}

impl Builder {
    /// Creates a new builder from the client pair and a refresh token.
    pub fn new<C, S, R>(client_id: C, client_secret: S, refresh_token: R) -> Self
    where
        C: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token_uri: None,
            scopes: None,
            initial_token: None,
        }
    }

    /// Sets the URI for the token endpoint used to fetch access tokens.
    ///
    /// Defaults to the production authorization service.
    pub fn with_token_uri<S: Into<String>>(mut self, token_uri: S) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Sets the scopes requested on each exchange.
    ///
    /// When absent, the authorization service grants whatever the refresh
    /// token was consented for.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Seeds the credentials with an access token the application already
    /// holds, typically issued alongside the refresh token. No exchange
    /// happens until this token is close to expiring.
    pub fn with_initial_token(mut self, token: Token) -> Self {
        self.initial_token = Some(token);
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    pub fn build(self) -> Credentials {
        let token_provider = UserTokenProvider {
            client: reqwest::Client::new(),
            client_id: self.client_id,
            client_secret: self.client_secret,
            refresh_token: Mutex::new(self.refresh_token),
            endpoint: self.token_uri.unwrap_or_else(|| OAUTH2_ENDPOINT.to_string()),
            scopes: self.scopes.map(|scopes| scopes.join(" ")),
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

struct UserTokenProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    // The service may rotate the refresh token on each exchange; later
    // exchanges must send the most recently issued one.
    refresh_token: Mutex<String>,
    endpoint: String,
    scopes: Option<String>,
}

impl std::fmt::Debug for UserTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("refresh_token", &"[censored]")
            .field("endpoint", &self.endpoint)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for UserTokenProvider {
    async fn token(&self) -> Result<Token> {
        let refresh_token = self.refresh_token.lock().await.clone();
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        if let Some(scopes) = &self.scopes {
            params.push(("scope", scopes.as_str()));
        }
        let response = exchange_token(
            &self.client,
            &self.endpoint,
            &self.client_id,
            &self.client_secret,
            &params,
        )
        .await?;
        if let Some(rotated) = &response.refresh_token {
            *self.refresh_token.lock().await = rotated.clone();
        }
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::internal::Oauth2TokenResponse;
    use crate::credentials::tests::HV;
    use axum::extract::Form;
    use http::StatusCode;
    use http::header::AUTHORIZATION;
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::task::JoinHandle;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn debug_token_provider() {
        let provider = UserTokenProvider {
            client: reqwest::Client::new(),
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            refresh_token: tokio::sync::Mutex::new("test-refresh-token".to_string()),
            endpoint: OAUTH2_ENDPOINT.to_string(),
            scopes: Some("profile".to_string()),
        };
        let fmt = format!("{provider:?}");
        assert!(fmt.contains("test-client-id"), "{fmt}");
        assert!(!fmt.contains("test-client-secret"), "{fmt}");
        assert!(!fmt.contains("test-refresh-token"), "{fmt}");
        assert!(fmt.contains(OAUTH2_ENDPOINT), "{fmt}");
        assert!(fmt.contains("profile"), "{fmt}");
    }

    #[derive(Debug, serde::Deserialize)]
    struct RefreshForm {
        grant_type: String,
        refresh_token: String,
        scope: Option<String>,
    }

    // Starts a server running locally. Returns an (endpoint, handler) pair.
    async fn start(
        response_code: StatusCode,
        response_body: serde_json::Value,
        call_count: Arc<Mutex<i32>>,
    ) -> (String, JoinHandle<()>) {
        let handler = move |headers: http::HeaderMap, Form(form): Form<RefreshForm>| async move {
            *call_count.lock().unwrap() += 1;

            // The client must authenticate with HTTP Basic.
            let auth = headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
            assert!(auth.starts_with("Basic "), "{auth}");

            assert_eq!(form.grant_type, "refresh_token");
            assert_eq!(form.refresh_token, "test-refresh-token");
            assert_eq!(form.scope.as_deref(), response_body["scope"].as_str());

            (response_code, response_body.to_string())
        };
        let app = axum::Router::new().route("/token", axum::routing::post(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async {
            axum::serve(listener, app).await.unwrap();
        });

        (
            format!("http://{}:{}/token", addr.ip(), addr.port()),
            server,
        )
    }

    fn success_response(scope: Option<&str>) -> serde_json::Value {
        serde_json::to_value(Oauth2TokenResponse {
            access_token: "test-access-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            scope: scope.map(str::to_string),
            resource_server: None,
            refresh_token: None,
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exchange_full() -> TestResult {
        let (endpoint, _server) = start(
            StatusCode::OK,
            success_response(Some("scope1 scope2")),
            Arc::new(Mutex::new(0)),
        )
        .await;

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .with_scopes(["scope1", "scope2"])
            .build();

        let now = Instant::now();
        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");
        assert_eq!(token.token_type, "Bearer");
        assert!(
            token
                .expires_at
                .is_some_and(|d| d >= now + Duration::from_secs(3600)),
            "now: {now:?}, expires_at: {:?}",
            token.expires_at
        );

        let headers = HV::from(credentials.headers().await?);
        assert_eq!(
            headers,
            vec![HV {
                header: AUTHORIZATION.to_string(),
                value: "Bearer test-access-token".to_string(),
                is_sensitive: true,
            }]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exchange_is_cached() -> TestResult {
        let call_count = Arc::new(Mutex::new(0));
        let (endpoint, _server) =
            start(StatusCode::OK, success_response(None), call_count.clone()).await;

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .build();

        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");
        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");

        // The inner provider was called only once even though the token was
        // requested twice.
        assert_eq!(*call_count.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn initial_token_skips_exchange() -> TestResult {
        let call_count = Arc::new(Mutex::new(0));
        let (endpoint, _server) =
            start(StatusCode::OK, success_response(None), call_count.clone()).await;

        let seed = Token {
            token: "seed-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        };
        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .with_initial_token(seed)
            .build();

        let token = credentials.token().await?;
        assert_eq!(token.token, "seed-token");
        assert_eq!(*call_count.lock().unwrap(), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unauthorized_renews_seeded_token() -> TestResult {
        let call_count = Arc::new(Mutex::new(0));
        let (endpoint, _server) =
            start(StatusCode::OK, success_response(None), call_count.clone()).await;

        let seed = Token {
            token: "seed-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        };
        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .with_initial_token(seed)
            .build();
        assert_eq!(credentials.token().await?.token, "seed-token");

        // The service rejected the seeded token. One exchange follows.
        assert!(credentials.handle_unauthorized().await);
        assert_eq!(credentials.token().await?.token, "test-access-token");
        assert_eq!(*call_count.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rotated_refresh_token_used_on_next_exchange() -> TestResult {
        // The server issues a new refresh token on every exchange and
        // records the one each request carried.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler = move |Form(form): Form<RefreshForm>| async move {
            seen_clone.lock().unwrap().push(form.refresh_token.clone());
            let mut body = success_response(None);
            body["refresh_token"] =
                serde_json::Value::String("rotated-refresh-token".to_string());
            body.to_string()
        };
        let app = axum::Router::new().route("/token", axum::routing::post(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async {
            axum::serve(listener, app).await.unwrap();
        });
        let endpoint = format!("http://{}:{}/token", addr.ip(), addr.port());

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .build();

        assert_eq!(credentials.token().await?.token, "test-access-token");
        // Force a second exchange; it must carry the rotated token.
        assert!(credentials.handle_unauthorized().await);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["test-refresh-token", "rotated-refresh-token"]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exchange_retryable_error() -> TestResult {
        let (endpoint, _server) = start(
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::Value::String("try again".to_string()),
            Arc::new(Mutex::new(0)),
        )
        .await;

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .build();
        let e = credentials.token().await.unwrap_err();
        assert!(e.is_retryable(), "{e}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exchange_nonretryable_error() -> TestResult {
        let (endpoint, _server) = start(
            StatusCode::BAD_REQUEST,
            serde_json::Value::String("invalid_grant".to_string()),
            Arc::new(Mutex::new(0)),
        )
        .await;

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .build();
        let e = credentials.token().await.unwrap_err();
        assert!(!e.is_retryable(), "{e}");

        // The rejected refresh token cannot recover from a 401 either.
        assert!(!credentials.handle_unauthorized().await);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exchange_malformed_response_is_nonretryable() -> TestResult {
        let (endpoint, _server) = start(
            StatusCode::OK,
            serde_json::Value::String("bad json".to_string()),
            Arc::new(Mutex::new(0)),
        )
        .await;

        let credentials = Builder::new("test-client-id", "test-client-secret", "test-refresh-token")
            .with_token_uri(endpoint)
            .build();
        let e = credentials.token().await.unwrap_err();
        assert!(!e.is_retryable(), "{e}");
        assert!(e.source().is_some(), "{e:?}");
        Ok(())
    }
}
