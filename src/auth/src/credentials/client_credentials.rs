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

//! Client credentials, for service-to-service applications.
//!
//! Applications that act on their own behalf, rather than on behalf of a
//! user, authenticate with the OAuth 2.0 client-credentials grant
//! ([RFC 6749 Section 4.4]): the client id and secret are exchanged for a
//! short-lived access token, and exchanged again whenever that token
//! expires. No refresh token is involved, the secret itself is the renewal
//! capability.
//!
//! [RFC 6749 Section 4.4]: https://datatracker.ietf.org/doc/html/rfc6749#section-4.4

use crate::Result;
use crate::credentials::internal::{RenewingCredentials, exchange_token};
use crate::credentials::{Credentials, OAUTH2_ENDPOINT};
use crate::token::{Token, TokenProvider};
use std::sync::Arc;

/// A builder for client credentials.
///
/// # Example
/// ```
/// # use meridian_auth::credentials::client_credentials::Builder;
/// let credentials = Builder::new("client-id", "client-secret")
///     .with_scopes(["urn:meridian:auth:scope:search.api.meridian.science:all"])
///     .build();
/// ```
pub struct Builder {
    client_id: String,
    client_secret: String,
    token_uri: Option<String>,
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Creates a new builder from a client id and secret.
    pub fn new<I, S>(client_id: I, client_secret: S) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_uri: None,
            scopes: None,
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
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    pub fn build(self) -> Credentials {
        let token_provider = ClientTokenProvider {
            client: reqwest::Client::new(),
            client_id: self.client_id,
            client_secret: self.client_secret,
            endpoint: self.token_uri.unwrap_or_else(|| OAUTH2_ENDPOINT.to_string()),
            scopes: self.scopes.map(|scopes| scopes.join(" ")),
        };
        Credentials {
            inner: Arc::new(RenewingCredentials::new(token_provider)),
        }
    }
}

struct ClientTokenProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    endpoint: String,
    scopes: Option<String>,
}

impl std::fmt::Debug for ClientTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("endpoint", &self.endpoint)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for ClientTokenProvider {
    async fn token(&self) -> Result<Token> {
        let mut params = vec![("grant_type", "client_credentials")];
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
        Ok(response.into())
    }
}
