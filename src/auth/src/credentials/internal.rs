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

//! Shared plumbing for the renewing credential types.
//!
//! Both the refresh-token and the client-credentials grants speak the same
//! wire protocol: a form-encoded POST to the token endpoint, authenticated
//! with the client id and secret, answered with a JSON token document. The
//! grants differ only in the form parameters they send.

use crate::Result;
use crate::credentials::dynamic::CredentialsProvider;
use crate::errors::{self, CredentialsError, is_retryable};
use crate::headers_util::build_bearer_headers;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use http::HeaderMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The token document returned by the authorization service.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Oauth2TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl From<Oauth2TokenResponse> for Token {
    fn from(response: Oauth2TokenResponse) -> Self {
        let mut metadata = HashMap::new();
        if let Some(scope) = response.scope {
            metadata.insert("scope".to_string(), scope);
        }
        if let Some(resource_server) = response.resource_server {
            metadata.insert("resource_server".to_string(), resource_server);
        }
        Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(metadata)
            },
        }
    }
}

/// Performs one exchange against the token endpoint.
///
/// The client authenticates with HTTP Basic, as the authorization service
/// requires for confidential clients. Transport failures are retryable;
/// response status classification follows [is_retryable]; a body that fails
/// to decode is non-retryable, the endpoint is misbehaving.
///
/// Returns the full response document: besides the access token, the
/// refresh-token grant needs to see a rotated `refresh_token` when the
/// service issues one.
pub(crate) async fn exchange_token(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    client_secret: &str,
    params: &[(&str, &str)],
) -> Result<Oauth2TokenResponse> {
    let resp = client
        .post(endpoint)
        .basic_auth(client_id, Some(client_secret))
        .form(params)
        .send()
        .await
        .map_err(errors::retryable)?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CredentialsError::new(is_retryable(status), e))?;
        return Err(CredentialsError::from_str(
            is_retryable(status),
            format!("failed to fetch token: {body}"),
        ));
    }
    resp.json::<Oauth2TokenResponse>().await.map_err(|e| {
        let retryable = !e.is_decode();
        CredentialsError::new(retryable, e)
    })
}

/// The credentials wrapper shared by the renewing credential types.
///
/// Serves tokens from a [TokenCache] and implements the 401-recovery
/// contract: drop the rejected token and make exactly one refresh attempt.
#[derive(Debug)]
pub(crate) struct RenewingCredentials<T>
where
    T: TokenProvider + 'static,
{
    token_provider: TokenCache<T>,
}

impl<T> RenewingCredentials<T>
where
    T: TokenProvider + 'static,
{
    pub(crate) fn new(inner: T) -> Self {
        Self {
            token_provider: TokenCache::new(inner),
        }
    }

    /// Seeds the cache with a token obtained out of band. No exchange
    /// happens until the seed token is close to expiring.
    pub(crate) fn with_initial_token(inner: T, initial: Token) -> Self {
        Self {
            token_provider: TokenCache::with_initial(inner, Ok(initial)),
        }
    }
}

#[async_trait::async_trait]
impl<T> CredentialsProvider for RenewingCredentials<T>
where
    T: TokenProvider + 'static,
{
    async fn token(&self) -> Result<Token> {
        self.token_provider.token().await
    }

    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token().await?;
        build_bearer_headers(&token)
    }

    async fn handle_unauthorized(&self) -> bool {
        // The service rejected a token we considered valid. Drop it, then
        // let the cache perform a single refresh.
        self.token_provider.invalidate().await;
        match self.token_provider.token().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("refresh after 401 failed: {e}");
                false
            }
        }
    }
}
