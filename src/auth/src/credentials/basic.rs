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

//! HTTP Basic credentials.
//!
//! These credentials authenticate with a client id and client secret using
//! the `Basic` scheme ([RFC 7617]). The authorization service accepts them
//! on endpoints that operate on the client itself, such as token
//! introspection and dependent-token grants.
//!
//! [RFC 7617]: https://datatracker.ietf.org/doc/html/rfc7617

use crate::Result;
use crate::credentials::Credentials;
use crate::credentials::dynamic::CredentialsProvider;
use crate::errors;
use crate::headers_util::build_basic_headers;
use crate::token::Token;
use http::HeaderMap;
use std::sync::Arc;

/// A builder for HTTP Basic credentials.
///
/// # Example
/// ```
/// # use meridian_auth::credentials::basic::Builder;
/// let credentials = Builder::new("a-client-id", "a-client-secret").build();
/// ```
pub struct Builder {
    client_id: String,
    client_secret: String,
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
        }
    }

    /// Returns a [Credentials] instance with the configured pair.
    pub fn build(self) -> Credentials {
        Credentials {
            inner: Arc::new(BasicCredentials {
                client_id: self.client_id,
                client_secret: self.client_secret,
            }),
        }
    }
}

struct BasicCredentials {
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .finish()
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for BasicCredentials {
    async fn token(&self) -> Result<Token> {
        Err(errors::non_retryable_from_str(
            "basic credentials do not hold a token",
        ))
    }

    async fn headers(&self) -> Result<HeaderMap> {
        build_basic_headers(&self.client_id, &self.client_secret)
    }
}
