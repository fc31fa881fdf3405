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

//! Anonymous credentials.
//!
//! These credentials do not provide any authentication information. They are
//! useful for accessing public resources that do not require authentication,
//! and as a placeholder in tests.

use crate::Result;
use crate::credentials::Credentials;
use crate::credentials::dynamic::CredentialsProvider;
use crate::errors;
use crate::token::Token;
use http::HeaderMap;
use std::sync::Arc;

#[derive(Debug)]
struct AnonymousCredentials;

/// A builder for creating anonymous credentials.
///
/// # Example
/// ```
/// # use meridian_auth::credentials::anonymous::Builder;
/// let credentials = Builder::new().build();
/// ```
#[derive(Debug, Default)]
pub struct Builder {}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a [Credentials] instance.
    pub fn build(self) -> Credentials {
        Credentials {
            inner: Arc::new(AnonymousCredentials),
        }
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for AnonymousCredentials {
    async fn token(&self) -> Result<Token> {
        Err(errors::non_retryable_from_str(
            "anonymous credentials do not hold a token",
        ))
    }

    async fn headers(&self) -> Result<HeaderMap> {
        Ok(HeaderMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn headers_are_empty() {
        let credentials = Builder::new().build();
        let headers = credentials.headers().await.unwrap();
        assert!(headers.is_empty(), "{headers:?}");
    }

    #[tokio::test]
    async fn no_token() {
        let credentials = Builder::new().build();
        let e = credentials.token().await.unwrap_err();
        assert!(!e.is_retryable(), "{e}");
    }

    #[tokio::test]
    async fn unauthorized_is_final() {
        let credentials = Builder::new().build();
        assert!(!credentials.handle_unauthorized().await);
    }
}
