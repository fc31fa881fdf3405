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

//! Types and functions to work with authorization credentials.
//!
//! The Meridian SDK clients hold a [Credentials] instance and use it to
//! authorize every request. Two families of credentials exist:
//!
//! - **Static** credentials hold a fixed authorization value: an access
//!   token obtained out of band ([access_token]), a client id/secret pair
//!   ([basic]), or nothing at all ([anonymous]). They cannot recover from an
//!   authorization failure.
//! - **Renewing** credentials can obtain new access tokens without user
//!   interaction: through an OAuth2 refresh token ([user_account]), through
//!   the client-credentials grant ([client_credentials]), or through an
//!   async callback the application supplies ([callback]).
//!
//! The contract between a transport and its [Credentials] is:
//!
//! 1. Before sending a request, call [headers][Credentials::headers] and
//!    attach the returned headers.
//! 2. On a `401 Unauthorized` response, call
//!    [handle_unauthorized][Credentials::handle_unauthorized]. If it returns
//!    `true` a new token was installed and the original request should be
//!    retried exactly once; if it returns `false` the failure is final.

pub mod anonymous;
pub mod access_token;
pub mod basic;
pub mod callback;
pub mod client_credentials;
pub mod user_account;

pub(crate) mod internal;

use crate::Result;
use crate::token::Token;
use http::HeaderMap;
use std::sync::Arc;

/// The default endpoint used to fetch and renew access tokens.
pub(crate) const OAUTH2_ENDPOINT: &str = "https://auth.meridian.science/v2/oauth2/token";

/// An implementation of [dynamic::CredentialsProvider].
///
/// Represents the authorization applied to SDK requests: the headers sent
/// with each request and the recovery behavior when the service rejects
/// them.
///
/// Credentials are time limited where possible. Rather than sending a
/// long-lived secret with every request, the renewing implementations
/// exchange their secret for a short-lived access token and refresh that
/// token as it expires. The handle is cheap to clone and may be shared
/// across tasks and threads; the token state inside is synchronized.
#[derive(Clone, Debug)]
pub struct Credentials {
    // We use an `Arc` to hold the inner implementation.
    //
    // Credentials may be shared across threads (`Send + Sync`), so an `Rc`
    // will not do.
    //
    // They also need to derive `Clone`, as the HTTP clients which hold them
    // derive `Clone`. So a `Box` will not do.
    pub(crate) inner: Arc<dyn dynamic::CredentialsProvider>,
}

impl<T> std::convert::From<T> for Credentials
where
    T: dynamic::CredentialsProvider + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl Credentials {
    /// Asynchronously retrieves the current token.
    ///
    /// Renewing credentials return the cached token, refreshing it first if
    /// it is missing or about to expire. Static credentials return their
    /// fixed token, or an error if they do not hold one.
    pub async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }

    /// Asynchronously constructs the authorization headers for a request.
    ///
    /// The underlying implementation refreshes the token as needed. The
    /// returned headers are marked sensitive so that logging layers do not
    /// record them.
    pub async fn headers(&self) -> Result<HeaderMap> {
        self.inner.headers().await
    }

    /// Reacts to a `401 Unauthorized` response from a service.
    ///
    /// Returns `true` if the credentials obtained a new token and the
    /// original request is worth retrying. Static credentials always return
    /// `false`; renewing credentials discard the rejected token and make
    /// exactly one refresh attempt. A failed attempt is reported as `false`,
    /// never as a panic; a later 401 triggers a new attempt.
    pub async fn handle_unauthorized(&self) -> bool {
        self.inner.handle_unauthorized().await
    }
}

pub mod dynamic {
    use super::{HeaderMap, Result, Token};

    /// A dyn-compatible trait implemented by all credential types.
    ///
    /// Application developers who directly use the Auth SDK can implement
    /// this trait, along with [super::Credentials::from], to mock the
    /// credentials in tests.
    #[async_trait::async_trait]
    pub trait CredentialsProvider: Send + Sync + std::fmt::Debug {
        /// Asynchronously retrieves the current token.
        async fn token(&self) -> Result<Token>;

        /// Asynchronously constructs the authorization headers.
        async fn headers(&self) -> Result<HeaderMap>;

        /// Reacts to a `401 Unauthorized` response.
        ///
        /// Credentials that cannot renew themselves use this default.
        async fn handle_unauthorized(&self) -> bool {
            false
        }
    }
}
