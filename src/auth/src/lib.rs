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

//! Meridian Client Libraries for Rust - Authorization Components
//!
//! This crate contains the types and functions used to authorize requests to
//! the Meridian platform services (transfer, search, groups, flows, timers).
//! The SDK clients consume an implementation of [credentials::Credentials] and
//! use it to attach an `Authorization` header to each request, and to recover
//! from `401 Unauthorized` responses where recovery is possible.
//!
//! The crate also models the platform's OAuth2 scope grammar, including
//! nested dependent scopes ([scopes::Scope]), and the consent trees reported
//! by the authorization service ([consents::ConsentForest]).

pub mod errors;

/// Types and functions to work with authorization credentials.
pub mod credentials;

/// Types and functions to work with access tokens.
pub mod token;

/// The token cache.
pub(crate) mod token_cache;

/// The OAuth2 scope grammar and scope trees.
pub mod scopes;

/// Consent trees reported by the authorization service.
pub mod consents;

/// A `Result` alias where the `Err` case is
/// `meridian_auth::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

/// Header construction helpers shared by the credentials implementations.
pub(crate) mod headers_util;
