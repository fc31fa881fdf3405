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

use crate::Result;
use crate::errors;
use crate::token::Token;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};

/// A utility function to create bearer headers.
pub(crate) fn build_bearer_headers(token: &Token) -> Result<HeaderMap> {
    build_auth_headers(format!("{} {}", token.token_type, token.token))
}

/// A utility function to create HTTP Basic headers.
pub(crate) fn build_basic_headers(client_id: &str, client_secret: &str) -> Result<HeaderMap> {
    let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
    build_auth_headers(format!("Basic {encoded}"))
}

fn build_auth_headers(value: String) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(&value).map_err(errors::non_retryable)?;
    value.set_sensitive(true);

    let mut header_map = HeaderMap::new();
    header_map.insert(AUTHORIZATION, value);
    Ok(header_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderName;
    use std::error::Error as _;

    fn create_test_token(token: &str, token_type: &str) -> Token {
        Token {
            token: token.to_string(),
            token_type: token_type.to_string(),
            expires_at: None,
            metadata: None,
        }
    }

    #[test]
    fn build_bearer_headers_success() {
        let token = create_test_token("test_token", "Bearer");

        let headers = build_bearer_headers(&token).unwrap();

        assert_eq!(headers.len(), 1, "{headers:?}");
        let value = headers
            .get(HeaderName::from_static("authorization"))
            .unwrap();

        assert_eq!(value, HeaderValue::from_static("Bearer test_token"));
        assert!(value.is_sensitive());
    }

    #[test]
    fn build_bearer_headers_different_token_type() {
        let token = create_test_token("special_token", "MAC");

        let headers = build_bearer_headers(&token).unwrap();

        let value = headers
            .get(HeaderName::from_static("authorization"))
            .unwrap();
        assert_eq!(value, HeaderValue::from_static("MAC special_token"));
        assert!(value.is_sensitive());
    }

    #[test]
    fn build_bearer_headers_invalid_token() {
        let token = create_test_token("token with \n invalid chars", "Bearer");

        let result = build_bearer_headers(&token);

        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(!error.is_retryable(), "{error:?}");
        let source = error
            .source()
            .and_then(|e| e.downcast_ref::<http::header::InvalidHeaderValue>());
        assert!(
            matches!(source, Some(http::header::InvalidHeaderValue { .. })),
            "{error:?}"
        );
    }

    #[test]
    fn build_basic_headers_success() {
        let headers = build_basic_headers("aladdin", "opensesame").unwrap();

        let value = headers
            .get(HeaderName::from_static("authorization"))
            .unwrap();
        // The canonical pair from RFC 7617.
        assert_eq!(
            value,
            HeaderValue::from_static("Basic YWxhZGRpbjpvcGVuc2VzYW1l")
        );
        assert!(value.is_sensitive());
    }
}
