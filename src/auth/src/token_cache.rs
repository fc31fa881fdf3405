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
use crate::token::{Token, TokenProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
// Using tokio's wrapper makes the cache testable without relying on clock times.
use tokio::time::Instant;

/// Tokens expiring within this margin are treated as already expired.
///
/// A token may expire between the time we attach it to a request and the
/// time the service verifies it. Refreshing slightly early avoids sending
/// requests that are doomed to receive a 401.
pub(crate) const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A caching wrapper over a [TokenProvider].
///
/// Serves the last fetched token until it is close to expiring, and
/// collapses concurrent refresh attempts into a single call to the inner
/// provider.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    // The cached token (or the last seen error), tagged with a refresh
    // generation. The generation lets a task waiting for the gate tell
    // whether someone else already refreshed on its behalf.
    slot: Arc<Mutex<CacheSlot>>,

    // Serializes refreshes. Tasks needing a refresh queue on this lock;
    // whoever holds it performs the exchange for everyone waiting behind it.
    refresh_gate: Arc<Mutex<()>>,

    // The token provider. This thing does the refreshing.
    inner: Arc<T>,
}

#[derive(Debug)]
struct CacheSlot {
    generation: u64,
    value: Result<Token>,
}

// Returns true if we are holding an error, or a token that has expired (or
// is about to).
fn invalid(token: &Result<Token>) -> bool {
    match token {
        Ok(t) => t
            .expires_at
            .is_some_and(|e| e <= Instant::now().into_std() + EXPIRY_MARGIN),
        Err(_) => true,
    }
}

// We manually implement the `Clone` trait because the Rust compiler will
// squawk if `T` is not `Clone`, even though we only hold an `Arc<T>`.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            slot: self.slot.clone(),
            refresh_gate: self.refresh_gate.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenProvider> TokenCache<T> {
    pub(crate) fn new(inner: T) -> TokenCache<T> {
        Self::with_initial(inner, Err(empty_cache_error()))
    }

    /// Creates a cache seeded with `initial`, typically a token the
    /// application obtained out of band. No refresh happens until the seed
    /// token is close to expiring.
    pub(crate) fn with_initial(inner: T, initial: Result<Token>) -> TokenCache<T> {
        TokenCache {
            slot: Arc::new(Mutex::new(CacheSlot {
                generation: 0,
                value: initial,
            })),
            refresh_gate: Arc::new(Mutex::new(())),
            inner: Arc::new(inner),
        }
    }

    /// Drops the cached token, forcing the next [token][TokenCache::token]
    /// call to consult the inner provider.
    ///
    /// Called when the service rejected the cached token, for example with a
    /// `401 Unauthorized` response received before the local expiration.
    pub(crate) async fn invalidate(&self) {
        self.slot.lock().await.value = Err(empty_cache_error());
    }

    // Clones the current generation and token, in a thread-safe manner.
    // Releases the lock on return.
    async fn current(&self) -> (u64, Result<Token>) {
        let slot = self.slot.lock().await;
        (slot.generation, slot.value.clone())
    }
}

fn empty_cache_error() -> crate::errors::CredentialsError {
    crate::errors::retryable_from_str("no token in the cache")
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        let (generation, value) = self.current().await;
        if !invalid(&value) {
            return value;
        }

        // A refresh is needed. Queue on the gate; waiters park here while
        // one task performs the exchange, and the lock queue guarantees
        // every waiter eventually runs.
        let _gate = self.refresh_gate.lock().await;

        // Another task may have completed a refresh while we waited. Its
        // result, token or error, answers this request too.
        let (current_generation, value) = self.current().await;
        if current_generation != generation {
            return value;
        }

        let value = self.inner.token().await;
        match &value {
            Ok(_) => tracing::debug!("token refresh succeeded"),
            Err(e) => tracing::debug!("token refresh failed: {e}"),
        }

        // Store the token, or an updated error.
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        slot.value = value.clone();
        value
    }
}
