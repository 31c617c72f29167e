//! Authenticated request client.
//!
//! ARCHITECTURE
//! ============
//! Every data-fetching caller goes through `ApiClient::request`. It is the
//! only writer of the bearer credential and the only thing that talks to
//! `/auth/refresh`.
//!
//! A request that comes back 401 gets exactly one recovery attempt:
//! 1. If the persisted access token has changed since the request was sent,
//!    another caller already refreshed; retry with the new token.
//! 2. Otherwise join the in-flight refresh, or start one.
//! 3. On success retry once and hand back whatever the retry returns.
//! 4. On failure the session is cleared, navigation to login is issued and
//!    the original 401 is returned as `ApiError::SessionExpired`.
//!
//! CONCURRENCY
//! ===========
//! The in-flight refresh is a `Shared` future kept in `refresh_slot`. The
//! first 401 creates it; concurrent 401s clone it and await the same result.
//! The future empties the slot itself after persisting the new pair (or
//! clearing the session), so a refresh finishes as long as any waiter is
//! still polling and late callers fall into step 1 instead of refreshing
//! again.
//!
//! A refresh remembers the session generation it started under. If the
//! session is cleared (logout) before the new pair lands, the pair is
//! dropped, the waiting requests fail with `SessionExpired` without a retry
//! and no second redirect is issued.

use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::transport::HttpTransport;
use super::types::{ApiError, ApiRequest, ApiResponse, Method, RefreshResponse};
use crate::nav::Navigator;
use crate::session::SessionState;
use crate::storage::TokenPair;

pub const LOGIN_PATH: &str = "/login";

// =============================================================================
// REFRESH FAILURE
// =============================================================================

/// Why a refresh could not produce a new pair.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh response parse failed: {0}")]
    Decode(String),
    #[error("token storage failed: {0}")]
    Storage(String),
    /// Tokens were cleared while the request was in flight; whoever cleared
    /// them has already redirected.
    #[error("session already cleared")]
    SessionCleared,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenPair, RefreshFailure>>>;

// =============================================================================
// CLIENT
// =============================================================================

/// Cheap to clone; clones share tokens, session and the refresh slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    session: SessionState,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    refresh_slot: Mutex<Option<RefreshFuture>>,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        session: SessionState,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                base_url: base_url.trim_end_matches('/').to_owned(),
                transport,
                session,
                navigator,
                login_path: LOGIN_PATH.to_owned(),
                refresh_slot: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    /// Send an authenticated request, refreshing and retrying once on 401.
    ///
    /// # Errors
    ///
    /// - `ApiError::Status` for any non-success response, including a retry
    ///   that failed again.
    /// - `ApiError::SessionExpired` with the original 401 when the session
    ///   could not be recovered.
    /// - `ApiError::Transport` / `ApiError::Storage` when no response could
    ///   be obtained.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let bearer = self.inner.session.tokens().access_token()?;
        let response = self
            .inner
            .send(method, path, bearer.clone(), body.clone())
            .await?;

        // A 401 without credentials is a plain rejection, not an expiry.
        let Some(used) = bearer.filter(|_| response.is_unauthorized()) else {
            return into_result(response);
        };

        tracing::debug!(method = method.as_str(), %path, "access token rejected; attempting refresh");
        let access_token = match self.recover(&used).await {
            Ok(token) => token,
            Err(failure) => {
                tracing::warn!(error = %failure, %path, "session could not be recovered");
                return Err(ApiError::SessionExpired { status: response.status, body: response.body });
            }
        };

        let retried = self
            .inner
            .send(method, path, Some(access_token), body)
            .await?;
        into_result(retried)
    }

    /// Send a request without credentials and without refresh handling.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` for non-success responses and
    /// `ApiError::Transport` if no response was received.
    pub async fn public_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        into_result(self.inner.send(method, path, None, body).await?)
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; also `ApiError::Decode`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::Get, path, None).await?.json()
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; also `ApiError::Decode`.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(Method::Post, path, Some(body)).await?.json()
    }

    /// Produce an access token to retry with after `used` was rejected.
    async fn recover(&self, used: &str) -> Result<String, RefreshFailure> {
        match self.inner.session.tokens().access_token() {
            Ok(Some(current)) if current != used => return Ok(current),
            Ok(Some(_)) => {}
            Ok(None) => return Err(RefreshFailure::SessionCleared),
            Err(e) => return Err(RefreshFailure::Storage(e.to_string())),
        }
        self.refresh_future()
            .await
            .map(|pair| pair.access_token)
    }

    /// The in-flight refresh, started if there is none.
    fn refresh_future(&self) -> RefreshFuture {
        let mut slot = self
            .inner
            .refresh_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.as_ref() {
            tracing::debug!("joining in-flight token refresh");
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let generation = inner.session.generation();
        let pending = async move {
            let result = inner.refresh_tokens(generation).await;
            match &result {
                Ok(_) => {}
                Err(RefreshFailure::SessionCleared) => {
                    tracing::info!("session cleared while refreshing; new pair discarded");
                }
                Err(failure) => inner.expire_session(failure),
            }
            inner
                .refresh_slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            result
        }
        .boxed()
        .shared();
        *slot = Some(pending.clone());
        pending
    }
}

impl ClientInner {
    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        bearer: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest { method, url: self.url(path), bearer, body };
        Ok(self.transport.send(request).await?)
    }

    async fn refresh_tokens(&self, generation: u64) -> Result<TokenPair, RefreshFailure> {
        if self.session.generation() != generation {
            return Err(RefreshFailure::SessionCleared);
        }
        let refresh_token = self
            .session
            .tokens()
            .refresh_token()
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .send(Method::Post, "/auth/refresh", None, Some(body))
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
        if !response.is_success() {
            return Err(RefreshFailure::Rejected(response.status));
        }

        let refreshed: RefreshResponse = response
            .json()
            .map_err(|e| RefreshFailure::Decode(e.to_string()))?;
        let pair = TokenPair::new(refreshed.access_token, refreshed.refresh_token);
        let rotated = self
            .session
            .rotate_tokens(&pair, generation)
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?;
        if !rotated {
            return Err(RefreshFailure::SessionCleared);
        }
        tracing::info!("access token refreshed");
        Ok(pair)
    }

    fn expire_session(&self, failure: &RefreshFailure) {
        tracing::warn!(error = %failure, "token refresh failed; signing out");
        if let Err(e) = self.session.clear_auth() {
            tracing::warn!(error = %e, "clearing persisted tokens failed");
        }
        self.navigator.navigate(&self.login_path);
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() { Ok(response) } else { Err(ApiError::from_response(response)) }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
