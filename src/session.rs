//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by route guards, the auth service and the request client to agree
//! on who is signed in. `SessionState` is an injectable container, not a
//! process-wide singleton; every clone shares one session.
//!
//! DESIGN
//! ======
//! The in-memory `Session` and the persisted `TokenStore` move together:
//! every mutator writes storage first and then swaps the in-memory value in a
//! single `watch` update, so subscribers never observe a half-applied state.
//! `Session` fields are private; the authenticated flag is derived from them
//! rather than stored.
//!
//! Every `clear_auth` bumps a generation counter. A token refresh records
//! the generation it started under and `rotate_tokens` refuses to persist
//! its pair once the counter has moved, so a refresh that straddles a logout
//! cannot bring the tokens back.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::api::client::ApiClient;
use crate::api::types::{ApiError, Role, User};
use crate::storage::{StorageError, TokenPair, TokenStore};

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of the signed-in user and the access token in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    access_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// True iff both a user and an access token are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    /// Role of the signed-in user, if authenticated.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        if self.is_authenticated() { self.user.as_ref().map(|u| u.role) } else { None }
    }

    fn is_empty(&self) -> bool {
        self.user.is_none() && self.access_token.is_none()
    }
}

/// Result of [`SessionState::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The session holds a user with a permitted role.
    Authenticated(User),
    /// The session was cleared and navigation to login has been issued.
    Redirected,
}

// =============================================================================
// SESSION STATE
// =============================================================================

#[derive(Clone)]
pub struct SessionState {
    tokens: TokenStore,
    current: Arc<watch::Sender<Session>>,
    /// Bumped by `clear_auth`. Held while persisted tokens change so a clear
    /// and a rotation never interleave.
    generation: Arc<Mutex<u64>>,
}

impl SessionState {
    /// Create an empty session over `tokens`. Persisted tokens are left
    /// untouched; call [`SessionState::restore`] to adopt them.
    #[must_use]
    pub fn new(tokens: TokenStore) -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tokens, current: Arc::new(tx), generation: Arc::new(Mutex::new(0)) }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().user.clone()
    }

    /// Current sign-out generation; pass it back to `rotate_tokens`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receiver notified after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.current.subscribe()
    }

    /// Persist the pair, then mark `user` as signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the token pair cannot be persisted; the in-memory
    /// session is left unchanged in that case.
    pub fn set_auth(&self, user: User, access_token: &str, refresh_token: &str) -> Result<(), StorageError> {
        let _generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        self.tokens
            .save(&TokenPair::new(access_token, refresh_token))?;
        tracing::info!(user_id = %user.id, role = %user.role, "session authenticated");
        self.current.send_replace(Session { user: Some(user), access_token: Some(access_token.to_owned()) });
        Ok(())
    }

    /// Remove persisted tokens and reset the session to empty. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted tokens could not be removed. The
    /// in-memory session is reset regardless.
    pub fn clear_auth(&self) -> Result<(), StorageError> {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        let cleared = self.tokens.clear();
        let changed = self.current.send_if_modified(|session| {
            if session.is_empty() {
                false
            } else {
                *session = Session::default();
                true
            }
        });
        if changed {
            tracing::info!("session cleared");
        }
        cleared
    }

    /// Persist a refreshed pair and, if someone is signed in, switch the
    /// in-memory access token to it.
    ///
    /// Returns `Ok(false)` without touching anything when the session was
    /// cleared since `generation` was read.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be persisted.
    pub fn rotate_tokens(&self, pair: &TokenPair, generation: u64) -> Result<bool, StorageError> {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            tracing::debug!(started = generation, current = *current, "session cleared during refresh; dropping new pair");
            return Ok(false);
        }
        self.tokens.save(pair)?;
        self.current.send_if_modified(|session| {
            if session.user.is_some() {
                session.access_token = Some(pair.access_token.clone());
                true
            } else {
                false
            }
        });
        Ok(true)
    }

    /// Recover a session on a fresh load.
    ///
    /// No-op when already authenticated with a permitted role. Otherwise the
    /// persisted access token is checked against `/auth/me`; anything short
    /// of a permitted user clears the session and navigates to `login_path`.
    pub async fn restore(&self, api: &ApiClient, permitted: &[Role], login_path: &str) -> RestoreOutcome {
        if let Some(user) = self.current_user() {
            if self.is_authenticated() && permitted.contains(&user.role) {
                return RestoreOutcome::Authenticated(user);
            }
        }

        match self.tokens.access_token() {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!("no persisted access token");
                return self.reject(api, login_path);
            }
            Err(e) => {
                tracing::warn!(error = %e, "reading persisted access token failed");
                return self.reject(api, login_path);
            }
        }

        let user = match api.get_json::<User>("/auth/me").await {
            Ok(user) => user,
            Err(ApiError::SessionExpired { .. }) => return RestoreOutcome::Redirected,
            Err(e) => {
                tracing::warn!(error = %e, "session restore failed");
                return self.reject(api, login_path);
            }
        };

        if !permitted.contains(&user.role) {
            tracing::warn!(user_id = %user.id, role = %user.role, "restored user role not permitted");
            return self.reject(api, login_path);
        }

        // `/auth/me` may have gone through a refresh, so adopt whatever pair
        // is persisted now.
        let pair = match self.tokens.load() {
            Ok(Some(pair)) => pair,
            Ok(None) => return self.reject(api, login_path),
            Err(e) => {
                tracing::warn!(error = %e, "reading persisted tokens failed");
                return self.reject(api, login_path);
            }
        };
        if let Err(e) = self.set_auth(user.clone(), &pair.access_token, &pair.refresh_token) {
            tracing::warn!(error = %e, "persisting restored session failed");
            return self.reject(api, login_path);
        }
        RestoreOutcome::Authenticated(user)
    }

    fn reject(&self, api: &ApiClient, login_path: &str) -> RestoreOutcome {
        if let Err(e) = self.clear_auth() {
            tracing::warn!(error = %e, "clearing persisted tokens failed");
        }
        api.navigator().navigate(login_path);
        RestoreOutcome::Redirected
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("session", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
