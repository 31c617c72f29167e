//! Login and logout on top of the request client and session.

use serde::Serialize;

use crate::api::client::{ApiClient, LOGIN_PATH};
use crate::api::types::{ApiError, LoginResponse, Method, Role, User};
use crate::guard::Section;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange credentials for a token pair and sign the user in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` when the credentials are rejected,
    /// `ApiError::Decode` for an unexpected body and `ApiError::Storage` if
    /// the pair cannot be persisted.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let body = serde_json::to_value(LoginRequest { email, password })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let response = self
            .api
            .public_request(Method::Post, "/auth/login", Some(body))
            .await
            .inspect_err(|e| tracing::info!(error = %e, "login rejected"))?;
        let login: LoginResponse = response.json()?;

        self.api
            .session()
            .set_auth(login.user.clone(), &login.access_token, &login.refresh_token)?;
        Ok(login.user)
    }

    /// Best-effort server logout, then clear local state and go to login.
    pub async fn logout(&self) {
        let mut redirected = false;
        if self.api.session().tokens().access_token().ok().flatten().is_some() {
            match self.api.request(Method::Post, "/auth/logout", None).await {
                Ok(_) => {}
                // The client already signed out and redirected.
                Err(ApiError::SessionExpired { .. }) => redirected = true,
                Err(e) => tracing::debug!(error = %e, "server logout failed; ignoring"),
            }
        }
        if let Err(e) = self.api.session().clear_auth() {
            tracing::warn!(error = %e, "clearing persisted tokens failed");
        }
        if !redirected {
            self.api.navigator().navigate(LOGIN_PATH);
        }
    }
}

/// Dashboard a user lands on after signing in.
#[must_use]
pub fn landing_path(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => Section::SuperAdmin.path(),
        Role::TenantAdmin => Section::TenantAdmin.path(),
        Role::TenantStaff => Section::TenantStaff.path(),
        Role::Passenger => Section::Passenger.path(),
        Role::CorporateAdmin | Role::Driver => "/",
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
