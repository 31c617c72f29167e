//! Wire types shared by the request client, session and tenant resolver.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageError;

// =============================================================================
// USERS
// =============================================================================

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    TenantAdmin,
    TenantStaff,
    CorporateAdmin,
    Passenger,
    Driver,
}

impl Role {
    /// Wire name, e.g. `"TENANT_ADMIN"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::TenantAdmin => "TENANT_ADMIN",
            Self::TenantStaff => "TENANT_STAFF",
            Self::CorporateAdmin => "CORPORATE_ADMIN",
            Self::Passenger => "PASSENGER",
            Self::Driver => "DRIVER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record as returned by `/auth/me` and `/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
}

/// Body of a successful `/auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of a successful `/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

// =============================================================================
// REQUESTS / RESPONSES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Fully resolved outbound request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Bearer credential, without the `Bearer ` prefix.
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Raw response from a transport: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure to get any response at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("reading response body failed: {0}")]
    Body(String),
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

/// Errors returned by the authenticated request client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The original 401 after the token refresh could not recover. The
    /// session has been cleared and navigation to login already issued.
    #[error("session expired: status {status}")]
    SessionExpired { status: u16, body: String },

    /// A success body could not be decoded.
    #[error("API response parse failed: {0}")]
    Decode(String),

    /// Reading or writing persisted tokens failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Status code of the response behind this error, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::SessionExpired { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_response(response: ApiResponse) -> Self {
        Self::Status { status: response.status, body: response.body }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
