//! Router assembly for the branding shell.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages rendered for a tenant's custom domain ask the shell which brand to
//! show. The shell reads the inbound host, resolves it through the shared
//! `TenantResolver` and answers with tenant or platform branding. Lookup
//! failures never surface as errors here; they just yield platform branding.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::tenant::{Branding, TenantResolver};

const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantResolver>,
}

impl AppState {
    #[must_use]
    pub fn new(tenants: Arc<TenantResolver>) -> Self {
        Self { tenants }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/branding", get(branding_for_host))
        .route("/api/branding/{slug}", get(branding_for_slug))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Host the visitor asked for; a reverse proxy's `X-Forwarded-Host` wins.
fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(FORWARDED_HOST)
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map_or("", str::trim)
}

/// `GET /api/branding`: branding for the request's host.
async fn branding_for_host(State(state): State<AppState>, headers: HeaderMap) -> Json<Branding> {
    let host = request_host(&headers);
    Json(state.tenants.branding_for_host(host).await)
}

/// `GET /api/branding/{slug}`: branding for a tenant slug.
async fn branding_for_slug(State(state): State<AppState>, Path(slug): Path<String>) -> Json<Branding> {
    Json(Branding::for_tenant(state.tenants.resolve_by_slug(&slug).await))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
