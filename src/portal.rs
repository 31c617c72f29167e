//! Wiring: one call from config to a ready session core.

use std::sync::Arc;
use std::time::Duration;

use crate::api::client::ApiClient;
use crate::api::transport::{HttpTransport, ReqwestTransport};
use crate::api::types::TransportError;
use crate::auth::AuthService;
use crate::config::PortalConfig;
use crate::guard::{RouteGuard, Section};
use crate::nav::Navigator;
use crate::session::SessionState;
use crate::storage::{FileStore, KeyValueStore, MemoryStore, TokenStore};
use crate::tenant::TenantResolver;

/// Session core sharing one transport, token store and session.
#[derive(Debug, Clone)]
pub struct Portal {
    pub api: ApiClient,
    pub auth: AuthService,
    pub tenants: Arc<TenantResolver>,
}

impl Portal {
    /// Build over a `reqwest` transport. Tokens go to `token_store_path`
    /// when configured, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &PortalConfig, navigator: Arc<dyn Navigator>) -> Result<Self, TransportError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.timeouts)?);
        let backend: Arc<dyn KeyValueStore> = match &config.token_store_path {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_parts(config, transport, backend, navigator))
    }

    #[must_use]
    pub fn with_parts(
        config: &PortalConfig,
        transport: Arc<dyn HttpTransport>,
        backend: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let session = SessionState::new(TokenStore::new(backend));
        let api = ApiClient::new(&config.api_base_url, Arc::clone(&transport), session, navigator);
        let tenants = TenantResolver::new(
            &config.api_base_url,
            transport,
            &config.platform_domains,
            Duration::from_secs(config.tenant_cache_ttl_secs),
        );
        Self { auth: AuthService::new(api.clone()), api, tenants: Arc::new(tenants) }
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        self.api.session()
    }

    /// Guard for entering `section`.
    #[must_use]
    pub fn guard(&self, section: Section) -> RouteGuard {
        RouteGuard::new(section, self.api.clone())
    }
}

#[cfg(test)]
#[path = "portal_test.rs"]
mod tests;
