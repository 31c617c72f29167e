use std::sync::Arc;

use chauffeur_portal::config::PortalConfig;
use chauffeur_portal::nav::RecordingNavigator;
use chauffeur_portal::portal::Portal;
use chauffeur_portal::routes::{self, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let portal = Portal::from_config(&config, Arc::new(RecordingNavigator::new()))
        .expect("http client init failed");
    tracing::info!(
        api = %config.api_base_url,
        platform_domains = ?config.platform_domains,
        "session core ready"
    );

    let app = routes::app(AppState::new(Arc::clone(&portal.tenants)));
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "chauffeur portal listening");
    axum::serve(listener, app).await.expect("server failed");
}
