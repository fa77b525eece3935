use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wabot_bridge::config::Config;
use wabot_bridge::router::{BridgeState, bridge_router};
use wabot_bridge::service::{autoresponder, session_actor};
use wabot_bridge::store::SessionStore;
use wabot_bridge::transport::{EvolutionGateway, Transport};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        port = cfg.port,
        loglevel = %cfg.loglevel,
        session_file = %cfg.session_file.display(),
        media_file = %cfg.media_file.display(),
        gateway_url = %cfg.gateway_url,
        gateway_key = redact(&cfg.gateway_key),
        instance = %cfg.instance_name,
        webhook_url = %cfg.webhook_url,
        webhook_key = redact(&cfg.webhook_key),
    );
    if cfg.webhook_key.is_empty() {
        warn!("WABOT_WEBHOOK_KEY is empty; gateway webhook calls will be rejected");
    }

    let transport: Arc<dyn Transport> = Arc::new(EvolutionGateway::new(&cfg)?);
    let store = SessionStore::new(cfg.session_file.clone());
    let session = session_actor::spawn(store, transport).await?;

    // Subscribers first, so the first lifecycle events are not missed.
    let _autoresponder = autoresponder::spawn(session.clone());
    session.start();

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = bridge_router(BridgeState::new(session, cfg));

    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
