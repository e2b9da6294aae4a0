use std::future::IntoFuture;
use std::sync::Arc;

use folio_chat::{
    auth::Authenticator,
    bus::EventBus,
    config::Config,
    manager::ChatManager,
    presence::PresenceTracker,
    responder::{LoggingResponder, OpenAiResponder, Responder, UnconfiguredResponder},
    store::Store,
    web::{self, AppState},
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env
    let dotenv = dotenvy::dotenv();

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Folio chat starting...");
    if let Err(e) = dotenv {
        info!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!("Initializing store at {}", config.database_path.display());
    let store = Store::new(&config.database_path).await?;
    store.init().await?;

    let bus = Arc::new(EventBus::new());
    let presence = Arc::new(PresenceTracker::new(config.presence_interval));

    let responder: Arc<dyn Responder> = match config.responder.api_key.clone() {
        Some(key) => {
            let backend = OpenAiResponder::new(key, &config.responder)?;
            info!(model = %config.responder.model, "Responder configured");
            Arc::new(LoggingResponder::new(Arc::new(backend)))
        }
        None => {
            warn!("No RESPONDER_API_KEY set; every automated reply will be the fallback message.");
            Arc::new(UnconfiguredResponder)
        }
    };

    if config.owner_email.is_none() || config.owner_password.is_none() {
        warn!("OWNER_EMAIL / OWNER_PASSWORD not set; admin actions will be rejected.");
    }

    let auth = Authenticator::new(
        store.clone(),
        config.owner_email.clone(),
        config.owner_password.clone(),
    );
    let manager = Arc::new(ChatManager::new(
        store,
        bus.clone(),
        responder,
        presence.clone(),
        config.owner_name.clone(),
        config.history_limit,
    ));

    let app = web::router(AppState::new(manager, auth, bus.clone()));

    let sweeper_handle = tokio::spawn(presence.run_sweeper(bus));

    let addr = format!("{}:{}", config.bind_addr, config.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = sweeper_handle => {
            error!("Presence sweeper stopped unexpectedly");
        }
        res = axum::serve(listener, app).into_future() => {
            if let Err(e) = res {
                error!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
