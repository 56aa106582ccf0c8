//! PairLink Back binary entrypoint wiring REST, WebSocket, and MongoDB layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use services::push::{FcmPush, NoopPush, PushSender};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let push: Arc<dyn PushSender> = match env::var("FCM_SERVER_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(FcmPush::new(key)),
        _ => {
            info!("FCM_SERVER_KEY not set; push notifications disabled");
            Arc::new(NoopPush)
        }
    };

    let app_state = AppState::new(AppConfig::load(), push);

    spawn_storage(app_state.clone()).await;
    spawn_degraded_logger(&app_state);
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the MongoDB-backed storage supervisor in the background.
#[cfg(feature = "mongo-store")]
async fn spawn_storage(state: state::SharedState) {
    use dao::{mongodb::MongoCoupleStore, store::CoupleStore};

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();

    tokio::spawn(services::storage_supervisor::run(state, move || {
        let uri = mongo_uri.clone();
        let db = mongo_db.clone();
        async move {
            let store = MongoCoupleStore::connect(&uri, db.as_deref()).await?;
            Ok(Arc::new(store) as Arc<dyn CoupleStore>)
        }
    }));
}

/// Install the in-memory store when the crate is built without MongoDB.
#[cfg(not(feature = "mongo-store"))]
async fn spawn_storage(state: state::SharedState) {
    use dao::memory::MemoryCoupleStore;

    info!("mongo-store feature disabled; using in-memory storage");
    state.install_store(Arc::new(MemoryCoupleStore::new())).await;
}

/// Log storage availability transitions as the supervisor flips degraded mode.
fn spawn_degraded_logger(state: &state::SharedState) {
    let mut watcher = state.degraded_watcher();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            if *watcher.borrow_and_update() {
                tracing::warn!("storage unavailable; serving in degraded mode");
            } else {
                info!("storage available; degraded mode cleared");
            }
        }
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
