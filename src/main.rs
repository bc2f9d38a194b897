//! Quiz Nest Back binary entrypoint wiring REST, WebSocket, and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dto;
mod error;
mod questions;
mod routes;
mod services;
mod state;

use config::AppConfig;
use questions::cache::QuestionCache;
use questions::generator::{QuestionGenerator, UnavailableGenerator};
use questions::source::QuestionSource;
use services::leaderboard::LoggingLeaderboard;
use services::room_service::RoomDeps;
use state::AppState;
use state::rooms::RoomManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let source = Arc::new(QuestionSource::new(
        QuestionCache::new(config.cache_ttl()),
        build_generator(&config),
        Arc::new(config.fallback_pool()),
        config.generation_timeout(),
    ));
    let deps = RoomDeps {
        source,
        leaderboard: Arc::new(LoggingLeaderboard),
        settings: config.room_settings(),
    };
    let app_state = AppState::new(RoomManager::new(deps));

    // Build the HTTP router once the shared state is ready.
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

/// Pick the question generation backend from the configuration.
fn build_generator(config: &AppConfig) -> Arc<dyn QuestionGenerator> {
    #[cfg(feature = "http-generator")]
    if let Some(url) = config.generator_url() {
        match questions::generator::HttpQuestionGenerator::new(url) {
            Ok(generator) => {
                info!(url, "using HTTP question generator");
                return Arc::new(generator);
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to build HTTP question generator; serving from the fallback pool"
                );
            }
        }
    }

    #[cfg(not(feature = "http-generator"))]
    if config.generator_url().is_some() {
        tracing::warn!(
            "generator_url is configured but the http-generator feature is disabled"
        );
    }

    Arc::new(UnavailableGenerator)
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
