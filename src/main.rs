use std::net::SocketAddr;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use drillflow_backend::config::Config;
use drillflow_backend::db::DatabaseProxy;
use drillflow_backend::engine::EngineConfig;
use drillflow_backend::logging;
use drillflow_backend::routes;
use drillflow_backend::seed;
use drillflow_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config.log_level);

    let proxy = match DatabaseProxy::from_env().await {
        Ok(proxy) => proxy,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize database");
            std::process::exit(1);
        }
    };

    if config.seed_sample_data {
        seed::seed_sample_catalog(&proxy).await;
    }

    let state = AppState::new(proxy, EngineConfig::from_env());

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    tracing::info!(%addr, "drillflow backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
