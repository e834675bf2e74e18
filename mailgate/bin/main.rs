use std::sync::Arc;

use mailgate::config::Config;
use mailgate::{http, registry};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let metrics = if config.metrics {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let facade = registry::build_facade(&config)?;
    tracing::info!(
        "send mail with a POST to {}/send?key=<api key>",
        config.public_url
    );
    if config.posthook_forward.is_empty() {
        tracing::info!("posthook forwarding is disabled");
    } else {
        tracing::info!(forward = %config.posthook_forward, "posthooks will be forwarded");
    }

    let addr = config.http_addr.clone();
    let state = Arc::new(http::AppState::new(facade, config, metrics));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "starting server");
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("terminating");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "could not install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
