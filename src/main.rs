use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use fieldservice_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    tokio::fs::create_dir_all(cfg.upload_dir())
        .await
        .with_context(|| format!("failed to create upload dir {}", cfg.upload_dir().display()))?;

    let db_arc = Arc::new(db_pool);
    let app_state = api::AppState::new(db_arc, cfg.clone());

    match (&cfg.bootstrap_admin_email, &cfg.bootstrap_admin_password) {
        (Some(email), Some(password)) => {
            if app_state.auth.bootstrap_admin(email, password).await? {
                info!(email = %email, "bootstrap admin created");
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("bootstrap admin needs both email and password; skipping");
        }
        (None, None) => {}
    }

    let app = api::app_router(app_state);

    // Bind and serve
    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address {}", cfg.host))?;
    let addr = SocketAddr::new(host, cfg.port);
    info!("fieldservice-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("fieldservice-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
