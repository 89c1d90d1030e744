use anyhow::Result;
use hostmailer::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    if app_config.mail.base_url.is_none() {
        tracing::warn!("mail.base_url is not set; summary mail will fail until it is configured");
    }

    let store = store::SqliteStore::connect(
        &app_config.database.path,
        app_config.database.max_pool_size,
        app_config.hosts.out_of_sync_minutes,
    )
    .await?;
    store.init().await?;

    let dispatcher: Arc<AppDispatcher> = Arc::new(dispatcher::Dispatcher::new(
        store.clone(),
        store.clone(),
        app_config.mail.clone(),
    ));

    let worker_handle = if app_config.summary.enabled {
        Some(summary_worker::spawn(
            dispatcher.clone(),
            summary_worker::SummaryWorkerConfig {
                schedule: app_config.summary.schedule.clone(),
                interval_secs: app_config.summary.interval_secs,
                since_hours: app_config.summary.since_hours,
            },
        ))
    } else {
        tracing::info!("summary worker disabled");
        None
    };

    let app = routes::app(dispatcher, store);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Received shutdown signal");
    if let Some(handle) = worker_handle {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
