use std::sync::Arc;

use media_relay::config::Settings;
use media_relay::downloader::YtDlpProvider;
use media_relay::server::{self, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tokio::fs::create_dir_all(&settings.work_dir).await?;
    info!("Work directory: {}", settings.work_dir.display());

    let provider = YtDlpProvider::new(
        settings.ytdlp_bin.clone(),
        settings.info_timeout_secs,
        settings.download_timeout_secs,
    );

    let state = AppState::new(settings, Arc::new(provider)).await;
    server::serve(state).await?;
    Ok(())
}
