use anyhow::Context;

use t7md_media::{check_ffmpeg, check_ffprobe, HudFont};
use t7md_ml_client::MlClient;
use t7md_models::ConfigStore;
use t7md_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!("t7md-selfcheck: starting with ml_url={}", config.ml.base_url);

    let ffmpeg = check_ffmpeg().context("ffmpeg not available")?;
    println!("t7md-selfcheck: ffmpeg at {}", ffmpeg.display());
    let ffprobe = check_ffprobe().context("ffprobe not available")?;
    println!("t7md-selfcheck: ffprobe at {}", ffprobe.display());

    let store = match &config.config_path {
        Some(path) => ConfigStore::load(path),
        None => ConfigStore::load_default(),
    }
    .context("config could not be loaded")?;
    let render = store.snapshot();

    match HudFont::discover(&render.style.font_path) {
        Ok(_) => println!("t7md-selfcheck: HUD font ok"),
        // Boxes and minimap still render without text
        Err(e) => println!("t7md-selfcheck: warning: {}", e),
    }

    let client = MlClient::new(config.ml.clone())?;
    let healthy = client
        .health_check()
        .await
        .with_context(|| format!("recognition service at {} unreachable", client.base_url()))?;
    if !healthy {
        anyhow::bail!("recognition service at {} reports unhealthy", client.base_url());
    }

    println!("t7md-selfcheck: ok");
    Ok(())
}
