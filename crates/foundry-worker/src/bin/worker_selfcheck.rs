use std::path::Path;

use foundry_genai::EdgeTtsBackend;
use foundry_media::check_ffmpeg;
use foundry_models::job_id_from_final_name;
use foundry_store::{FileJobStore, JobStore};
use foundry_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!("foundry-selfcheck: {}", config.summary());

    ensure_dir(&config.output_dir).await?;
    ensure_dir(&config.temp_dir).await?;

    if config.visual.mock {
        println!("foundry-selfcheck: mock video, skipping ffmpeg check");
    } else {
        let ffmpeg = check_ffmpeg(&config.stitch.ffmpeg_bin)?;
        println!("foundry-selfcheck: found ffmpeg at {}", ffmpeg.display());
        if config.visual.gemini_api_key.is_none() {
            anyhow::bail!("GEMINI_API_KEY is required when USE_MOCK_VEO=false");
        }
    }

    if config.audio.mock {
        println!("foundry-selfcheck: mock audio, skipping edge-tts check");
    } else {
        let edge_tts = EdgeTtsBackend::new(config.audio.standard.clone());
        if !edge_tts.is_available() {
            anyhow::bail!(
                "{} not available; install edge-tts or set USE_MOCK_AUDIO=true",
                config.audio.standard.binary
            );
        }
        println!("foundry-selfcheck: found {}", config.audio.standard.binary);
    }

    if let Some(store_dir) = &config.store_dir {
        let orphans = orphaned_artifacts(&config.output_dir, store_dir).await?;
        if orphans > 0 {
            println!(
                "foundry-selfcheck: warning: {} final artifacts have no job record",
                orphans
            );
        }
    }

    println!("foundry-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}

/// Count `<id>_final.mp4` files whose job is unknown to the store.
async fn orphaned_artifacts(output_dir: &Path, store_dir: &Path) -> anyhow::Result<usize> {
    let store = FileJobStore::open(store_dir).await?;
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    let mut orphans = 0;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(id) = job_id_from_final_name(&name) else {
            continue;
        };
        match store.load(&id).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => orphans += 1,
        }
    }
    Ok(orphans)
}
