use std::path::Path;

use zyeute_media::{check_ffmpeg, check_ffprobe};
use zyeute_queue::JobQueue;
use zyeute_records::SupabaseRecords;
use zyeute_safety::SafetyClient;
use zyeute_storage::R2Client;
use zyeute_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!("worker-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    let queue = JobQueue::from_env()?;
    queue.ping().await?;
    println!("worker-selfcheck: redis ok");

    R2Client::from_env()?.check_connectivity().await?;
    println!("worker-selfcheck: storage ok");

    SupabaseRecords::from_env()?.health_check().await?;
    println!("worker-selfcheck: records ok");

    if SafetyClient::from_env()?.health_check().await? {
        println!("worker-selfcheck: safety service ok");
    } else {
        println!(
            "worker-selfcheck: safety service unhealthy (policy: {})",
            config.undetermined_policy.as_str()
        );
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
