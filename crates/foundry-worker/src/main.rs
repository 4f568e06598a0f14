//! Foundry worker binary.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use foundry_models::{GenerateRequest, JobStatus, JobStatusView, DEFAULT_STYLE};
use foundry_queue::JobQueue;
use foundry_store::{FileJobStore, InMemoryJobStore, JobStore};
use foundry_worker::{
    init_tracing, metrics, JobExecutor, JobService, Orchestrator, WorkerConfig, WorkerResult,
};

#[derive(Parser)]
#[command(name = "foundry-worker", version, about = "Prompt-to-video job worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker until interrupted (default)
    Serve,
    /// Submit one job, run it to completion and print its status as JSON
    Generate {
        /// Visual intent
        #[arg(long)]
        prompt: String,
        /// Narration text; the prompt is narrated when empty
        #[arg(long, default_value = "")]
        monologue: String,
        /// Visual style tag
        #[arg(long, default_value = DEFAULT_STYLE)]
        style: String,
        /// Request the premium narration tier
        #[arg(long)]
        premium: bool,
    },
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    info!("Worker config: {}", config.summary());

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!("Metrics listening on :{}", port),
            Err(e) => error!("Failed to start metrics exporter: {}", e),
        }
    }

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Generate {
            prompt,
            monologue,
            style,
            premium,
        } => {
            let request = GenerateRequest::new(prompt)
                .with_monologue(monologue)
                .with_style(style)
                .with_paid_voice(premium);
            generate(config, request).await
        }
    };

    if let Err(e) = result {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }
}

async fn open_store(config: &WorkerConfig) -> WorkerResult<Arc<dyn JobStore>> {
    Ok(match &config.store_dir {
        Some(dir) => Arc::new(FileJobStore::open(dir).await?),
        None => Arc::new(InMemoryJobStore::new()),
    })
}

async fn build(config: &WorkerConfig) -> WorkerResult<(Arc<JobExecutor>, JobService, foundry_queue::JobReceiver)> {
    config.ensure_dirs().await?;
    let store = open_store(config).await?;
    let orchestrator = Arc::new(Orchestrator::from_config(config, Arc::clone(&store))?);

    let (queue, receiver) = JobQueue::new(config.queue.clone());
    let executor = Arc::new(JobExecutor::new(config, orchestrator, queue.clone()));
    let service = JobService::new(store, queue);
    Ok((executor, service, receiver))
}

async fn serve(config: WorkerConfig) -> WorkerResult<()> {
    let (executor, _service, receiver) = build(&config).await?;

    let recovered = executor.recover_queued().await;
    if recovered > 0 {
        info!("Re-queued {} jobs left over from a previous run", recovered);
    }

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run(receiver).await;
    info!("Worker shutdown complete");
    Ok(())
}

async fn generate(config: WorkerConfig, request: GenerateRequest) -> WorkerResult<()> {
    let (executor, service, receiver) = build(&config).await?;

    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let id = service.submit(request).await?;
    info!(job_id = %id, "Submitted job");

    let job = service
        .wait_for_terminal(&id, Duration::from_millis(500))
        .await?;

    executor.shutdown();
    runner.await.ok();

    let Some(job) = job else {
        error!(job_id = %id, "Job record disappeared");
        std::process::exit(1);
    };

    match serde_json::to_string_pretty(&JobStatusView::from(&job)) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render status: {}", e),
    }

    if job.status == JobStatus::Failed {
        error!(
            "Job failed: {}",
            job.error_message.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }
    Ok(())
}
