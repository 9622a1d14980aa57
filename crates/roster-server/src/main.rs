//! roster-sync: server and one-shot pipeline commands

use anyhow::Result;
use clap::{Parser, Subcommand};
use roster_common::logging::{init_logging, LogConfig, LogLevel};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use roster_server::{
    api::{self, AppState},
    config::Config,
    db::{self, PgMemberStore},
    mail::HttpMailer,
    pipeline::{Backends, ObjectRef, Pipeline},
    queue::PgNotificationQueue,
    scheduler::ExportScheduler,
    storage::{config::StorageConfig, S3Storage},
    worker::NotificationWorker,
};

/// Member roster sync pipeline
#[derive(Parser, Debug)]
#[command(name = "roster-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server with the notification worker and export scheduler (default)
    Serve,

    /// Ingest one uploaded roster
    Ingest {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        key: String,
    },

    /// Write one export snapshot now
    Export,

    /// Drain the notification queue
    Notify {
        /// Stop after this many non-empty batches
        #[arg(long, default_value_t = 1)]
        max_batches: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = log_config(cli.verbose);

    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli.command.unwrap_or(Commands::Serve)).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Built-in logging defaults for the binary, with `LOG_*` overrides on top.
///
/// Invalid overrides are reported and ignored as a whole.
fn log_config(verbose: bool) -> LogConfig {
    let base = LogConfig::builder()
        .level(if verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("roster-sync")
        .filter_directives("tower_http=debug,sqlx=warn,aws_config=warn,aws_smithy_runtime=warn")
        .build();

    base.clone().merge_env().unwrap_or_else(|e| {
        eprintln!("Ignoring invalid LOG_* settings: {}", e);
        base
    })
}

async fn run(command: Commands) -> Result<()> {
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    db::migrate(&pool).await?;
    info!("Database migrations completed");

    let storage = S3Storage::new(StorageConfig::from_env()?).await?;
    let mailer = HttpMailer::new(&config.mail)?;

    let backends = Backends {
        objects: Arc::new(storage),
        members: Arc::new(PgMemberStore::new(pool.clone())),
        queue: Arc::new(PgNotificationQueue::new(pool, &config.queue)),
        mailer: Arc::new(mailer),
    };
    let pipeline = Pipeline::new(backends, &config);

    match command {
        Commands::Serve => serve(pipeline, &config).await,

        Commands::Ingest { bucket, key } => {
            let report = pipeline
                .ingestor
                .ingest_object(&ObjectRef::new(bucket, key))
                .await?;
            println!(
                "Ingested {} members: {} stored, {} queued, {} failed",
                report.total(),
                report.stored(),
                report.queued(),
                report.failed()
            );
            Ok(())
        }

        Commands::Export => {
            let report = pipeline.exporter.export_now().await?;
            println!(
                "Exported {} members to {} ({} bytes, sha256 {})",
                report.rows, report.key, report.size, report.checksum
            );
            Ok(())
        }

        Commands::Notify { max_batches } => {
            let worker = NotificationWorker::new(
                pipeline.backends.queue.clone(),
                pipeline.notifier.clone(),
                &config.queue,
            );
            for _ in 0..max_batches {
                let summary = worker.run_once().await?;
                println!(
                    "Batch: {} received, {} sent, {} failed, {} rejected, {} discarded",
                    summary.received,
                    summary.succeeded,
                    summary.failed,
                    summary.rejected,
                    summary.discarded
                );
                if summary.received == 0 {
                    break;
                }
            }
            Ok(())
        }
    }
}

async fn serve(pipeline: Pipeline, config: &Config) -> Result<()> {
    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    let worker = NotificationWorker::new(
        pipeline.backends.queue.clone(),
        pipeline.notifier.clone(),
        &config.queue,
    );
    let token = shutdown.clone();
    tasks.push(tokio::spawn(async move { worker.run(token).await }));

    if config.pipeline.export_enabled {
        let scheduler = ExportScheduler::new(pipeline.exporter.clone(), config.pipeline.export_interval());
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move { scheduler.run(token).await }));
    } else {
        info!("Export scheduler is disabled (EXPORT_ENABLED=false)");
    }

    let router = api::create_router(AppState::from_pipeline(&pipeline));
    let result = api::serve(router, &config.server, shutdown.clone()).await;

    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    result
}
