use std::sync::Arc;

use clap::Parser;
use grader_core::GradeConfig;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{fmt, EnvFilter};

use grader_server::http::{start_http_server, HttpState};
use grader_server::router::UpdateRouter;
use grader_server::subsystems::backends::{create_embedding_backend, create_transcription_backend};
use grader_server::subsystems::pipeline::{Pipeline, PipelineSettings};
use grader_server::subsystems::storage::ArtifactStore;
use grader_server::subsystems::store::{GradingStore, PgGradingStore};
use grader_server::telegram::TelegramClient;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "grader.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match GradeConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let pool = match grader_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match grader_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Grader DB health check passed");
        return Ok(());
    }

    grader_core::db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let embedder = create_embedding_backend(&config)?;
    let transcriber = create_transcription_backend(&config)?;
    let telegram = Arc::new(TelegramClient::from_config(&config)?);
    let store: Arc<dyn GradingStore> = Arc::new(PgGradingStore::new(pool));

    let settings = PipelineSettings::from(&config);
    let pipeline = Arc::new(Pipeline::new(
        telegram.clone(),
        transcriber,
        embedder.clone(),
        store.clone(),
        telegram.clone(),
        ArtifactStore::from_config(&config.storage),
        settings.clone(),
    ));
    let router = Arc::new(UpdateRouter::new(pipeline, store.clone(), telegram));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let tasks = TaskTracker::new();
    let state = Arc::new(HttpState {
        router,
        store,
        embedder,
        weights: config.scoring,
        tasks: tasks.clone(),
    });
    let addr = format!("{}:{}", config.http.host, config.http.port);
    start_http_server(&addr, state, tx.subscribe()).await?;

    tasks.close();
    tracing::info!(in_flight = tasks.len(), "Waiting for in-flight submissions");
    if tokio::time::timeout(settings.run_budget(), tasks.wait()).await.is_err() {
        tracing::warn!(
            abandoned = tasks.len(),
            "Shutdown drain timed out; abandoning in-flight submissions"
        );
    }

    Ok(())
}
