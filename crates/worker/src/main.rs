//! Sigwarden worker binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sigwarden_core::config::AppConfig;
use sigwarden_core::{
    CERTIFICATE_VERIFICATION_TOPIC, CertificateVerificationMessage, SIGNATURE_VALIDATION_TOPIC,
    SignatureValidationMessage,
};
use sigwarden_worker::{
    AppState, CertificateResultHandler, CertificateValidationEngine, DrainOutcome,
    HttpPackageFetcher, Runner, SignatureAcceptanceHandler, Subscription, TracingAlertSink,
    WorkerPool, create_router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sigwarden - package signature trust workers
#[derive(Parser, Debug)]
#[command(name = "sigwardend")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SIGWARDEN_CONFIG",
        default_value = "config/worker.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();
    if has_config_file {
        figment = figment.merge(Toml::file(&args.config));
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SIGWARDEN_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Sigwarden v{}", env!("CARGO_PKG_VERSION"));
    if has_config_file {
        tracing::info!(config_path = %args.config, "Loaded configuration from file");
    } else {
        tracing::info!("No config file found, using defaults and environment variables");
    }

    // Initialize trust store
    let metadata = sigwarden_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize trust store")?;
    tracing::info!("Trust store initialized");

    // Register Prometheus metrics
    sigwarden_worker::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Operational endpoints
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    let app = create_router(AppState::new(config.clone(), metadata.clone()));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });
    tracing::info!("Listening on {}", addr);

    // Handlers
    let alerts = Arc::new(TracingAlertSink);
    let engine = Arc::new(CertificateValidationEngine::new(
        metadata.clone(),
        alerts,
        config.certificates.max_validation_failures,
    ));
    let fetcher = Arc::new(
        HttpPackageFetcher::new(&config.fetcher).context("failed to build package fetcher")?,
    );
    let acceptance = Arc::new(SignatureAcceptanceHandler::new(metadata.clone(), fetcher));
    let certificate_results = Arc::new(CertificateResultHandler::new(engine));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    // Worker pools, one per topic
    let start_pools = || {
        vec![
            WorkerPool::start(
                Subscription::<SignatureValidationMessage>::new(
                    metadata.clone(),
                    SIGNATURE_VALIDATION_TOPIC,
                    &config.worker,
                ),
                acceptance,
                &config.worker,
            ),
            WorkerPool::start(
                Subscription::<CertificateVerificationMessage>::new(
                    metadata.clone(),
                    CERTIFICATE_VERIFICATION_TOPIC,
                    &config.worker,
                ),
                certificate_results,
                &config.worker,
            ),
        ]
    };

    let (_pools, outcome) = Runner::new(&config.worker).run(start_pools, shutdown).await;
    match outcome {
        DrainOutcome::Drained => tracing::info!("Sigwarden stopped"),
        DrainOutcome::TimedOut { remaining } => {
            tracing::warn!(remaining, "Sigwarden stopped with messages in flight")
        }
    }

    Ok(())
}
