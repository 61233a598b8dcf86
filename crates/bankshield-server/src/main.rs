//! BankShield server
//!
//! Detects banking PII in free text, validates every finding against a data
//! schema and redacts what survives.
//!
//! Usage:
//! ```bash
//! # With config file
//! bankshield-server --config config/bankshield.example.yaml
//!
//! # Or with environment variables
//! BANKSHIELD_SCHEMA=config/data_schema.json \
//! BANKSHIELD_CLASSIFIER_URL=http://localhost:8081/classify bankshield-server
//!
//! # Check a schema file
//! bankshield-server check-schema --schema config/data_schema.json
//!
//! # One-off detection
//! bankshield-server detect --text "Call me on 9876543210" --anonymize
//! ```
//!
//! Test with:
//! ```bash
//! curl http://localhost:8000/api/validated/detect \
//!   -H "Content-Type: application/json" \
//!   -d '{"text": "My PAN is ABCPD1234E and phone 9876543210"}'
//!
//! curl http://localhost:8000/api/validated/anonymize \
//!   -H "Content-Type: application/json" \
//!   -d '{"text": "My PAN is ABCPD1234E", "replacement": "***"}'
//! ```

use anyhow::Context;
use bankshield_observability::Metrics;
use bankshield_pii::{AnonymizeRequest, DetectionRequest, SchemaStore};
use bankshield_server::app::{AppState, build_context};
use bankshield_server::build_router;
use bankshield_server::config::ServerConfig;
use bankshield_server::routes::ModelResponse;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// BankShield - validated PII detection for banking text
#[derive(Parser)]
#[command(name = "bankshield-server")]
#[command(about = "Schema-validated PII detection and anonymization service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "BANKSHIELD_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// Address to bind
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Path to the data schema (JSON or YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    schema: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no command specified)
    Serve,
    /// Load the schema and report unusable categories and mismatched examples
    CheckSchema,
    /// Run the pipeline once and print the JSON result
    Detect {
        /// Text to scan
        #[arg(short, long)]
        text: String,

        /// Also redact the accepted entities
        #[arg(long)]
        anonymize: bool,

        /// Replacement token used with --anonymize
        #[arg(long, requires = "anonymize")]
        replacement: Option<String>,

        /// Minimum confidence for an entity to be accepted
        #[arg(long)]
        min_confidence: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => ServerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?,
        None => ServerConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags (highest precedence)
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(schema) = cli.schema {
        config.schema_path = schema;
    }

    init_tracing(&config.logging.level)?;

    if let Some(config_path) = &cli.config {
        info!("📁 Loaded configuration from: {}", config_path);
    }

    match cli.command {
        Some(Commands::CheckSchema) => check_schema(&config),
        Some(Commands::Detect {
            text,
            anonymize,
            replacement,
            min_confidence,
        }) => detect_once(&config, text, anonymize, replacement, min_confidence).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!("{}", log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("🚀 Initializing BankShield");

    let metrics = Arc::new(Metrics::new()?);
    let state = AppState::from_config(&config, metrics);
    if state.context().is_none() {
        error!("Detection endpoints will answer 503 until the schema is fixed");
    }

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("");
    info!("✅ BankShield listening on http://{}", addr);
    info!("   API endpoints:");
    info!("   - Detect:      http://{}/api/validated/detect", addr);
    info!("   - Anonymize:   http://{}/api/validated/anonymize", addr);
    info!("   - Data schema: http://{}/api/data_schema", addr);
    info!("   - Health:      http://{}/api/health", addr);
    info!("   Observability:");
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);
    info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn check_schema(config: &ServerConfig) -> anyhow::Result<()> {
    let path = &config.schema_path;
    let schema = SchemaStore::load(path)
        .with_context(|| format!("Failed to load schema {}", path.display()))?;

    println!("Schema: {}", path.display());
    println!(
        "Categories ({}): {}",
        schema.len(),
        schema.categories().collect::<Vec<_>>().join(", ")
    );
    println!("Usable categories ({}):", schema.usable_categories().count());
    for (category, pattern) in schema.usable_categories() {
        let note = if pattern.is_wildcard() {
            "  (accepts any text, excluded from cross-validation)"
        } else {
            ""
        };
        println!(
            "  {:<18} {}  [{} examples]{}",
            category,
            pattern.source(),
            schema.examples_for(category).len(),
            note
        );
    }

    let unusable: Vec<_> = schema.unusable_categories().collect();
    if !unusable.is_empty() {
        println!("Unusable categories ({}):", unusable.len());
        for (category, issue) in unusable {
            println!("  {:<18} {}", category, issue);
        }
    }

    let mismatched = schema.mismatched_examples();
    if mismatched.is_empty() {
        println!("All examples match their category pattern");
    } else {
        println!("Examples not matching their own pattern ({}):", mismatched.len());
        for (category, example) in mismatched {
            println!("  {:<18} {:?}", category, example);
        }
    }

    Ok(())
}

async fn detect_once(
    config: &ServerConfig,
    text: String,
    anonymize: bool,
    replacement: Option<String>,
    min_confidence: Option<f32>,
) -> anyhow::Result<()> {
    let context = build_context(config)
        .with_context(|| format!("Failed to load schema {}", config.schema_path.display()))?;

    let output = if anonymize {
        let request = AnonymizeRequest {
            replacement,
            min_confidence,
            ..AnonymizeRequest::new(text)
        };
        request.validate()?;
        let result = context.anonymize(&request).await;
        serde_json::to_string_pretty(&ModelResponse::new(result))?
    } else {
        let request = DetectionRequest {
            min_confidence,
            ..DetectionRequest::new(text)
        };
        request.validate()?;
        let result = context.detect(&request).await;
        serde_json::to_string_pretty(&ModelResponse::new(result))?
    };

    println!("{}", output);
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
