//! PIIGuard - PII Discovery and DSR Execution Engine
//!
//! Discovers personal data across registered data sources and executes
//! data subject requests against them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use piiguard::{
    audit::AuditLog,
    config::PiiGuardConfig,
    connector::ConnectorRegistry,
    detect::{CompositeDetector, FieldNameStrategy, PatternStrategy},
    dsr::DsrExecutor,
    events::{EventPublisher, TracingSink},
    model::{DataSource, DeletionMode, DsrType, SourceKind, SourceSettings},
    queue::InMemoryQueue,
    scan::ScanOrchestrator,
    store::{CatalogStore, DsrStore, ScanStore, SourceStore},
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "piiguard")]
#[command(version)]
#[command(about = "PII discovery and DSR execution engine")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PIIGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scan queue workers until interrupted
    Worker,

    /// Register a data source
    AddSource {
        /// Owning tenant
        #[arg(long)]
        tenant: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Source kind (postgres, http_api, file_upload)
        #[arg(long)]
        kind: SourceKind,

        /// Database host
        #[arg(long)]
        host: Option<String>,

        /// Database port
        #[arg(long)]
        port: Option<u16>,

        /// Database name
        #[arg(long)]
        database: Option<String>,

        /// Database user
        #[arg(long)]
        username: Option<String>,

        /// Env var holding the database password
        #[arg(long)]
        password_ref: Option<String>,

        /// Base URL for API sources
        #[arg(long)]
        base_url: Option<String>,

        /// Env var holding the API bearer token
        #[arg(long)]
        token_ref: Option<String>,

        /// Path to an uploaded file
        #[arg(long)]
        path: Option<PathBuf>,

        /// Require manual confirmation for deletions on this source
        #[arg(long)]
        manual_deletion: bool,
    },

    /// Scan a data source now
    Scan {
        /// Source id to scan
        source_id: String,

        /// Force a full rescan even when a completed scan exists
        #[arg(long)]
        full: bool,
    },

    /// Create a data subject request
    CreateDsr {
        /// Owning tenant
        #[arg(long)]
        tenant: String,

        /// Request type (access, erasure, correction, portability, nomination, appeal)
        #[arg(long = "type")]
        dsr_type: DsrType,

        /// Subject identifiers as key=value pairs (repeatable)
        #[arg(short, long = "subject")]
        subject: Vec<String>,
    },

    /// Approve a pending DSR, creating its per-source tasks
    ApproveDsr {
        dsr_id: String,

        /// Acting reviewer
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Execute an approved DSR across all its tasks
    ExecuteDsr { dsr_id: String },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

/// Fully wired engine over one data directory
struct Engine {
    sources: Arc<SourceStore>,
    scans: Arc<ScanStore>,
    dsrs: Arc<DsrStore>,
    orchestrator: Arc<ScanOrchestrator>,
    executor: DsrExecutor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("piiguard={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        PiiGuardConfig::default()
    };

    match cli.command {
        Commands::Worker => {
            let engine = build_engine(&config).await?;
            engine.orchestrator.start_workers().await?;
            tracing::info!("PIIGuard workers running. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down...");
        }
        Commands::AddSource {
            tenant,
            name,
            kind,
            host,
            port,
            database,
            username,
            password_ref,
            base_url,
            token_ref,
            path,
            manual_deletion,
        } => {
            let engine = build_engine(&config).await?;
            let mut source = DataSource::new(
                &tenant,
                &name,
                kind,
                SourceSettings {
                    host,
                    port,
                    database,
                    username,
                    password_ref,
                    base_url,
                    token_ref,
                    path,
                },
            );
            if manual_deletion {
                source.deletion_mode = DeletionMode::Manual;
            }
            let source = engine.sources.create(source).await;
            flush().await;
            println!("Registered {} source {} ({})", source.kind, source.name, source.id);
        }
        Commands::Scan { source_id, full } => {
            let engine = build_engine(&config).await?;
            let run = engine.orchestrator.enqueue_scan(&source_id, full).await?;
            engine.orchestrator.run_scan(&run.id).await?;

            let run = engine
                .scans
                .get(&run.id)
                .await
                .ok_or_else(|| anyhow::anyhow!("scan run {} disappeared", run.id))?;
            flush().await;
            match run.stats {
                Some(stats) => println!(
                    "Scan {} {}: {} entities, {} fields, {} PII fields in {} ms",
                    run.id,
                    run.status,
                    stats.entities_scanned,
                    stats.fields_scanned,
                    stats.pii_fields_found,
                    stats.duration_ms
                ),
                None => println!(
                    "Scan {} {}: {}",
                    run.id,
                    run.status,
                    run.error.as_deref().unwrap_or("no details")
                ),
            }
        }
        Commands::CreateDsr {
            tenant,
            dsr_type,
            subject,
        } => {
            let engine = build_engine(&config).await?;
            let subject = parse_subject(&subject)?;
            let dsr = engine.executor.create_dsr(&tenant, dsr_type, subject).await;
            flush().await;
            println!("Created {} DSR {}", dsr.dsr_type, dsr.id);
        }
        Commands::ApproveDsr { dsr_id, actor } => {
            let engine = build_engine(&config).await?;
            let dsr = engine.executor.approve(&dsr_id, &actor).await?;
            let tasks = engine.dsrs.tasks_for_dsr(&dsr.id).await;
            flush().await;
            println!("DSR {} approved, {} tasks created", dsr.id, tasks.len());
        }
        Commands::ExecuteDsr { dsr_id } => {
            let engine = build_engine(&config).await?;
            let dsr = engine.executor.execute(&dsr_id).await?;
            flush().await;
            match dsr.reason {
                Some(reason) => println!("DSR {} finished as {}: {}", dsr.id, dsr.status, reason),
                None => println!("DSR {} finished as {}", dsr.id, dsr.status),
            }
        }
        Commands::Config { default } => {
            let shown = if default {
                PiiGuardConfig::default()
            } else {
                config
            };
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

async fn build_engine(config: &PiiGuardConfig) -> Result<Engine> {
    let base = config.storage.base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let sources = Arc::new(SourceStore::new(base.clone()).await?);
    let scans = Arc::new(ScanStore::new(base.clone()).await?);
    let catalog = Arc::new(CatalogStore::new(base.clone()).await?);
    let dsrs = Arc::new(DsrStore::new(base.clone()).await?);

    let registry = Arc::new(ConnectorRegistry::with_defaults(Duration::from_secs(
        config.connectors.call_timeout_secs,
    )));
    let detector = Arc::new(CompositeDetector::new(
        vec![
            Arc::new(PatternStrategy::new(config.detection.effective_rules())?),
            Arc::new(FieldNameStrategy::new()),
        ],
        config.detection.clone(),
    ));
    let events = EventPublisher::new(Arc::new(TracingSink));
    let audit = AuditLog::new(base);

    let orchestrator = Arc::new(ScanOrchestrator::new(
        sources.clone(),
        scans.clone(),
        catalog.clone(),
        registry.clone(),
        Arc::new(InMemoryQueue::new()),
        detector,
        events.clone(),
        audit.clone(),
        config.scan.clone(),
    ));
    let executor = DsrExecutor::new(
        dsrs.clone(),
        sources.clone(),
        catalog,
        registry,
        events,
        audit,
        config.dsr.clone(),
    );

    Ok(Engine {
        sources,
        scans,
        dsrs,
        orchestrator,
        executor,
    })
}

/// Parse repeated key=value subject flags
fn parse_subject(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut subject = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("subject must be key=value, got '{}'", pair))?;
        subject.insert(key.to_string(), value.to_string());
    }
    if subject.is_empty() {
        anyhow::bail!("at least one subject identifier is required");
    }
    Ok(subject)
}

/// Give fire-and-forget persistence writes a moment to land before exit
async fn flush() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
