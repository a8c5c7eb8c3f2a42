//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_ml::config::DEFAULT_CONFIG_FILE;
use vigil_ml::data::{FileDocumentStore, SchemaDefinition};
use vigil_ml::pipeline::{DataValidation, TrainingPipeline, push_csv};
use vigil_ml::{
    ArtifactLayout, CancellationToken, DataIngestionArtifact, PipelineConfig, PipelineError, load_config,
};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config_path: Option<&Path>,
    started: DateTime<Local>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run => {
            let config = load(config_path)?;
            let timeout_secs = config.pipeline.timeout_secs;
            let outcome = run_blocking(timeout_secs, move |cancel| {
                let store = FileDocumentStore::open(&config.ingestion.store_uri)?;
                let layout = ArtifactLayout::new(&config.pipeline.artifact_root, started);
                TrainingPipeline::new(config, layout, &store)
                    .with_cancellation(cancel)
                    .run()
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Validate {
            train,
            test,
            schema,
            out,
        } => handle_validate(load(config_path)?, started, train, test, schema, out).await,
        Commands::Push {
            csv,
            database,
            collection,
        } => {
            let config = load(config_path)?;
            let database = database.unwrap_or(config.ingestion.database);
            let collection = collection.unwrap_or(config.ingestion.collection);
            let store_uri = config.ingestion.store_uri;
            let inserted = run_blocking(config.pipeline.timeout_secs, move |_| {
                let store = FileDocumentStore::open(&store_uri)?;
                push_csv(&store, &csv, &database, &collection)
            })
            .await?;
            println!("Inserted {inserted} records");
            Ok(())
        }
        Commands::Config { action } => handle_config(action, config_path),
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    load_config(config_path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

async fn handle_validate(
    config: PipelineConfig,
    started: DateTime<Local>,
    train: PathBuf,
    test: PathBuf,
    schema: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let schema_path = schema.unwrap_or_else(|| config.pipeline.schema_path.clone());
    let root = out.unwrap_or_else(|| config.pipeline.artifact_root.clone());
    let timeout_secs = config.pipeline.timeout_secs;

    let artifact = run_blocking(timeout_secs, move |cancel| {
        let schema = SchemaDefinition::load(&schema_path)?;
        let layout = ArtifactLayout::new(&root, started);
        DataValidation::new(config.validation, schema, layout.validation())
            .with_cancellation(cancel)
            .run(&DataIngestionArtifact::from_files(train, test))
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&artifact)?);
    if artifact.is_rejected() {
        anyhow::bail!("dataset rejected: schema check failed");
    }
    if !artifact.validation_status {
        tracing::warn!(
            report = %artifact.drift_report_file_path.display(),
            "Drift detected; see report"
        );
    }
    Ok(())
}

fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load(config_path)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Init => {
            let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            std::fs::write(path, toml::to_string_pretty(&PipelineConfig::default())?)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
    }
}

/// Run a synchronous pipeline job on the blocking pool, with an optional deadline.
///
/// A `timeout_secs` of zero waits indefinitely. On expiry the token handed
/// to `job` is cancelled, so it stops before its next write, and
/// `PipelineError::Timeout` is returned without waiting for it.
pub async fn run_blocking<T, F>(timeout_secs: u64, job: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> vigil_ml::Result<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let handle = tokio::task::spawn_blocking({
        let token = token.clone();
        move || job(token)
    });
    let joined = if timeout_secs == 0 {
        handle.await
    } else {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await {
            Ok(joined) => joined,
            Err(_) => {
                token.cancel();
                return Err(PipelineError::timeout(format!(
                    "run did not finish within {timeout_secs}s"
                ))
                .into());
            }
        }
    };
    Ok(joined??)
}
