//! SOS Ingest - harvest and archive tool

use anyhow::{Context, Result};
use clap::Parser;
use sos_common::logging::{init_logging, LogConfig};
use sos_ingest::archive::{
    ArchiveExporter, ArchiveReader, ExportRequest, ExtensionKind, MetadataDocument,
};
use sos_ingest::framework::{BatchCoordinator, ObservationStore, ReferenceData, WriteMode};
use sos_ingest::orchestrator::HarvestOrchestrator;
use sos_ingest::providers::ProviderId;
use sos_ingest::storage::{InMemoryObservationStore, JsonLinesDataDir};
use sos_ingest::taxonomy::TaxonTreeLoader;
use sos_ingest::vocabulary::VocabularyResolver;
use sos_ingest::IngestConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sos-ingest")]
#[command(author, version, about = "Species observation harvest tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Harvest providers from a data directory and export an archive
    Run {
        /// Directory with providers/, taxa.jsonl and areas/
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Provider ids to harvest; every provider file when omitted
        #[arg(short, long, value_delimiter = ',')]
        providers: Vec<ProviderId>,

        /// Records per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Write to the inactive instance and swap when done
        #[arg(long)]
        shadow: bool,

        /// Archive destination
        #[arg(short, long)]
        output: PathBuf,

        /// EML document stored in the archive
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Extensions to export
        #[arg(short, long, value_delimiter = ',')]
        extensions: Vec<ExtensionKind>,
    },

    /// Read an archive back and report its tables
    Verify {
        #[arg(short, long)]
        archive: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables take precedence over the flag
    let verbose = cli.verbose;
    let log_config = LogConfig::from_lookup(|key| {
        std::env::var(key).ok().or_else(|| match key {
            "LOG_LEVEL" if verbose => Some("debug".to_string()),
            "LOG_FILE_PREFIX" => Some("sos-ingest".to_string()),
            _ => None,
        })
    })
    .context("Invalid logging configuration")?;
    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            data_dir,
            providers,
            chunk_size,
            shadow,
            output,
            metadata,
            extensions,
        } => {
            let mut config = IngestConfig::from_env().context("Failed to load configuration")?;
            if let Some(chunk_size) = chunk_size {
                config = config.with_chunk_size(chunk_size);
            }
            if shadow {
                config = config.with_write_mode(WriteMode::Shadow);
            }
            config.validate()?;

            run(config, &data_dir, providers, &output, metadata.as_deref(), extensions).await?;
        }
        Command::Verify { archive } => verify(&archive)?,
    }

    Ok(())
}

async fn run(
    config: IngestConfig,
    data_dir: &Path,
    providers: Vec<ProviderId>,
    output: &Path,
    metadata: Option<&Path>,
    extensions: Vec<ExtensionKind>,
) -> Result<()> {
    let data = Arc::new(JsonLinesDataDir::new(data_dir));
    let providers = if providers.is_empty() {
        data.provider_ids()
            .with_context(|| format!("Failed to list providers in {}", data_dir.display()))?
    } else {
        providers
    };
    info!(providers = providers.len(), data_dir = %data_dir.display(), "Starting harvest");

    let tree = TaxonTreeLoader::load(data.as_ref())
        .await
        .context("Failed to build taxon tree")?;
    info!(taxa = tree.len(), "Loaded taxon tree");

    let reference = Arc::new(ReferenceData::new(
        tree,
        VocabularyResolver::with_static_vocabularies(config.culture.clone()),
    ));
    let store = open_store(&config).await?;
    let coordinator = Arc::new(BatchCoordinator::new(
        data.clone(),
        store.clone(),
        data,
        reference,
        config.batch.clone(),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let report = HarvestOrchestrator::new(coordinator)
        .process(&providers, &cancel)
        .await
        .context("Harvest failed")?;
    for run in &report.runs {
        info!(
            provider_id = %run.provider_id,
            status = %run.status,
            read = run.items_read,
            processed = run.items_processed,
            skipped = run.items_skipped,
            chunks = run.chunks_processed,
            retries = run.chunk_retries,
            error = run.error_message.as_deref().unwrap_or(""),
            "Provider run"
        );
    }
    if cancel.is_cancelled() {
        anyhow::bail!("Harvest canceled, no archive written");
    }
    if !report.all_succeeded() {
        warn!("Some providers did not complete, exporting what the store holds");
    }

    let metadata = match metadata {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read metadata {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "eml.xml".to_string());
            MetadataDocument::new(file_name, content)
        }
        None => MetadataDocument::new("eml.xml", default_eml()),
    };

    let mut request = ExportRequest::new(output, metadata).with_page_size(config.batch.chunk_size);
    for kind in extensions {
        request = request.with_extension(kind);
    }

    let summary = ArchiveExporter::new(store, config.archive)
        .export(request, &cancel)
        .await
        .context("Archive export failed")?;
    info!(
        path = %summary.path.display(),
        instance = %summary.instance,
        core_rows = summary.core_rows,
        sha256 = %summary.sha256,
        "Archive written"
    );
    Ok(())
}

fn verify(path: &Path) -> Result<()> {
    let mut reader = ArchiveReader::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;

    let core = reader.read_core().context("Failed to read core table")?;
    info!(table = %core.location, rows = core.rows.len(), "Core table");
    for table in reader.read_extensions().context("Failed to read extension tables")? {
        info!(table = %table.location, rows = table.rows.len(), "Extension table");
    }
    match reader.metadata()? {
        Some(metadata) => info!(bytes = metadata.len(), "Metadata document"),
        None => warn!("Archive has no metadata document"),
    }
    Ok(())
}

#[cfg(feature = "database")]
async fn open_store(config: &IngestConfig) -> Result<Arc<dyn ObservationStore>> {
    if let Some(url) = &config.database_url {
        let store = sos_ingest::storage::PgObservationStore::connect(url, config.database_max_connections)
            .await
            .context("Failed to connect to observation store")?;
        return Ok(Arc::new(store));
    }
    Ok(Arc::new(InMemoryObservationStore::new()))
}

#[cfg(not(feature = "database"))]
async fn open_store(config: &IngestConfig) -> Result<Arc<dyn ObservationStore>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but the database feature is disabled, using in-memory store");
    }
    Ok(Arc::new(InMemoryObservationStore::new()))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Received Ctrl+C, canceling harvest");
    cancel.cancel();
}

fn default_eml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<eml:eml xmlns:eml=\"eml://ecoinformatics.org/eml-2.1.1\" packageId=\"sos-ingest\" system=\"sos\">\n",
        "  <dataset>\n",
        "    <title>Species observations</title>\n",
        "  </dataset>\n",
        "</eml:eml>\n"
    )
    .to_string()
}
