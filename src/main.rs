use paperrag::cli::{Cli, Commands, ConfigAction};
use paperrag::config::{Config, ConfigValidator};
use paperrag::error::{PaperRagError, Result};
use paperrag::pipeline::{cancel_on_signal, DownloadReport, IngestSummary, Pipeline};
use paperrag::retrieval::Answer;
use paperrag::Cancellation;
use serde::Serialize;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Download {
            query,
            max_results,
            json,
        } => cmd_download(cli.config, &query, max_results, json).await,
        Commands::Ingest { json } => cmd_ingest(cli.config, json).await,
        Commands::Ask {
            question,
            top_k,
            json,
        } => cmd_ask(cli.config, &question, top_k, json).await,
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "paperrag=debug" } else { "paperrag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_download(
    config_path: Option<PathBuf>,
    query: &str,
    max_results: usize,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;
    let cancel = Cancellation::new();
    let _signals = cancel_on_signal(cancel.clone())?;

    let report = pipeline.download(query, max_results, &cancel).await?;
    if json {
        return print_json(&report);
    }
    print_download(&report, pipeline.data_path());
    Ok(())
}

async fn cmd_ingest(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;
    let cancel = Cancellation::new();
    let _signals = cancel_on_signal(cancel.clone())?;

    let summary = pipeline.ingest(&cancel).await?;
    if json {
        return print_json(&summary);
    }
    print_ingest(&summary, &config.vector_store.collection_name);
    Ok(())
}

async fn cmd_ask(
    config_path: Option<PathBuf>,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;

    match pipeline.ask(question, top_k).await {
        Ok(answer) if json => print_json(&answer),
        Ok(answer) => {
            print_answer(&answer);
            Ok(())
        }
        Err(PaperRagError::GenerationUnavailable { reason, retrieved }) => {
            eprintln!("Answer generation failed: {}", reason);
            eprintln!("Most relevant passages:");
            for (i, chunk) in retrieved.iter().enumerate() {
                eprintln!(
                    "\n[{}] {} #{} (score {:.3})\n{}",
                    i + 1,
                    chunk.source_identifier,
                    chunk.chunk_index,
                    chunk.score,
                    chunk.text.trim()
                );
            }
            Err(PaperRagError::GenerationUnavailable { reason, retrieved })
        }
        Err(PaperRagError::EmptyCollection(name)) => {
            eprintln!(
                "Collection '{}' is empty. Run 'paperrag download' and 'paperrag ingest' first.",
                name
            );
            Err(PaperRagError::EmptyCollection(name))
        }
        Err(e) => Err(e),
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PaperRagError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'paperrag config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PaperRagError::Json {
        source: e,
        context: "Failed to serialize report".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn print_download(report: &DownloadReport, data_path: &std::path::Path) {
    let fetch = &report.fetch;
    println!(
        "Located {} papers: {} downloaded, {} already present, {} failed",
        report.located,
        fetch.downloaded,
        fetch.reused,
        fetch.failed.len()
    );
    for record in &fetch.records {
        println!("  {}  {}", record.identifier, record.title);
    }
    for failure in &fetch.failed {
        println!("  ✗ {}: {}", failure.identifier, failure.reason);
    }
    if fetch.cancelled {
        println!("Interrupted: {} papers not attempted", fetch.skipped);
    }
    println!("PDFs stored in {}", data_path.display());
}

fn print_ingest(summary: &IngestSummary, collection: &str) {
    let index = &summary.index;
    println!(
        "Loaded {} documents ({} without text, {} unreadable) into {} chunks",
        summary.documents,
        summary.empty_documents,
        summary.unreadable.len(),
        summary.chunks
    );
    println!(
        "Indexed into '{}': {} succeeded, {} failed ({}ms)",
        collection, index.succeeded, index.failed, index.duration_ms
    );
    for failure in &summary.unreadable {
        println!("  ✗ {}: {}", failure.path.display(), failure.error);
    }
    for failure in &index.failures {
        println!(
            "  ✗ {}#{}: {}",
            failure.key.source_identifier, failure.key.chunk_index, failure.reason
        );
    }
    if index.cancelled {
        println!("Interrupted: {} chunks not attempted", index.skipped);
    }
}

fn print_answer(answer: &Answer) {
    println!("{}\n", answer.text.trim());
    println!("Sources:");
    for chunk in &answer.cited_chunks {
        println!(
            "  {} #{} (score {:.3})",
            chunk.source_identifier, chunk.chunk_index, chunk.score
        );
    }
}
