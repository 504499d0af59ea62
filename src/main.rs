mod cli;
mod config;
mod logging;
mod manager;
mod pipeline;
mod store;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{DocpipeConfig, PipelineConfig};
use manager::ManagerClient;
use pipeline::{Pipeline, PipelineError, PipelineSettings};
use std::path::PathBuf;
use store::DocumentStore;

#[derive(Parser)]
#[command(name = "docpipe")]
#[command(about = "Client for a distributed document-processing pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory for config discovery (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage files in the document store and run them through the pipeline
    Run {
        /// Files to submit
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate the configured pipeline and print its shape
    Validate,

    /// Check that both manager endpoints are reachable
    Doctor,

    /// Print a host resource snapshot (and optionally one process) as JSON
    Metrics {
        /// Process id to sample in addition to the host
        #[arg(long)]
        pid: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug, cli.quiet)?;

    let config = DocpipeConfig::load(cli.dir.as_deref())?;

    match cli.command {
        Commands::Run { files } => {
            run_pipeline(&config, &files).await?;
        }

        Commands::Validate => {
            let pipeline_config = configured_pipeline(&config);
            match pipeline_config.build() {
                Ok(template) => {
                    println!("✓ Pipeline is valid ({} stages)", template.stage_count());
                    print!("{}", template);
                }
                Err(e) => {
                    eprintln!("✗ Pipeline validation failed:\n{}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Doctor => {
            let mut healthy = true;
            for (label, addr) in [
                ("api", config.manager.api_addr()),
                ("broadcast", config.manager.broadcast_addr()),
            ] {
                match tokio::net::TcpStream::connect(&addr).await {
                    Ok(_) => println!("✓ {} endpoint reachable at {}", label, addr),
                    Err(e) => {
                        println!("✗ {} endpoint unreachable at {}: {}", label, addr, e);
                        healthy = false;
                    }
                }
            }
            if !healthy {
                std::process::exit(1);
            }
        }

        Commands::Metrics { pid } => {
            let host = telemetry::host_snapshot()?;
            println!("{}", serde_json::to_string_pretty(&host)?);

            if let Some(pid) = pid {
                match telemetry::process_snapshot(pid)? {
                    Some(process) => println!("{}", serde_json::to_string_pretty(&process)?),
                    None => {
                        eprintln!("no such process: {}", pid);
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

fn configured_pipeline(config: &DocpipeConfig) -> PipelineConfig {
    config
        .pipeline
        .clone()
        .unwrap_or_else(PipelineConfig::default_pipeline)
}

/// Stage input files, connect to the manager and drive the run
async fn run_pipeline(config: &DocpipeConfig, files: &[PathBuf]) -> Result<()> {
    let template = configured_pipeline(config).build()?;

    let store = DocumentStore::open(&config.store.database_path()?)?;
    let documents = stage_files(&store, files)?;
    tracing::info!(count = documents.len(), "documents staged");

    let client = ManagerClient::connect(
        &config.manager.api_addr(),
        &config.manager.broadcast_addr(),
    )
    .await
    .map_err(PipelineError::Connection)?;

    let token = cli::CancellationToken::new();
    tokio::spawn(cli::setup_signal_handlers(token.clone()));

    let mut pipeline = Pipeline::new(client, template)
        .with_settings(PipelineSettings {
            poll_interval: config.manager.poll_interval(),
        })
        .with_cancellation(token);

    let summary = pipeline.run(&documents).await?;

    if summary.interrupted {
        tracing::warn!(
            abandoned = summary.abandoned,
            "run interrupted, outstanding jobs abandoned"
        );
    } else {
        tracing::info!(
            submitted = summary.submitted,
            completed = summary.completed,
            "run complete"
        );
    }

    Ok(())
}

/// Put each input file into the document store, returning the references to
/// submit
fn stage_files(store: &DocumentStore, files: &[PathBuf]) -> Result<Vec<String>> {
    let mut documents = Vec::with_capacity(files.len());

    for file in files {
        let content = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let id = store.put(&content, &name)?;
        tracing::debug!(file = %file.display(), document = %id, "stored document");
        documents.push(id);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"document body").unwrap();

        let store = DocumentStore::open(&dir.path().join("documents.db")).unwrap();
        let documents = stage_files(&store, &[file]).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(
            store.get(&documents[0]).unwrap(),
            Some(b"document body".to_vec())
        );
        assert_eq!(store.name_of(&documents[0]).unwrap(), Some("a.txt".to_string()));
    }

    #[test]
    fn test_stage_files_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open(&dir.path().join("documents.db")).unwrap();

        let result = stage_files(&store, &[PathBuf::from("/nonexistent/input.txt")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_configured_pipeline_falls_back_to_default() {
        let config = DocpipeConfig::default();
        let template = configured_pipeline(&config).build().unwrap();
        assert_eq!(template.name(), "extractor");
    }
}
