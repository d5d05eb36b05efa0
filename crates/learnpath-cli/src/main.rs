//! Learnpath CLI
//!
//! - `run`: build a learning path for one session from a directory-backed store
//! - `validate`: re-check stored learning-path documents
//! - `inspect`: show the status of a job

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use learnpath_dag::{build_edges, validate};
use learnpath_llm::{CompressionConfig, TokenCompanyClient, UnifiedOracle};
use learnpath_pipeline::{LearningPathDocument, LearningPathPipeline, PipelineConfig, ProgressEvent};
use learnpath_storage::{FsStore, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use walkdir::WalkDir;

const DOCUMENT_FILE_NAME: &str = "learning_path.json";

#[derive(Parser)]
#[command(name = "learnpath")]
#[command(author, version, about = "Learnpath: knowledge decomposition into learning paths")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a session's materials and store its learning path.
    ///
    /// The oracle is configured from GEMINI_API_KEY or OPENROUTER_API_KEY;
    /// compression from TOKEN_COMPANY_API_KEY when set.
    Run(RunArgs),

    /// Re-validate stored learning-path documents (a file or a directory tree).
    Validate {
        path: PathBuf,
        /// Fail when any document has validation warnings.
        #[arg(long)]
        strict: bool,
    },

    /// Show the status of a job.
    Inspect {
        /// Store root directory.
        #[arg(long)]
        store: PathBuf,
        job_id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Store root directory (materials, documents, tables, jobs).
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    user: String,
    #[arg(long)]
    session: String,
    /// Job id for status tracking; generated when omitted.
    #[arg(long)]
    job: Option<String>,
    /// Pipeline config JSON; falls back to LEARNPATH_* environment variables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Never call the compression service.
    #[arg(long)]
    no_compression: bool,
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnpath=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Validate { path, strict } => cmd_validate(&path, strict),
        Commands::Inspect {
            store,
            job_id,
            json,
        } => cmd_inspect(&store, &job_id, json).await,
    }
}

// ============================================================================
// run
// ============================================================================

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = PipelineConfig::load(args.config.as_deref()).context("loading pipeline config")?;
    let oracle = UnifiedOracle::from_env().context("configuring oracle")?;
    let store = Arc::new(FsStore::new(&args.store));
    let job_id = args
        .job
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!(
        "{} session {} for user {} (job {})",
        "Building".green().bold(),
        args.session.bold(),
        args.user,
        job_id
    );

    let mut pipeline = LearningPathPipeline::new(
        config,
        store.clone(),
        Arc::new(oracle),
        store.clone(),
        store.clone(),
    );
    if !args.no_compression {
        match CompressionConfig::from_env() {
            Ok(compression) => {
                let client = TokenCompanyClient::new(compression).context("configuring compression")?;
                pipeline = pipeline.with_compressor(Arc::new(client));
            }
            Err(e) => tracing::info!(reason = %e, "compression disabled"),
        }
    }
    pipeline.on_progress(Box::new(print_progress));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} cancelling after the current step", "interrupt:".yellow().bold());
            on_interrupt.cancel();
        }
    });

    let result = pipeline
        .create_learning_path_with_cancellation(&args.user, &args.session, &job_id, &cancel)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.success {
        println!("{}", "Learning path stored.".green());
        println!(
            "  {} {}",
            "→".yellow(),
            result.storage_path.as_deref().unwrap_or_default()
        );
        println!(
            "  {} {} nodes, max depth {}",
            "→".yellow(),
            result.total_nodes,
            result.max_depth
        );
        for (relationship, count) in &result.relationship_distribution {
            println!("    {relationship}: {count}");
        }
    }

    match result.error {
        Some(error) if !result.success => bail!("learning path failed: {error}"),
        _ => Ok(()),
    }
}

fn print_progress(event: ProgressEvent) {
    match event.progress {
        Some(p) if event.status == JobStatus::BatchProcessing => eprintln!(
            "  {} {} {}/{}",
            "→".yellow(),
            event.status,
            p.batches_processed,
            p.total_batches
        ),
        _ => eprintln!("  {} {}", "→".yellow(), event.status),
    }
}

// ============================================================================
// validate
// ============================================================================

fn document_paths(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == DOCUMENT_FILE_NAME {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn cmd_validate(path: &Path, strict: bool) -> Result<()> {
    let paths = document_paths(path)?;
    if paths.is_empty() {
        bail!("no {DOCUMENT_FILE_NAME} found under {}", path.display());
    }

    let mut flagged = 0;
    for file in &paths {
        println!("{} {}", "Validating".green().bold(), file.display());
        let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let document = LearningPathDocument::from_json_bytes(&bytes)
            .with_context(|| format!("parsing {}", file.display()))?;

        let report = validate(&document.nodes);
        let mut problems = report.warnings.clone();
        if build_edges(&document.nodes) != document.edges {
            problems.push("Stored edges do not match node prerequisites".to_string());
        }
        if document.metadata.total_nodes != document.nodes.len() {
            problems.push(format!(
                "Metadata reports {} nodes but the document has {}",
                document.metadata.total_nodes,
                document.nodes.len()
            ));
        }

        println!(
            "  {} {} nodes, {} edges",
            "→".yellow(),
            document.nodes.len(),
            document.edges.len()
        );
        if problems.is_empty() {
            println!("{}", "Valid.".green());
        } else {
            flagged += 1;
            for problem in &problems {
                println!("  {} {}", "warning:".yellow().bold(), problem);
            }
        }
    }

    if strict && flagged > 0 {
        return Err(anyhow!("{flagged} of {} documents have warnings", paths.len()));
    }
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

async fn cmd_inspect(store: &Path, job_id: &str, json: bool) -> Result<()> {
    let store = FsStore::new(store);
    let job = store
        .job(job_id)
        .await?
        .ok_or_else(|| anyhow!("job {job_id} not found under {}", store.root().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    let status = match job.status {
        JobStatus::Completed => job.status.to_string().green().bold(),
        JobStatus::Failed => job.status.to_string().red().bold(),
        _ => job.status.to_string().yellow().bold(),
    };
    println!("{} {}", "job".bold(), job.job_id);
    println!("  status: {status}");
    if let Some(progress) = job.progress {
        println!(
            "  batches: {}/{}",
            progress.batches_processed, progress.total_batches
        );
    }
    if let Some(error) = &job.error_message {
        println!("  error: {}", error.red());
    }
    if let Some(completed_at) = job.completed_at {
        println!("  completed: {}", completed_at.to_rfc3339());
    }
    println!("  updated: {}", job.updated_at.to_rfc3339());
    Ok(())
}
