//! # notiq CLI
//!
//! The `notiq` binary drives the vault pipeline: database initialization,
//! metadata indexing, search, question answering, and batch frontmatter
//! enrichment.
//!
//! ## Usage
//!
//! ```bash
//! notiq --config ./config/notiq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notiq init` | Create the SQLite database and run schema migrations |
//! | `notiq index` | Scan the vault and upsert note metadata |
//! | `notiq search "<query>"` | Print ranked matches without answer synthesis |
//! | `notiq ask [question]` | Answer one question, or start an interactive loop |
//! | `notiq enrich` | Generate frontmatter for notes that lack it |

use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use notiq::config::{self, Config};
use notiq::enrich::{self, EnrichOptions};
use notiq::index;
use notiq::llm;
use notiq::migrate;
use notiq::models::SearchResult;
use notiq::retrieve::RetrievalOrchestrator;
use notiq::store::MetadataStore;
use notiq::vault;
use notiq::db;

/// notiq — metadata-first search and enrichment for a markdown note vault.
#[derive(Parser)]
#[command(
    name = "notiq",
    about = "Search and enrich a markdown note vault with model-assisted retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/notiq.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (files, tags, file_tags). Idempotent: running it multiple
    /// times is safe.
    Init,

    /// Scan the vault and index note metadata.
    ///
    /// Extracts frontmatter tags, dates, and content previews from every
    /// eligible note and upserts them into the metadata store. Re-running
    /// replaces existing rows rather than duplicating them.
    Index,

    /// Search indexed notes.
    ///
    /// Interprets the query into exact-match criteria and prints the
    /// ranked matches with match type and date. No answer synthesis.
    Search {
        /// The search query string.
        query: String,
    },

    /// Ask a question against the vault.
    ///
    /// With a question argument: one-shot search plus a synthesized
    /// answer. Without: an interactive loop; `quit`, `exit`, or `q`
    /// leaves, `stats` prints the indexed-file count.
    Ask {
        /// The question to answer. Omit for interactive mode.
        question: Option<String>,
    },

    /// Generate frontmatter for notes that lack it.
    ///
    /// Runs the model over each note body and writes a YAML header with
    /// title, description, tags, and a created date. Notes with an
    /// existing header are skipped unless forced.
    Enrich {
        /// Overwrite existing frontmatter instead of skipping it.
        #[arg(long)]
        force_update: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        max_files: Option<usize>,

        /// Worker pool width for parallel processing.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Process files one at a time instead of in parallel.
        #[arg(long)]
        sequential: bool,
    },
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug,sqlx=info,reqwest=info,hyper=info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,reqwest=warn,hyper=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index => {
            let store = open_store(&cfg).await?;
            let summary = index::index_vault(&cfg, &store).await?;
            println!(
                "Indexed {} files ({} failed).",
                summary.indexed, summary.failed
            );
        }
        Commands::Search { query } => {
            let orchestrator = open_orchestrator(&cfg).await?;
            let outcome = orchestrator.search(&query).await?;
            print_results(&outcome.results);
        }
        Commands::Ask { question } => {
            let store = open_store(&cfg).await?;
            let backend = llm::create_backend(&cfg.llm)?;
            let orchestrator =
                RetrievalOrchestrator::new(store.clone(), backend, &cfg.search);

            match question {
                Some(question) => {
                    let outcome = orchestrator.search(&question).await?;
                    let answer = orchestrator.synthesize(&question, &outcome.results).await;
                    println!("{}", answer);
                }
                None => interactive_loop(&store, &orchestrator).await?,
            }
        }
        Commands::Enrich {
            force_update,
            max_files,
            max_workers,
            sequential,
        } => {
            run_enrich(&cfg, force_update, max_files, max_workers, sequential).await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<MetadataStore> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    Ok(MetadataStore::new(pool))
}

async fn open_orchestrator(cfg: &Config) -> anyhow::Result<RetrievalOrchestrator> {
    let store = open_store(cfg).await?;
    let backend = llm::create_backend(&cfg.llm)?;
    Ok(RetrievalOrchestrator::new(store, backend, &cfg.search))
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matches.");
        return;
    }

    println!("{} matches:", results.len());
    for (i, result) in results.iter().enumerate() {
        let date = result.extracted_date.as_deref().unwrap_or("-");
        println!(
            "{:>3}. [{}] {} ({})",
            i + 1,
            result.match_type,
            result.filename,
            date
        );
        let excerpt: String = result.content_preview.chars().take(120).collect();
        if !excerpt.is_empty() {
            println!("     {}", excerpt.replace('\n', " "));
        }
    }
}

async fn interactive_loop(
    store: &MetadataStore,
    orchestrator: &RetrievalOrchestrator,
) -> anyhow::Result<()> {
    println!("notiq interactive mode");
    println!("Type 'quit' to exit, 'stats' for statistics");
    println!("{}", "-".repeat(40));

    let stdin = std::io::stdin();
    loop {
        print!("\nQuestion: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();

        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        if query.eq_ignore_ascii_case("stats") {
            println!("\n{} documents indexed", store.file_count().await);
            continue;
        }

        match orchestrator.search(query).await {
            Ok(outcome) => {
                let answer = orchestrator.synthesize(query, &outcome.results).await;
                println!("\n{}", answer);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(())
}

async fn run_enrich(
    cfg: &Config,
    force_update: bool,
    max_files: Option<usize>,
    max_workers: Option<usize>,
    sequential: bool,
) -> anyhow::Result<()> {
    let backend = llm::create_backend(&cfg.llm)?;
    let paths = vault::list_note_paths(cfg)?;

    println!("Processing documents in: {}", cfg.vault.root.display());
    if let Some(max) = max_files {
        println!("Limited to {} files", max);
    }
    if force_update {
        println!("Force update enabled - existing frontmatter will be overwritten");
    }

    let options = EnrichOptions {
        force_update,
        max_files,
        max_workers: max_workers.unwrap_or(cfg.enrich.max_workers),
        sequential,
    };

    let start = Instant::now();
    let stats = enrich::enrich_many(backend, paths, &options).await;
    let duration = start.elapsed().as_secs_f64();

    println!("{}", "=".repeat(50));
    println!("Enrichment complete");
    println!("Success: {}", stats.success());
    println!("Failed: {}", stats.failed());
    println!("Skipped: {}", stats.skipped());
    println!("Total: {}", stats.total());
    println!("Duration: {:.2} seconds", duration);
    if stats.total() > 0 {
        println!(
            "Average: {:.2} seconds per file",
            duration / stats.total() as f64
        );
    }

    Ok(())
}
