//! # Repo Harness CLI (`rh`)
//!
//! The `rh` binary ingests a repository and its documentation into a named
//! collection, answers questions over it, and serves it over HTTP or MCP
//! stdio.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rh ingest --repo <url\|path>` | Load, fragment, embed, and store a repository (and docs) |
//! | `rh serve http` | Start the HTTP server (`/ask`, `/tools/*`) |
//! | `rh serve stdio` | Start the MCP server on stdin/stdout |
//! | `rh run --repo <url\|path>` | Ingest, then serve HTTP |
//! | `rh ask "<question>"` | Answer one question from the terminal |
//! | `rh collections` | List collections under the data root |
//! | `rh query "<text>"` | Raw similarity search |
//! | `rh stats` | Fragment counts for a collection |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest a GitHub project and its documentation site
//! rh ingest --repo https://github.com/owner/project --docs-url https://docs.example.com
//!
//! # Ask from the terminal
//! rh ask "Where is the retry policy configured?"
//!
//! # Editor integration
//! rh serve stdio --collection project
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use repo_harness::agent::{answer_within, build_tool_router};
use repo_harness::collections::CollectionRegistry;
use repo_harness::config::{self, Config};
use repo_harness::ingest::{self, IngestRequest};
use repo_harness::mcp::{self, StdioBridge};
use repo_harness::{embedding, llm, logging, progress, server, stats};
use repo_harness_core::agent::ToolRouter;
use repo_harness_core::models::SourceType;

/// Repo Harness CLI: retrieval-augmented answers about a code repository
/// and its documentation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults.
#[derive(Parser)]
#[command(
    name = "rh",
    about = "Repo Harness: ask questions about a code repository and its documentation",
    version,
    long_about = "Repo Harness ingests a repository (local path or git URL) and optionally a \
    documentation site into a named collection of embedded fragments, then answers questions \
    by letting a language model choose between repository and documentation search tools. \
    Served over HTTP or as an MCP server on stdio."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rh.toml`. Every section is optional.
    #[arg(long, global = true, default_value = "./config/rh.toml")]
    config: PathBuf,

    /// Debug-level logs on stderr. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by `ingest` and `run`.
#[derive(clap::Args)]
struct IngestArgs {
    /// Repository to ingest: a local directory or a git URL.
    #[arg(long)]
    repo: String,

    /// Documentation site root; its `/sitemap.xml` drives the crawl.
    #[arg(long)]
    docs_url: Option<String>,

    /// Access token for private repositories. Defaults to `GITHUB_TOKEN`.
    #[arg(long)]
    token: Option<String>,

    /// Target collection. Defaults to `[store].collection`.
    #[arg(long)]
    collection: Option<String>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest a repository and, optionally, its documentation.
    ///
    /// Builds a directory overview plus one document per file, crawls the
    /// documentation sitemap, splits everything into overlapping fragments,
    /// and writes them in batches. Re-ingesting updates fragments in place.
    Ingest(IngestArgs),

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Ingest, then serve HTTP. Does not serve if ingestion fails.
    Run {
        #[command(flatten)]
        ingest: IngestArgs,

        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Answer a question using the configured language model.
    Ask {
        question: String,

        #[arg(long)]
        collection: Option<String>,
    },

    /// List collections under the data root.
    Collections,

    /// Run a raw similarity search and print the ranked fragments.
    Query {
        text: String,

        #[arg(long)]
        collection: Option<String>,

        /// Number of results.
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Restrict to `repo` or `docs` fragments.
        #[arg(long)]
        source_type: Option<SourceType>,
    },

    /// Show fragment counts for a collection.
    Stats {
        #[arg(long)]
        collection: Option<String>,
    },

    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Serve `/ask`, `/health`, and `/tools/*` over HTTP.
    Http {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Serve the search tools as an MCP server on stdin/stdout.
    Stdio {
        #[arg(long)]
        collection: Option<String>,
    },
}

fn open_registry(cfg: &Config) -> Result<Arc<CollectionRegistry>> {
    let embedder = embedding::create_embedder(&cfg.embedding)?;
    Ok(Arc::new(CollectionRegistry::new(
        &cfg.data.root,
        embedder,
        cfg.store.batch_size,
    )))
}

fn tool_router(cfg: &Config, registry: Arc<CollectionRegistry>, collection: &str) -> Result<Arc<ToolRouter>> {
    let model = llm::create_chat_model(&cfg.llm)?;
    Ok(Arc::new(build_tool_router(&cfg.agent, registry, collection, model)))
}

fn collection_or_default(cfg: &Config, collection: Option<String>) -> String {
    collection.unwrap_or_else(|| cfg.store.collection.clone())
}

async fn ingest_command(cfg: &Config, registry: &CollectionRegistry, args: IngestArgs) -> Result<()> {
    let request = IngestRequest {
        repo: args.repo,
        docs_url: args.docs_url,
        token: args.token,
        collection: collection_or_default(cfg, args.collection),
    };
    let reporter = progress::default_reporter();
    let report = ingest::run_ingest(cfg, registry, &request, reporter.as_ref())
        .await
        .with_context(|| format!("Ingestion of {} failed", request.repo))?;
    ingest::print_report(&request, &report);
    Ok(())
}

async fn serve_http(mut cfg: Config, registry: Arc<CollectionRegistry>, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        cfg.server.bind = bind;
    }
    let collection = cfg.store.collection.clone();
    let router = tool_router(&cfg, registry, &collection)?;
    info!(collection = %collection, "serving collection");
    server::run_server(&cfg, router).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Needs no config.
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "rh", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest(args) => {
            let registry = open_registry(&cfg)?;
            ingest_command(&cfg, &registry, args).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Http { bind } => {
                let registry = open_registry(&cfg)?;
                serve_http(cfg, registry, bind).await?;
            }
            ServeService::Stdio { collection } => {
                let registry = open_registry(&cfg)?;
                let collection = collection_or_default(&cfg, collection);
                mcp::serve_stdio(StdioBridge::new(registry, &collection, cfg.stdio.k)).await?;
            }
        },
        Commands::Run { ingest, bind } => {
            let registry = open_registry(&cfg)?;
            let mut cfg = cfg;
            if let Some(collection) = &ingest.collection {
                cfg.store.collection = collection.clone();
            }
            ingest_command(&cfg, &registry, ingest).await?;
            serve_http(cfg, registry, bind).await?;
        }
        Commands::Ask {
            question,
            collection,
        } => {
            let registry = open_registry(&cfg)?;
            let collection = collection_or_default(&cfg, collection);
            let router = tool_router(&cfg, registry, &collection)?;
            let deadline = Duration::from_secs(cfg.agent.timeout_secs);
            let answer = answer_within(&router, &question, deadline).await?;
            println!("{}", answer);
        }
        Commands::Collections => {
            stats::run_collections(&cfg)?;
        }
        Commands::Query {
            text,
            collection,
            k,
            source_type,
        } => {
            let registry = open_registry(&cfg)?;
            let collection = collection_or_default(&cfg, collection);
            stats::run_query(&registry, &collection, &text, k, source_type).await?;
        }
        Commands::Stats { collection } => {
            let registry = open_registry(&cfg)?;
            let collection = collection_or_default(&cfg, collection);
            stats::run_stats(&registry, &collection).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
