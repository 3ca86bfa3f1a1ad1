//! # kb-gateway CLI (`kbg`)
//!
//! Runs the gateway, talks to it, and drives the managed knowledge base
//! directly for one-off operations.
//!
//! ## Usage
//!
//! ```bash
//! kbg --config ./config/kbg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbg serve` | Start the gateway HTTP server |
//! | `kbg ask "<question>"` | Ask one question directly |
//! | `kbg urls show` | Show seed URLs and filters |
//! | `kbg urls set --url <u> ...` | Replace seed URLs and filters |
//! | `kbg ingest` | Start an ingestion job |
//! | `kbg models` | List on-demand models (`--catalog` for the built-in list) |
//! | `kbg datasource create` | Provision the web data source |
//! | `kbg datasource delete <id>` | Delete a data source |
//! | `kbg chat` | Terminal chat client for a running gateway |
//!
//! Logs go to stderr; filter them with `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kb_gateway::bedrock::BedrockClient;
use kb_gateway::chat;
use kb_gateway::client::GatewayClient;
use kb_gateway::config;
use kb_gateway::ingest::{self, IngestTrigger};
use kb_gateway::query::{self, QueryRequest};
use kb_gateway::server;
use kb_gateway::sources;
use kb_gateway_core::backend::KnowledgeBase;
use kb_gateway_core::catalog::MODEL_CATALOG;
use kb_gateway_core::datasource::UrlUpdate;
use tracing_subscriber::EnvFilter;

/// kb-gateway: question answering over a managed knowledge base.
///
/// Configuration comes from an optional TOML file (`--config`) and
/// environment variables such as `KNOWLEDGE_BASE_ID` and `AWS_REGION`.
/// See `config/kbg.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "kbg", version, about = "HTTP gateway and chat client for a managed knowledge base")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server.
    ///
    /// Also runs scheduled ingestion when `ingest.schedule_secs > 0`.
    Serve,

    /// Ask a single question and print the answer.
    Ask {
        question: String,

        /// Continue an earlier conversation.
        #[arg(long)]
        session: Option<String>,

        /// Model id (defaults to `query.default_model`).
        #[arg(long)]
        model: Option<String>,
    },

    /// Inspect or replace the web data source's URLs and filters.
    Urls {
        #[command(subcommand)]
        action: UrlsAction,
    },

    /// Start an ingestion job now.
    ///
    /// Re-crawls the web data source, or with `--object-created` re-syncs
    /// the document-bucket data source.
    Ingest {
        #[arg(long)]
        object_created: bool,
    },

    /// List foundation models.
    Models {
        /// Print the built-in catalog instead of querying the service.
        #[arg(long)]
        catalog: bool,
    },

    /// Provision or remove data sources.
    Datasource {
        #[command(subcommand)]
        action: DatasourceAction,
    },

    /// Chat with a running gateway.
    Chat {
        #[arg(long, default_value = "http://127.0.0.1:8787")]
        base_url: String,

        /// Per-request timeout in seconds.
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
enum UrlsAction {
    Show,
    /// Replace the complete URL and filter configuration.
    Set {
        #[arg(long = "url")]
        urls: Vec<String>,
        #[arg(long = "exclude")]
        exclusion_filters: Vec<String>,
        #[arg(long = "include")]
        inclusion_filters: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DatasourceAction {
    /// Create the web data source from the `[crawler]` defaults.
    Create,
    Delete { id: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't need configuration
    match &cli.command {
        Commands::Chat {
            base_url,
            timeout_secs,
        } => {
            let client = GatewayClient::new(base_url, Duration::from_secs(*timeout_secs))?;
            return chat::run_chat(client).await;
        }
        Commands::Models { catalog: true } => {
            for model in MODEL_CATALOG {
                println!("{:<40} {} ({})", model.id, model.name, model.provider);
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(cli.config.as_deref())?;

    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let kb = BedrockClient::from_config(&cfg)?;
    let kb: &dyn KnowledgeBase = &kb;

    match cli.command {
        Commands::Ask {
            question,
            session,
            model,
        } => {
            let request = QueryRequest {
                question,
                request_session_id: session,
                model_id: model,
            };
            let (status, reply) = query::ask(kb, &cfg, &request).await;
            print_json(&reply)?;
            if !status.is_success() {
                anyhow::bail!("query failed ({})", status);
            }
        }
        Commands::Urls { action } => match action {
            UrlsAction::Show => {
                print_json(&sources::read(kb, &cfg).await?)?;
            }
            UrlsAction::Set {
                urls,
                exclusion_filters,
                inclusion_filters,
            } => {
                let update = UrlUpdate {
                    url_list: urls,
                    exclusion_filters,
                    inclusion_filters,
                };
                print_json(&sources::update(kb, &cfg, &update).await?)?;
            }
        },
        Commands::Ingest { object_created } => {
            let trigger = if object_created {
                IngestTrigger::ObjectCreated
            } else {
                IngestTrigger::Schedule
            };
            let request_id = uuid::Uuid::new_v4().to_string();
            let job = ingest::start_ingestion(kb, &cfg, trigger, &request_id).await?;
            print_json(&job)?;
        }
        Commands::Models { .. } => {
            for model in kb.list_foundation_models().await? {
                println!(
                    "{:<40} {} ({})",
                    model.model_id,
                    model.model_name.unwrap_or_default(),
                    model.provider_name.unwrap_or_default()
                );
            }
        }
        Commands::Datasource { action } => match action {
            DatasourceAction::Create => {
                print_json(&sources::create(kb, &cfg, None).await?)?;
            }
            DatasourceAction::Delete { id } => {
                sources::delete(kb, &cfg, &id).await?;
                println!("Deleted data source {}", id);
            }
        },
        Commands::Serve | Commands::Chat { .. } => {
            // Handled above
            unreachable!()
        }
    }

    Ok(())
}
