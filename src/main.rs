use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyrag::extraction::{ChunkingStrategy, ExtractionConfig, Strategy};
use rustyrag::service::{RagApi, RagService};
use rustyrag::{api, config, logging};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "rustyrag",
    about = "Ask questions about a PDF's text, tables, and images"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Ingest a PDF and print the new session id.
    Ingest {
        /// Path to the PDF.
        path: PathBuf,
        /// Layout strategy: hi_res, fast, or ocr_only.
        #[arg(long, default_value = "hi_res")]
        strategy: String,
        /// Chunking strategy: by_title or default.
        #[arg(long, default_value = "by_title")]
        chunking_strategy: String,
        /// Keep tables as plain text instead of HTML.
        #[arg(long)]
        no_table_structure: bool,
        #[arg(long, default_value_t = 10_000)]
        max_characters: usize,
        #[arg(long, default_value_t = 2_000)]
        combine_text_under_n_chars: usize,
        #[arg(long, default_value_t = 6_000)]
        new_after_n_chars: usize,
    },
    /// Ask a question against an ingested session.
    Ask {
        #[arg(long)]
        session: String,
        question: String,
    },
    /// List persisted sessions.
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("failed to load configuration")?;
    let service =
        Arc::new(RagService::from_config(config).context("failed to initialize RAG service")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(service).await,
        Command::Ingest {
            path,
            strategy,
            chunking_strategy,
            no_table_structure,
            max_characters,
            combine_text_under_n_chars,
            new_after_n_chars,
        } => {
            let document = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let extraction = ExtractionConfig {
                infer_table_structure: !no_table_structure,
                strategy: strategy.parse::<Strategy>()?,
                chunking_strategy: chunking_strategy.parse::<ChunkingStrategy>()?,
                max_characters,
                combine_text_under_n_chars,
                new_after_n_chars,
            };
            let outcome = service.ingest(document, extraction).await?;
            println!(
                "{}",
                json!({
                    "session_id": outcome.session_id,
                    "collection_name": outcome.collection_name,
                    "counts": outcome.counts,
                })
            );
            Ok(())
        }
        Command::Ask { session, question } => {
            let answer = service.ask(&session, &question).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(())
        }
        Command::Sessions => {
            for record in service.sessions().await? {
                println!(
                    "{}\t{}\t{}\ttexts={} tables={} images={}",
                    record.session_id,
                    record.created_at,
                    record.collection_name,
                    record.counts.texts,
                    record.counts.tables,
                    record.counts.images
                );
            }
            Ok(())
        }
    }
}

async fn serve(service: Arc<RagService>) -> Result<()> {
    let app = api::create_router(service);
    let (listener, port) = bind_listener()
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
