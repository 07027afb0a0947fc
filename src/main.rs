//! paperscout CLI and HTTP server.

use anyhow::Context;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::{Parser, Subcommand};
use paperscout::config::DiscoveryConfig;
use paperscout::discovery::{DiscoveryEngine, DiscoveryRequest, RerankMode};
use paperscout::paper::DiscoveryResult;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paperscout", version, about = "Multi-provider academic paper discovery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search providers and print ranked candidates as JSON
    Discover {
        /// Research query
        query: String,

        #[arg(long, default_value_t = 20)]
        max_results: usize,

        /// Comma-separated provider names, in priority order
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,

        #[arg(long)]
        year_from: Option<i32>,

        #[arg(long)]
        year_to: Option<i32>,

        /// Keep only candidates with an open-access signal
        #[arg(long)]
        oa_only: bool,

        /// Keywords boosted by the ranker
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        #[arg(long, value_enum, default_value = "off")]
        rerank: RerankMode,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("paperscout={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = DiscoveryConfig::from_env();
    let engine = DiscoveryEngine::from_config(config).context("Failed to build engine")?;

    match cli.command {
        Commands::Discover {
            query,
            max_results,
            sources,
            year_from,
            year_to,
            oa_only,
            keywords,
            rerank,
        } => {
            let result = engine
                .discover(DiscoveryRequest {
                    query,
                    max_results,
                    sources,
                    year_from,
                    year_to,
                    open_access_only: oa_only,
                    target_text: None,
                    target_keywords: keywords,
                    rerank,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Serve { port, host } => {
            serve(engine, &host, port).await?;
        }
    }

    Ok(())
}

async fn serve(engine: DiscoveryEngine, host: &str, port: u16) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/discover", post(discover))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(engine));

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn discover(
    State(engine): State<Arc<DiscoveryEngine>>,
    Json(request): Json<DiscoveryRequest>,
) -> Json<DiscoveryResult> {
    Json(engine.discover(request).await)
}
