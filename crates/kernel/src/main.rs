//! Tessera CMS Kernel
//!
//! HTTP server for the content type system and permalink router, plus an
//! offline checker for type documents.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tessera_kernel::config::Config;
use tessera_kernel::content::{TypeBuilder, TypeRegistry};
use tessera_kernel::context::KernelContext;
use tessera_kernel::routes;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Validate type documents without starting the server.
    Check {
        /// JSON or YAML type documents, merged as one build.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { files } => Ok(check(files)),
    }
}

async fn serve() -> Result<()> {
    info!("Starting Tessera CMS kernel");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        port = config.port,
        sources = config.type_sources.len(),
        postgres = config.database_url.is_some(),
        "Configuration loaded"
    );

    let ctx = KernelContext::from_config(&config)
        .await
        .context("failed to initialize kernel context")?;

    let app = routes::app(ctx).layer(build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Build `files` into a throwaway registry and report the outcome.
fn check(files: Vec<PathBuf>) -> ExitCode {
    let builder = files
        .into_iter()
        .fold(TypeBuilder::new(TypeRegistry::new()), TypeBuilder::add_file);

    match builder.build() {
        Ok(report) => {
            info!(
                page_types = report.page_types,
                block_types = report.block_types,
                sources = ?report.sources,
                "type documents are valid"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            for structural in &err.errors {
                error!(error = %structural, "structural error");
            }
            error!(errors = err.errors.len(), "type documents are invalid");
            ExitCode::FAILURE
        }
    }
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
