//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Type source documents (comma-separated, default: ./types.json).
    pub type_sources: Vec<PathBuf>,

    /// PostgreSQL connection URL. When None, content is kept in memory.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Leading key segment for region fields in form posts (e.g. "Regions").
    pub form_prefix: Option<String>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            type_sources: vec![PathBuf::from("./types.json")],
            database_url: None,
            database_max_connections: 10,
            form_prefix: None,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let type_sources = env::var("TYPE_SOURCES")
            .map(|v| parse_list(&v).into_iter().map(PathBuf::from).collect())
            .unwrap_or_else(|_| vec![PathBuf::from("./types.json")]);

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let form_prefix = env::var("FORM_PREFIX")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            type_sources,
            database_url,
            database_max_connections,
            form_prefix,
            cors_allowed_origins,
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
