use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub public_dir: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo upload companion server")]
pub struct Args {
    /// Host to bind to (overrides PHOTODROP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTODROP_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded photos are stored (overrides PHOTODROP_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Directory with static assets such as index.html (overrides PHOTODROP_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("PHOTODROP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("PHOTODROP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PHOTODROP_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading PHOTODROP_PORT"),
        };
        let env_upload_dir =
            env::var("PHOTODROP_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_public_dir =
            env::var("PHOTODROP_PUBLIC_DIR").unwrap_or_else(|_| "./public".into());

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            public_dir: args.public_dir.unwrap_or(env_public_dir),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
