use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub identity_host: String,
    pub identity_token: String,
    pub dns_api_base: String,
    pub dns_api_token: String,
    pub dns_zone_id: String,
    pub public_endpoint: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bucket-policy provisioning gateway")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Identity service base URL (overrides GATEWAY_IDENTITY_HOST)
    #[arg(long)]
    pub identity_host: Option<String>,

    /// Identity service auth token (overrides GATEWAY_IDENTITY_TOKEN)
    #[arg(long)]
    pub identity_token: Option<String>,

    /// DNS provider API base URL (overrides GATEWAY_DNS_API_BASE)
    #[arg(long)]
    pub dns_api_base: Option<String>,

    /// DNS provider API token (overrides GATEWAY_DNS_API_TOKEN)
    #[arg(long)]
    pub dns_api_token: Option<String>,

    /// DNS zone the bucket records live in (overrides GATEWAY_DNS_ZONE_ID)
    #[arg(long)]
    pub dns_zone_id: Option<String>,

    /// Public endpoint the bucket CNAME points at (overrides GATEWAY_PUBLIC_ENDPOINT)
    #[arg(long)]
    pub public_endpoint: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GATEWAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GATEWAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading GATEWAY_PORT"),
        };
        let env_db = env::var("GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/policy_gateway.db".into());
        let env_identity_host =
            env::var("GATEWAY_IDENTITY_HOST").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
        let env_identity_token = env::var("GATEWAY_IDENTITY_TOKEN").unwrap_or_default();
        let env_dns_api_base = env::var("GATEWAY_DNS_API_BASE")
            .unwrap_or_else(|_| "https://api.cloudflare.com/client/v4".into());
        let env_dns_api_token = env::var("GATEWAY_DNS_API_TOKEN").unwrap_or_default();
        let env_dns_zone_id = env::var("GATEWAY_DNS_ZONE_ID").unwrap_or_default();
        let env_public_endpoint =
            env::var("GATEWAY_PUBLIC_ENDPOINT").unwrap_or_else(|_| "link.storage.example".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            identity_host: args.identity_host.unwrap_or(env_identity_host),
            identity_token: args.identity_token.unwrap_or(env_identity_token),
            dns_api_base: args.dns_api_base.unwrap_or(env_dns_api_base),
            dns_api_token: args.dns_api_token.unwrap_or(env_dns_api_token),
            dns_zone_id: args.dns_zone_id.unwrap_or(env_dns_zone_id),
            public_endpoint: args.public_endpoint.unwrap_or(env_public_endpoint),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
