use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Product image and 3D model asset service")]
pub struct Args {
    /// Host to bind to (overrides CATALOG_ASSETS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CATALOG_ASSETS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides CATALOG_ASSETS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides CATALOG_ASSETS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base of public asset URLs (overrides CATALOG_ASSETS_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Maximum request body size in bytes (overrides CATALOG_ASSETS_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_args(args)?;
        Ok((cfg, migrate))
    }

    fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("CATALOG_ASSETS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("CATALOG_ASSETS_PORT", 3000u16)?;
        let env_storage =
            env::var("CATALOG_ASSETS_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("CATALOG_ASSETS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/catalog_assets.db".into());
        let env_max_upload = env_or("CATALOG_ASSETS_MAX_UPLOAD_BYTES", 100 * 1024 * 1024usize)?;

        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = match args.public_base_url {
            Some(url) => url,
            None => env::var("CATALOG_ASSETS_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
        };

        // --- Merge ---
        Ok(Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse `name`, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arguments_take_precedence() {
        let args = Args::parse_from([
            "catalog-assets",
            "--host",
            "127.0.0.1",
            "--port",
            "8088",
            "--storage-dir",
            "/tmp/objects",
            "--database-url",
            "sqlite://meta.db",
            "--public-base-url",
            "https://cdn.example.com",
            "--max-upload-bytes",
            "1024",
        ]);
        let cfg = AppConfig::from_args(args).unwrap();

        assert_eq!(cfg.addr(), "127.0.0.1:8088");
        assert_eq!(cfg.storage_dir, "/tmp/objects");
        assert_eq!(cfg.database_url, "sqlite://meta.db");
        assert_eq!(cfg.public_base_url, "https://cdn.example.com");
        assert_eq!(cfg.max_upload_bytes, 1024);
    }
}
