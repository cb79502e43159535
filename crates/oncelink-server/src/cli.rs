//! Command line / environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use oncelink_core::{GrantConfig, RetentionPolicy};

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "oncelink-server", about = "Serve uploaded media behind single-use links")]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Public origin used in share links and media URLs.
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:5000")]
    pub base_url: String,

    /// SQLite database holding grants, e.g. `sqlite://grants.db`. Instances that
    /// share it share grants. Grants are kept in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Store uploads on disk here. Uploads are kept in memory when unset.
    #[arg(long, env = "MEDIA_DIR")]
    pub media_dir: Option<PathBuf>,

    /// Lifetime of a link in seconds.
    #[arg(long, env = "TTL_SECS", default_value = "3600")]
    pub ttl_secs: u64,

    /// Countdown shown to the viewer before the link is burned.
    #[arg(long, env = "VIEW_SECONDS", default_value = "5")]
    pub view_seconds: u32,

    /// Token length in characters (8..=64).
    #[arg(long, env = "TOKEN_LENGTH", default_value = "12")]
    pub token_length: usize,

    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value = "5")]
    pub store_timeout_secs: u64,

    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Delete records as soon as they are consumed instead of at TTL.
    #[arg(long, env = "REMOVE_ON_CONSUME")]
    pub remove_on_consume: bool,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "20971520")]
    pub max_upload_bytes: usize,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn grant_config(&self) -> GrantConfig {
        GrantConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            store_timeout: Duration::from_secs(self.store_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            token_length: self.token_length,
            retention: if self.remove_on_consume {
                RetentionPolicy::RemoveOnConsume
            } else {
                RetentionPolicy::RetainUntilExpiry
            },
            ..GrantConfig::default()
        }
    }
}
