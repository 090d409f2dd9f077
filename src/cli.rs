//! Command-line and environment configuration for the taskboard binary.

use clap::Parser;
use eyre::Result;
use taskboard::config::{DEFAULT_ALLOWED_ORIGIN, DEFAULT_HOST, DEFAULT_PORT, parse_origins};
use taskboard::{DatabaseLocation, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "taskboard",
    about = "A small task-tracking REST service",
    version,
    after_help = "Every option can also be set through the environment or a .env file."
)]
pub struct Cli {
    /// Database location, e.g. sqlite:///todos.db or sqlite::memory: (default: ./todos.db)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Comma-separated CORS origins; `*` allows any origin
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGIN)]
    pub allowed_origins: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,
}

impl Cli {
    /// Turn parsed options into a server configuration.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let database = DatabaseLocation::from_url(self.database_url.as_deref())?;

        Ok(ServerConfig::new(database)
            .with_host(&self.host)
            .with_port(self.port)
            .with_allowed_origins(parse_origins(&self.allowed_origins)))
    }
}
