//! Pieces shared by the command line entry points.
use clap::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{DailyRepository, DbError, DbPool, StationRepository};

/// Load `.env` and log to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[derive(Args, Debug)]
pub struct DbArgs {
    /// Database connection string
    #[arg(long, env)]
    pub database_url: String,

    /// Create the SCIA tables when missing before running
    #[arg(long)]
    pub migrate: bool,
}

/// Repositories over the connection pool
#[derive(Clone)]
pub struct Repositories {
    pub daily: DailyRepository,
    pub stations: StationRepository,
}

impl DbArgs {
    pub async fn connect(&self, config: &Config) -> Result<Repositories, DbError> {
        let pool = DbPool::connect(&self.database_url, config.max_connections).await?;
        if self.migrate {
            pool.migrate().await?;
        }
        Ok(Repositories {
            daily: DailyRepository::new(pool.pool().clone()),
            stations: StationRepository::new(pool.pool().clone(), &config.stations_schema)?,
        })
    }
}
