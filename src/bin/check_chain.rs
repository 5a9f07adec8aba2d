use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::process::{check_chain, ChainOptions};

#[derive(Parser)]
#[command(name = "check_chain")]
#[command(about = "Run the quality checks on the daily records of a schema", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Schema of the daily records (default: SCIA_SCHEMA)
    #[arg(long)]
    schema: Option<String>,

    /// Check only these stations (cod_staz)
    #[arg(long, value_delimiter = ',')]
    stations: Option<Vec<i32>>,

    /// Skip the synchronization of the flags -9 and +5
    #[arg(long)]
    omit_flagsync: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    let options = ChainOptions {
        schema: cli.schema.unwrap_or_else(|| config.schema.clone()),
        flagsync_schema: config.flagsync_schema.clone(),
        stations: cli.stations,
        omit_flagsync: cli.omit_flagsync,
    };
    check_chain(&repos.daily, &options).await?;
    Ok(())
}
