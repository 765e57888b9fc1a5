use anyhow::{Context, Result};
use clap::Parser;
use immersion_tracker::cli::{Args, Command};
use immersion_tracker::config::Config;
use immersion_tracker::database::Database;
use immersion_tracker::{api, export};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("immersion_tracker=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Some(Command::Serve { host, port }) => {
            let mut config = Config::load(args.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            api::start_server(config).await?;
        }
        Some(Command::Export { output }) => {
            let config = Config::load(args.config.as_deref())?;
            let db = Database::open(&config.database.path)?;
            let rows = db.episode_rows()?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("create {}", path.display()))?;
                    export::write_csv(&rows, file)?;
                    eprintln!("Wrote {} episodes to {}", rows.len(), path.display());
                }
                None => export::write_csv(&rows, std::io::stdout().lock())?,
            }
        }
        None => {
            eprintln!("No command specified.\n");
            eprintln!("  immersion-tracker serve     Start the REST API server");
            eprintln!("  immersion-tracker export    Write watched episodes as CSV\n");
            eprintln!("Run 'immersion-tracker --help' for all options.");

            std::process::exit(1);
        }
    }

    Ok(())
}
