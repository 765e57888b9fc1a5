use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "immersion-tracker")]
#[command(version)]
#[command(about = "Track watched episodes and report immersion progress", long_about = None)]
pub struct Args {
    /// Path to config.yaml (defaults to ~/.config/immersion-tracker/config.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the REST API server
    Serve {
        /// Address to bind, overrides the config file
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, overrides the config file
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write every watched episode as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let args = Args::parse_from(["immersion-tracker", "serve", "--host", "0.0.0.0", "-p", "9000"]);
        match args.command {
            Some(Command::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let args = Args::parse_from(["immersion-tracker", "export", "--config", "/etc/tracker.yaml"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/tracker.yaml")));
        assert!(matches!(args.command, Some(Command::Export { output: None })));
    }

    #[test]
    fn test_no_subcommand() {
        let args = Args::parse_from(["immersion-tracker"]);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
