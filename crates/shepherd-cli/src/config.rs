use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI for shepherd
#[derive(Parser, Debug)]
#[command(name = "shepherd", version, about = "Supervisor for long-running dev processes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start processes from the configuration and supervise them until Ctrl+C
    Run {
        /// File path to the configuration file (TOML)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Processes to start, all of them when empty
        processes: Vec<String>,
    },
    /// Validate the configuration and print the registered processes
    Check {
        /// File path to the configuration file (TOML)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["shepherd", "run", "-f", "dev.toml", "api", "web"]).unwrap();
        match cli.command {
            Commands::Run { file, processes } => {
                assert_eq!(file, Some(PathBuf::from("dev.toml")));
                assert_eq!(processes, vec!["api", "web"]);
            }
            Commands::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_check_defaults() {
        let cli = Cli::try_parse_from(["shepherd", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { file: None }));
    }
}
