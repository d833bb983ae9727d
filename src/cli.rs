use std::path::PathBuf;

use clap::Parser;

use crate::errors::AppError;
use crate::model::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, WalkOptions};

#[derive(Debug, Parser)]
#[command(name = "treewalk")]
#[command(about = "Concurrently walk a directory tree and write a metadata report")]
pub struct Cli {
    /// Root directory to walk
    pub root: PathBuf,

    /// Report file to write (truncated if it exists)
    pub output: PathBuf,

    /// Number of worker threads
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Maximum number of directories waiting in the work queue
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub output: PathBuf,
    pub walk: WalkOptions,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, AppError> {
        if cli.workers == 0 {
            return Err(AppError::InvalidConfig(
                "--workers must be at least 1".to_string(),
            ));
        }
        if cli.queue_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "--queue-capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            root: cli.root,
            output: cli.output,
            walk: WalkOptions {
                workers: cli.workers,
                queue_capacity: cli.queue_capacity,
            },
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_positionals_use_defaults() {
        let cli = Cli::try_parse_from(["treewalk", "/data", "out.txt"]).expect("parse");
        let config = Config::from_cli(cli).expect("config");

        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.output, PathBuf::from("out.txt"));
        assert_eq!(config.walk.workers, DEFAULT_WORKERS);
        assert_eq!(config.walk.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(!config.verbose);
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        assert!(Cli::try_parse_from(["treewalk", "/data"]).is_err());
        assert!(Cli::try_parse_from(["treewalk", "/data", "out.txt", "extra"]).is_err());
    }

    #[test]
    fn zero_workers_is_invalid() {
        let cli = Cli::try_parse_from(["treewalk", "/data", "out.txt", "-w", "0"]).expect("parse");
        let error = Config::from_cli(cli).expect_err("must fail");
        assert!(error.to_string().contains("--workers"));
    }

    #[test]
    fn queue_capacity_flag_is_applied() {
        let cli = Cli::try_parse_from(["treewalk", "/data", "out.txt", "--queue-capacity", "16"])
            .expect("parse");
        let config = Config::from_cli(cli).expect("config");
        assert_eq!(config.walk.queue_capacity, 16);
    }
}
