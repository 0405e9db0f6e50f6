use clap::{Parser, Subcommand};

use crate::config::DEFAULT_PROBE_TIMEOUT_SECS;

#[derive(Parser)]
#[command(name = "scanward")]
#[command(version, about = "Concurrent web security scan orchestrator")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan one domain and print the report
    Scan {
        #[arg(short, long)]
        domain: String,

        /// Per-probe timeout in seconds
        #[arg(short, long, env = "SCANWARD_PROBE_TIMEOUT", default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
        timeout: u64,

        /// Maximum probes in flight (defaults to the whole probe set)
        #[arg(short, long, env = "SCANWARD_MAX_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Extra attempts for probes that time out
        #[arg(short, long, default_value = "0")]
        retries: u32,

        /// Write the report to a .json or .html file
        #[arg(short, long)]
        output: Option<String>,

        /// Persist the scan to this SQLite database instead of memory
        #[arg(long, env = "SCANWARD_DATABASE_URL")]
        database: Option<String>,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the HTTP API
    Serve {
        #[arg(short, long, env = "SCANWARD_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        #[arg(long, env = "SCANWARD_DATABASE_URL", default_value = "sqlite:scanward.db")]
        database: String,

        #[arg(short, long, env = "SCANWARD_PROBE_TIMEOUT", default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
        timeout: u64,

        #[arg(short, long, env = "SCANWARD_MAX_CONCURRENCY")]
        concurrency: Option<usize>,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-render a saved JSON report
    Report {
        #[arg(short, long)]
        input: String,

        #[arg(short, long, default_value = "html")]
        format: String,

        #[arg(short, long)]
        output: Option<String>,
    },

    /// List the built-in probes
    Probes,
}

impl Commands {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Commands::Scan { verbose: true, .. } | Commands::Serve { verbose: true, .. } => {
                "scanward=debug"
            }
            Commands::Serve { .. } => "scanward=info,tower_http=info",
            _ => "scanward=warn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_defaults() {
        let cli = Cli::try_parse_from(["scanward", "scan", "--domain", "example.com"]).unwrap();
        match cli.command {
            Commands::Scan {
                domain,
                retries,
                verbose,
                ..
            } => {
                assert_eq!(domain, "example.com");
                assert_eq!(retries, 0);
                assert!(!verbose);
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn test_log_filter_per_command() {
        let scan = Cli::try_parse_from(["scanward", "scan", "-d", "example.com", "-v"]).unwrap();
        assert_eq!(scan.command.default_log_filter(), "scanward=debug");

        let probes = Cli::try_parse_from(["scanward", "probes"]).unwrap();
        assert_eq!(probes.command.default_log_filter(), "scanward=warn");
    }
}
