//! CLI argument parsing

use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{ArgAction, Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "lql")]
#[command(author, version, about = "Answer Livestatus queries about a monitoring core", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "LQL_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON snapshot of the monitoring core
    #[arg(long, global = true, env = "LQL_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Listen on a Unix socket and answer requests
    Serve {
        /// Socket path
        #[arg(long, env = "LQL_SOCKET")]
        socket: Option<PathBuf>,

        /// Largest response before a query fails (e.g. "100MiB", "5000000")
        #[arg(long, value_parser = parse_size)]
        max_response_size: Option<u64>,

        /// Concurrent connections
        #[arg(long)]
        max_connections: Option<usize>,
    },

    /// Answer one request and print the raw response
    Query {
        /// The request; read from stdin when omitted
        request: Option<String>,
    },

    /// List all tables and their columns
    Tables {
        /// Only this table
        table: Option<String>,
    },
}

/// Parse a human readable size into bytes
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    s.trim()
        .parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("invalid size '{}': {}", s, e))
}

impl Args {
    /// The configuration file, if any, with command line overrides applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };
        if let Some(snapshot) = &self.snapshot {
            config.snapshot = Some(snapshot.clone());
        }
        if let SubCommand::Serve {
            socket,
            max_response_size,
            max_connections,
        } = &self.command
        {
            if let Some(socket) = socket {
                config.socket_path = socket.clone();
            }
            if let Some(size) = max_response_size {
                config.max_response_size = *size;
            }
            if let Some(n) = max_connections {
                config.max_connections = *n;
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("5000000"), Ok(5_000_000));
        assert_eq!(parse_size("1 KiB"), Ok(1024));
        assert_eq!(parse_size("2MiB"), Ok(2 * 1024 * 1024));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "socket_path = \"/from/file\"\nmax_connections = 3").unwrap();
        let args = Args::try_parse_from([
            "lql",
            "--config",
            file.path().to_str().unwrap(),
            "serve",
            "--socket",
            "/from/flag",
            "--max-response-size",
            "1KiB",
        ])
        .unwrap();
        let config = args.load_config().unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/from/flag"));
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.max_response_size, 1024);
    }

    #[test]
    fn test_query_reads_request_argument() {
        let args = Args::try_parse_from(["lql", "-vv", "query", "GET status"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, SubCommand::Query { request: Some(ref r) } if r == "GET status"));
    }
}
