//! CLI command definitions

use crate::config::HubConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "haggle")]
#[command(about = "Haggle - live buyer/seller price negotiation hub", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the negotiation hub
    Serve(ServeArgs),

    /// Print persisted chat history
    History {
        /// JSON Lines message log written by `serve --store`
        #[arg(short, long, env = "HAGGLE_STORE")]
        store: PathBuf,

        /// Only show the most recent messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print recent market prices from the advisory service
    PriceHistory {
        /// Advisory service base URL
        #[arg(long, env = "HAGGLE_ADVISORY_URL", default_value = "http://127.0.0.1:5000")]
        advisory_url: String,
    },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, env = "HAGGLE_LISTEN", default_value = "127.0.0.1:9000")]
    pub listen: String,

    /// Advisory service base URL
    #[arg(long, env = "HAGGLE_ADVISORY_URL", default_value = "http://127.0.0.1:5000")]
    pub advisory_url: String,

    /// Seconds to wait for a fair-price answer
    #[arg(long, env = "HAGGLE_ADVISORY_TIMEOUT_SECS", default_value = "10")]
    pub advisory_timeout_secs: u64,

    /// Milliseconds to wait for one frame write before dropping a client
    #[arg(long, env = "HAGGLE_WRITE_TIMEOUT_MS", default_value = "5000")]
    pub write_timeout_ms: u64,

    /// Largest inbound frame in bytes
    #[arg(long, env = "HAGGLE_MAX_FRAME_BYTES", default_value = "65536")]
    pub max_frame_bytes: usize,

    /// JSON Lines message log (messages stay in memory when omitted)
    #[arg(short, long, env = "HAGGLE_STORE")]
    pub store: Option<PathBuf>,
}

impl From<ServeArgs> for HubConfig {
    fn from(args: ServeArgs) -> Self {
        HubConfig {
            listen_addr: args.listen,
            advisory_url: args.advisory_url,
            advisory_timeout: Duration::from_secs(args.advisory_timeout_secs),
            write_timeout: Duration::from_millis(args.write_timeout_ms),
            max_frame_bytes: args.max_frame_bytes,
            store_path: args.store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "haggle",
            "serve",
            "--listen",
            "0.0.0.0:7000",
            "--advisory-url",
            "http://flask-predictor:5000",
            "--write-timeout-ms",
            "250",
            "--store",
            "chat.jsonl",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = HubConfig::from(args);

        assert_eq!(config.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.advisory_url, "http://flask-predictor:5000");
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.advisory_timeout, Duration::from_secs(10));
        assert_eq!(config.store_path, Some(PathBuf::from("chat.jsonl")));
    }

    #[test]
    fn test_history_limit() {
        let cli = Cli::try_parse_from(["haggle", "history", "--store", "chat.jsonl", "-n", "20"])
            .unwrap();

        match cli.command {
            Commands::History { store, limit } => {
                assert_eq!(store, PathBuf::from("chat.jsonl"));
                assert_eq!(limit, Some(20));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
