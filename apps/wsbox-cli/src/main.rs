//! wsbox command-line client.

mod app;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wsbox_connection::Options;

/// Keeps a WebSocket session open, logging events and sending stdin lines.
#[derive(Parser, Debug)]
#[command(name = "wsbox-cli", version)]
struct Args {
    /// WebSocket URL (e.g., ws://127.0.0.1:6789)
    url: String,

    /// TOML file with `[reconnect]` and `[heartbeat]` options
    #[arg(env = "WSBOX_OPTIONS")]
    options: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = match &args.options {
        Some(path) => {
            Options::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Options::default(),
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), url = %args.url, "starting wsbox client");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(args.url, options))?;

    tracing::info!("client shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        assert!(Args::try_parse_from(["wsbox-cli"]).is_err());
    }

    #[test]
    fn options_path_is_optional() {
        let args = Args::try_parse_from(["wsbox-cli", "ws://127.0.0.1:6789"]).unwrap();
        assert_eq!(args.url, "ws://127.0.0.1:6789");

        let args =
            Args::try_parse_from(["wsbox-cli", "ws://127.0.0.1:6789", "session.toml"]).unwrap();
        assert_eq!(args.options, Some(PathBuf::from("session.toml")));
    }
}
