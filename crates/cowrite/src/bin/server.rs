//! The `cowrite-server` binary.

use std::path::PathBuf;

use clap::Parser;

use cowrite::server::{self, ServerConfig, ServerError};

/// Real-time collaborative text editing server.
#[derive(Parser, Debug)]
#[command(name = "cowrite-server", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Directory to serve static UI assets from.
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    /// Origin allowed to open WebSocket connections (repeatable).
    /// All origins are allowed when omitted.
    #[arg(long = "allow-origin")]
    allowed_origins: Vec<String>,

    /// Disable logging output.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    let config = ServerConfig {
        listen_addr: args.listen,
        static_dir: args.static_dir,
        allowed_origins: args.allowed_origins,
        log: !args.quiet,
    };

    if config.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "cowrite=debug,tower_http=info".into()),
            )
            .init();
    }

    server::run(config).await
}
