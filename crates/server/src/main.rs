use anyhow::Context;
use clap::Parser;
use geochrome::{Index, ServerConfig, SystemConfig};
use geochrome_server::run_server;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Index root directory
    #[arg(short, long)]
    root: PathBuf,

    /// Listening port, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server configuration (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Create the index with this tree depth
    #[arg(long, requires = "bucket_width")]
    depth: Option<usize>,

    /// Create the index with this time bucket width, in seconds
    #[arg(long, requires = "depth")]
    bucket_width: Option<i64>,
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => ServerConfig::from_toml(&text)?,
        _ => ServerConfig::from_json(&text)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geochrome_server=info,geochrome=info,info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    let index = match (args.depth, args.bucket_width) {
        (Some(depth), Some(width)) => {
            info!("Creating index at {}", args.root.display());
            Index::create(&args.root, SystemConfig::new(depth, width)?)?
        }
        _ => Index::open(&args.root)
            .with_context(|| format!("cannot open index at {}", args.root.display()))?,
    };

    let addr: SocketAddr = format!("{}:{}", args.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl_c signal: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    run_server(listener, Arc::new(index), config, Box::pin(shutdown)).await?;

    Ok(())
}
