use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use sluice_api::ServerConfig;

/// Interpreter threads recurse through nested expressions.
const THREAD_STACK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "sluice-server", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,
    /// Listen address, overriding the configuration
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    let _guard = sluice_log::init_with(config.log.clone())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(THREAD_STACK_SIZE)
        .build()?
        .block_on(sluice_api::serve(config))
}
