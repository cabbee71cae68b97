use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};
use signal_hook::consts::{SIGINT, SIGTERM};

use bgp_speaker::{config, Speaker, TcpPlatform};

#[derive(Parser, Debug)]
#[clap(name = "bgpd", rename_all = "kebab-case")]
/// BGP-4 speaker
struct Args {
    /// Path to BGP service config.toml
    config_path: String,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (bgpd_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("bgp_speaker"), bgpd_level)
        .filter(Some("bgpd"), bgpd_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", bgpd_level, other_level);

    let config = config::from_file(&args.config_path)?;
    debug!("Found {} peers in {}", config.peers.len(), args.config_path);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;

    let speaker = Speaker::from_config(Arc::new(TcpPlatform), &config).await?;
    speaker.serve(config.tick_interval, shutdown).await;

    info!("Stopping BGPd...");
    speaker.shutdown().await;
    Ok(())
}
