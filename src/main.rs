// CLI collaborator: run a single crawl from the command line.
//
// Usage: webvault <seed-url> [output-dir]
//
// Ctrl-C cancels the crawl; the engine flushes its final checkpoint before
// exit, so re-running with the same state file resumes where it left off.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use webvault::config::CrawlRequest;
use webvault::crawl_events::LogEmitter;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => {}
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let seed = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: webvault <seed-url> [output-dir]"))?;

    let mut request = CrawlRequest::new(seed);
    if let Some(output_dir) = args.next() {
        request.output_dir = Some(output_dir.into());
    }
    let config = request.into_config()?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, stopping after in-flight work");
            signal_cancel.cancel();
        }
    });

    // Orderly cancellation (checkpoint flushed) still exits 0.
    webvault::crawl(config, cancel, Arc::new(LogEmitter)).await?;
    Ok(())
}
