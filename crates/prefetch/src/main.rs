//! prefetch - warm the netfetch disk cache for a list of URIs

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use netfetch::{AsyncFetcher, FetcherConfig, HttpTransport, SharedListener};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::report::{Outcome, Report};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disk cache directory
    #[arg(short = 'd', long)]
    cache_dir: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Memory cache capacity (number of items)
    #[arg(short, long)]
    memory_entries: Option<usize>,

    /// Seconds to wait for outstanding downloads
    #[arg(short, long, default_value_t = 60)]
    timeout_secs: u64,

    /// Wipe the disk cache before fetching
    #[arg(long)]
    clear: bool,

    /// URIs to fetch
    #[arg(required = true)]
    uris: Vec<Url>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting prefetch v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache directory: {}", config.cache_dir.display());
    info!("Concurrent downloads: {}", config.max_concurrent_downloads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let fetcher = AsyncFetcher::<Bytes>::with_handle(config, transport, runtime.handle().clone())
        .context("Failed to open fetcher")?;

    if args.clear {
        let removed = fetcher.clear_disk().context("Failed to clear disk cache")?;
        info!("Removed {} cached files", removed);
    }

    let report = run(
        &runtime,
        &fetcher,
        &args.uris,
        Duration::from_secs(args.timeout_secs),
    );
    report.print(&fetcher.memory_stats());

    let incomplete = report.incomplete();
    if incomplete > 0 {
        bail!("{} URI(s) never completed", incomplete);
    }
    Ok(())
}

/// Config file (if any) with command-line overrides applied
fn load_config(args: &Args) -> Result<FetcherConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .context(format!("Failed to read config: {:?}", path))?;
            serde_json::from_str(&raw).context(format!("Failed to parse config: {:?}", path))?
        }
        None => FetcherConfig::default(),
    };

    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(n) = args.concurrency {
        config.max_concurrent_downloads = n;
    }
    if let Some(n) = args.memory_entries {
        config.memory_entries = n;
    }
    Ok(config)
}

/// Request every URI and wait for notifications until done or timed out
///
/// Failed downloads drop their listeners, and with them their channel
/// senders, so the wait ends early once nothing can still arrive.
fn run(runtime: &Runtime, fetcher: &AsyncFetcher<Bytes>, uris: &[Url], timeout: Duration) -> Report {
    let (tx, mut rx) = mpsc::unbounded_channel::<Url>();
    let mut report = Report::default();

    for uri in uris {
        let tx = tx.clone();
        let listener: SharedListener = Arc::new(move |uri: &Url| {
            let _ = tx.send(uri.clone());
        });
        match fetcher.request(uri, listener) {
            Some(value) => report.record(uri.clone(), Outcome::Cached(value.len())),
            None => report.record(uri.clone(), Outcome::Pending),
        }
    }
    drop(tx);

    runtime.block_on(async {
        let deadline = tokio::time::Instant::now() + timeout;
        while report.pending() > 0 {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(uri)) => {
                    let noop: SharedListener = Arc::new(|_: &Url| {});
                    let outcome = fetcher
                        .request(&uri, noop)
                        .map_or(Outcome::Unreadable, |value| Outcome::Downloaded(value.len()));
                    report.record(uri, outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Timed out with {} downloads outstanding", report.pending());
                    break;
                }
            }
        }
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_requires_uris() {
        assert!(Args::try_parse_from(["prefetch"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("netfetch.json");
        std::fs::write(&path, r#"{"memory_entries": 50, "max_concurrent_downloads": 3}"#).unwrap();

        let args = parse(&[
            "prefetch",
            "--config",
            path.to_str().unwrap(),
            "--concurrency",
            "2",
            "https://example.com/a.png",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.memory_entries, 50);
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(args.uris.len(), 1);
    }

    #[test]
    fn test_bad_config_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let args = parse(&["prefetch", "--config", path.to_str().unwrap(), "https://example.com/"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_local_file_reports_cached() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("asset.bin");
        std::fs::write(&file, b"12345").unwrap();
        let uri = Url::from_file_path(&file).unwrap();

        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        let config = FetcherConfig::with_cache_dir(dir.path().join("cache"));
        let transport = HttpTransport::new(&config).unwrap();
        let fetcher =
            AsyncFetcher::<Bytes>::with_handle(config, transport, runtime.handle().clone()).unwrap();

        let report = run(&runtime, &fetcher, &[uri], Duration::from_secs(1));
        assert_eq!(report.incomplete(), 0);
        assert_eq!(report.pending(), 0);
    }
}
