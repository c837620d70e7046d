//! Process-wide default fetcher
//!
//! Built lazily on first use with [`FetcherConfig::default`] and an
//! [`HttpTransport`], on a runtime of its own that lives for the rest of the
//! process.

use std::sync::OnceLock;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::config::FetcherConfig;
use crate::error::Result;
use crate::fetcher::AsyncFetcher;
use crate::transport::HttpTransport;

static DEFAULT: OnceLock<(Runtime, AsyncFetcher<Bytes>)> = OnceLock::new();
static INIT: Mutex<()> = Mutex::new(());

/// The shared fetcher over raw bytes, created on first call
pub fn default_fetcher() -> Result<&'static AsyncFetcher<Bytes>> {
    if let Some((_, fetcher)) = DEFAULT.get() {
        return Ok(fetcher);
    }

    let _guard = INIT.lock();
    if let Some((_, fetcher)) = DEFAULT.get() {
        return Ok(fetcher);
    }

    let config = FetcherConfig::default();
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(config.max_concurrent_downloads)
        .thread_name("netfetch")
        .enable_all()
        .build()?;

    let built = HttpTransport::new(&config)
        .and_then(|transport| AsyncFetcher::with_handle(config, transport, runtime.handle().clone()));

    match built {
        Ok(fetcher) => {
            info!("Default fetcher initialised");
            let (_, fetcher) = DEFAULT.get_or_init(|| (runtime, fetcher));
            Ok(fetcher)
        }
        Err(e) => {
            runtime.shutdown_background();
            Err(e)
        }
    }
}
