//! # netfetch
//!
//! Resolves URIs to decoded resources through three tiers:
//!
//! 1. **Memory**: a [`boundedcache::BoundedCache`] of decoded values
//! 2. **Disk**: one file per URI, named by the MD5 of the URI string
//! 3. **Network**: a pluggable blocking [`Transport`]
//!
//! Concurrent requests for one URI share a single download. At most
//! `max_concurrent_downloads` downloads run at once; the rest queue FIFO.
//! Listeners hear about completions in batches on one delivery task.
//! Failed downloads are logged and dropped without notifying anyone.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use netfetch::{AsyncFetcher, FetcherConfig, HttpTransport};
//! use url::Url;
//!
//! # async fn example() -> netfetch::Result<()> {
//! let config = FetcherConfig::default();
//! let transport = HttpTransport::new(&config)?;
//! let fetcher = AsyncFetcher::<Bytes>::new(config, transport)?;
//!
//! let uri = Url::parse("https://example.com/avatar.png").unwrap();
//! if fetcher.request(&uri, Arc::new(|uri: &Url| println!("ready: {uri}"))).is_none() {
//!     // downloading; the listener fires on success
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod disk;
mod error;
mod fetcher;
mod global;
mod listener;
mod resource;
mod transport;

pub use config::{FetcherConfig, MAX_CONCURRENT_DOWNLOADS};
pub use disk::DiskCache;
pub use boundedcache::StatsSnapshot;
pub use error::{DecodeError, Error, Result};
pub use fetcher::{AsyncFetcher, SharedListener};
pub use global::default_fetcher;
pub use listener::Listener;
pub use resource::Resource;
pub use transport::{HttpTransport, Transport};
pub use url::Url;
