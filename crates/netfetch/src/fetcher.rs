//! Deduplicating, throttled URI fetcher
//!
//! Resolution order: memory cache, disk cache, network. Network fetches run on
//! blocking worker tasks, at most `max_concurrent_downloads` at a time; extra
//! URIs wait in a FIFO queue and are picked up by whichever worker finishes
//! first. Completions collect into a batch that a single delivery task drains,
//! so listeners are never called concurrently.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use boundedcache::{BoundedCache, StatsSnapshot};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::FetcherConfig;
use crate::disk::DiskCache;
use crate::error::{Error, Result};
use crate::listener::Listener;
use crate::resource::Resource;
use crate::transport::Transport;

/// Listener handle as stored in pending records
pub type SharedListener = Arc<dyn Listener>;

/// Pending records, throttle queue and completion batch
///
/// Always mutated together under one lock.
#[derive(Default)]
struct FetchState {
    /// URI -> listeners in registration order
    pending: HashMap<Url, Vec<SharedListener>>,
    /// URIs waiting for a download slot
    queue: VecDeque<Url>,
    /// Workers currently running
    in_flight: usize,
    /// Downloaded since the last delivery pass
    completed: Vec<Url>,
    /// Delivery passes that notified at least one URI
    passes: u64,
}

struct Inner<V> {
    config: FetcherConfig,
    memory: Mutex<BoundedCache<Url, Arc<V>>>,
    state: Arc<Mutex<FetchState>>,
    disk: DiskCache,
    transport: Box<dyn Transport>,
    runtime: Handle,
    deliver_tx: mpsc::UnboundedSender<()>,
}

/// Resolves URIs to decoded resources through memory, disk and network tiers
///
/// Cloning is cheap; clones share all caches and queues.
pub struct AsyncFetcher<V: Resource> {
    inner: Arc<Inner<V>>,
}

impl<V: Resource> Clone for AsyncFetcher<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Resource> AsyncFetcher<V> {
    /// Create a fetcher running on the current tokio runtime
    ///
    /// # Returns
    /// * `Err(Error::NoRuntime)` when called outside a runtime
    pub fn new<T: Transport>(config: FetcherConfig, transport: T) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Self::with_handle(config, transport, runtime)
    }

    /// Create a fetcher whose workers and delivery task run on `runtime`
    pub fn with_handle<T: Transport>(
        config: FetcherConfig,
        transport: T,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        let disk = DiskCache::open(&config.cache_dir)?;

        let mut builder = BoundedCache::builder(config.memory_entries);
        if config.memory_bytes > 0 {
            builder = builder
                .size_limit(config.memory_bytes)
                .weigher(|value: &Arc<V>| value.weight());
        }
        let memory = builder.build()?;

        let state = Arc::new(Mutex::new(FetchState::default()));
        let (deliver_tx, deliver_rx) = mpsc::unbounded_channel();
        runtime.spawn(deliver_loop(Arc::clone(&state), deliver_rx));

        info!(
            cache_dir = %config.cache_dir.display(),
            memory_entries = config.memory_entries,
            max_concurrent_downloads = config.max_concurrent_downloads,
            "Fetcher started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                memory: Mutex::new(memory),
                state,
                disk,
                transport: Box::new(transport),
                runtime,
                deliver_tx,
            }),
        })
    }

    /// Resolve `uri`, or register `listener` to hear when it has downloaded
    ///
    /// Returns the value immediately on a memory hit, a readable local file,
    /// or a decodable disk entry; no notification follows in that case.
    /// Otherwise returns `None` and `listener` is notified once on the
    /// delivery task when the download succeeds. Failed downloads notify
    /// nobody. Registering the same `listener` handle twice for one pending
    /// URI still yields a single notification.
    pub fn request(&self, uri: &Url, listener: SharedListener) -> Option<Arc<V>> {
        if let Some(value) = self.cached(uri) {
            debug!(%uri, "Memory hit");
            return Some(value);
        }

        if uri.scheme() == "file" {
            return self.load_local(uri);
        }

        if let Some(value) = self.load_from_disk(uri) {
            return Some(value);
        }

        self.enqueue(uri, listener);
        None
    }

    /// Look up `uri` in the memory tier only
    pub fn cached(&self, uri: &Url) -> Option<Arc<V>> {
        self.inner.memory.lock().get(uri).cloned()
    }

    /// Drop every value held in memory and zero its counters
    pub fn purge_memory(&self) {
        let mut memory = self.inner.memory.lock();
        memory.purge();
        memory.stats().reset();
        info!("Memory cache purged");
    }

    /// Delete every file in the disk tier
    pub fn clear_disk(&self) -> Result<usize> {
        let removed = self.inner.disk.clear()?;
        info!(removed, "Disk cache cleared");
        Ok(removed)
    }

    /// Memory cache counters
    pub fn memory_stats(&self) -> StatsSnapshot {
        self.inner.memory.lock().stats().snapshot()
    }

    /// Number of values held in memory
    pub fn memory_len(&self) -> usize {
        self.inner.memory.lock().len()
    }

    /// URIs with a pending request record
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// URIs waiting for a download slot
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Workers currently downloading
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Delivery passes that have notified listeners so far
    ///
    /// URIs notified by the same pass observe the same value from inside
    /// their listeners.
    pub fn delivery_passes(&self) -> u64 {
        self.inner.state.lock().passes
    }

    /// Active configuration
    pub fn config(&self) -> &FetcherConfig {
        &self.inner.config
    }

    /// The disk tier
    pub fn disk(&self) -> &DiskCache {
        &self.inner.disk
    }

    fn load_local(&self, uri: &Url) -> Option<Arc<V>> {
        let Ok(path) = uri.to_file_path() else {
            warn!(%uri, "File URI has no local path");
            return None;
        };

        let decoded = fs::read(&path)
            .map_err(Error::from)
            .and_then(|data| V::decode(Bytes::from(data)).map_err(Error::from));

        match decoded {
            Ok(value) => {
                debug!(%uri, "Local file read");
                Some(self.remember(uri, value))
            }
            Err(e) => {
                warn!(%uri, error = %e, "Local read failed");
                None
            }
        }
    }

    fn load_from_disk(&self, uri: &Url) -> Option<Arc<V>> {
        let data = match self.inner.disk.load(uri) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                debug!(%uri, error = %e, "Disk read failed");
                return None;
            }
        };

        match V::decode(data) {
            Ok(value) => {
                debug!(%uri, "Disk hit");
                Some(self.remember(uri, value))
            }
            Err(e) => {
                debug!(%uri, error = %e, "Disk entry undecodable, refetching");
                None
            }
        }
    }

    fn remember(&self, uri: &Url, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.inner.memory.lock().set(uri.clone(), Arc::clone(&value));
        value
    }

    fn enqueue(&self, uri: &Url, listener: SharedListener) {
        let start = {
            let mut state = self.inner.state.lock();
            if let Some(listeners) = state.pending.get_mut(uri) {
                if !listeners.iter().any(|known| Arc::ptr_eq(known, &listener)) {
                    listeners.push(listener);
                }
                false
            } else {
                state.pending.insert(uri.clone(), vec![listener]);
                if state.in_flight < self.inner.config.max_concurrent_downloads {
                    state.in_flight += 1;
                    true
                } else {
                    state.queue.push_back(uri.clone());
                    debug!(%uri, queued = state.queue.len(), "Download queued");
                    false
                }
            }
        };

        if start {
            let inner = Arc::clone(&self.inner);
            let uri = uri.clone();
            self.inner.runtime.spawn_blocking(move || inner.run_worker(uri));
        }
    }
}

impl<V> Inner<V> {
    /// Download `first`, then keep draining the queue on this worker
    fn run_worker(&self, first: Url) {
        let mut next = Some(first);

        while let Some(uri) = next {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.download(&uri)))
                .unwrap_or(Err(Error::TransportPanicked));

            let wake = {
                let mut state = self.state.lock();
                let wake = match result {
                    Ok(()) => {
                        let was_empty = state.completed.is_empty();
                        state.completed.push(uri);
                        was_empty
                    }
                    Err(e) => {
                        warn!(%uri, error = %e, "Download failed, dropping request");
                        state.pending.remove(&uri);
                        false
                    }
                };
                next = state.queue.pop_front();
                if next.is_none() {
                    state.in_flight -= 1;
                }
                wake
            };

            if wake && self.deliver_tx.send(()).is_err() {
                warn!("Delivery task has stopped");
            }
        }
    }

    fn download(&self, uri: &Url) -> Result<()> {
        let data = self.transport.fetch(uri)?;
        self.disk.store(uri, &data)?;
        debug!(%uri, bytes = data.len(), "Downloaded");
        Ok(())
    }
}

/// Single consumer draining the completion batch
async fn deliver_loop(state: Arc<Mutex<FetchState>>, mut wake: mpsc::UnboundedReceiver<()>) {
    while wake.recv().await.is_some() {
        let ready: Vec<(Url, Vec<SharedListener>)> = {
            let mut state = state.lock();
            let batch = std::mem::take(&mut state.completed);
            let ready: Vec<_> = batch
                .into_iter()
                .filter_map(|uri| {
                    let listeners = state.pending.remove(&uri)?;
                    Some((uri, listeners))
                })
                .collect();
            if !ready.is_empty() {
                state.passes += 1;
            }
            ready
        };

        for (uri, listeners) in ready {
            for listener in listeners {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.notify(&uri)));
                if outcome.is_err() {
                    error!(%uri, "Listener panicked during delivery");
                }
            }
        }
    }
    debug!("Delivery task stopped");
}
