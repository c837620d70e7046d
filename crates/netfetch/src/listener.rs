//! Completion listeners

use url::Url;

/// Receives a call once a URI it asked for has been downloaded
///
/// Called on the delivery task, never from inside
/// [`AsyncFetcher::request`](crate::AsyncFetcher::request), and never
/// concurrently with another listener.
pub trait Listener: Send + Sync {
    /// The resource for `uri` is now available from the fetcher
    fn notify(&self, uri: &Url);
}

impl<F> Listener for F
where
    F: Fn(&Url) + Send + Sync,
{
    fn notify(&self, uri: &Url) {
        self(uri)
    }
}
