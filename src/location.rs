use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use url::Url;

/// The application's address bar.
pub trait Location: Send + Sync {
    /// URL the application is currently showing.
    fn current(&self) -> Url;

    /// Swaps the current URL without adding a history entry.
    fn replace(&self, url: Url);

    /// Leaves the application for an external page (full navigation).
    fn navigate(&self, url: &Url);
}

#[derive(Debug)]
struct LocationInner {
    current: Url,
    history: Vec<Url>,
    navigations: Vec<Url>,
}

/// In-process [`Location`]: keeps a history stack and remembers every
/// external navigation so the host can hand it to the user.
#[derive(Debug, Clone)]
pub struct MemoryLocation {
    inner: Arc<Mutex<LocationInner>>,
}

impl MemoryLocation {
    pub fn new(start: Url) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocationInner {
                history: vec![start.clone()],
                current: start,
                navigations: Vec::new(),
            })),
        }
    }

    /// The browser arriving at `url`, pushing a history entry.
    pub fn load(&self, url: Url) {
        let mut inner = self.lock();
        inner.history.push(url.clone());
        inner.current = url;
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Drains the external navigations requested since the last call.
    pub fn take_navigations(&self) -> Vec<Url> {
        std::mem::take(&mut self.lock().navigations)
    }

    fn lock(&self) -> MutexGuard<'_, LocationInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Url {
        self.lock().current.clone()
    }

    fn replace(&self, url: Url) {
        let mut inner = self.lock();
        debug!(from = %inner.current, to = %url, "Replacing location");
        if let Some(top) = inner.history.last_mut() {
            *top = url.clone();
        }
        inner.current = url;
    }

    fn navigate(&self, url: &Url) {
        debug!(%url, "Navigating away");
        self.lock().navigations.push(url.clone());
    }
}
