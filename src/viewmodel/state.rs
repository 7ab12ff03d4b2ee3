use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::warn;

use crate::storage::Subscription;

/// Result of a view-model action, carrying a user-facing message on failure.
pub type ActionResult<T = ()> = std::result::Result<T, String>;

/// What a screen shows for one data stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Loading
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent<T> {
    Started,
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    /// Every event fully determines the next state; the latest one wins.
    pub fn reduce(self, event: LoadEvent<T>) -> Self {
        match event {
            LoadEvent::Started => LoadState::Loading,
            LoadEvent::Loaded(value) => LoadState::Success(value),
            LoadEvent::Failed(message) => LoadState::Error(message),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            LoadState::Loading => LoadState::Loading,
            LoadState::Success(value) => LoadState::Success(f(value)),
            LoadState::Error(message) => LoadState::Error(message),
        }
    }
}

pub(crate) fn apply<T>(state: &watch::Sender<LoadState<T>>, event: LoadEvent<T>) {
    state.send_modify(|current| *current = std::mem::take(current).reduce(event));
}

/// Applies `event` unless `epoch` has been superseded. The check runs under the
/// channel's write lock, so a superseded listener can never overwrite a newer
/// `Started` or snapshot.
pub(crate) fn apply_current<T>(
    state: &watch::Sender<LoadState<T>>,
    epoch: &Epoch,
    event: LoadEvent<T>,
) -> bool {
    state.send_if_modified(|current| {
        if !epoch.is_current() {
            return false;
        }
        *current = std::mem::take(current).reduce(event);
        true
    })
}

/// Folds every snapshot of `subscription` into `state` until the stream ends
/// or `epoch` is superseded.
pub(crate) fn spawn_fold<T, U, F>(
    mut subscription: Subscription<T>,
    state: Arc<watch::Sender<LoadState<U>>>,
    epoch: Epoch,
    mut project: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    U: Send + Sync + 'static,
    F: FnMut(Vec<T>) -> U + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            let event = match snapshot {
                Ok(items) => LoadEvent::Loaded(project(items)),
                Err(err) => {
                    warn!(error = %err, "live query failed");
                    LoadEvent::Failed(err.user_message())
                }
            };
            if !apply_current(&state, &epoch, event) {
                break;
            }
        }
    })
}

/// Generation token handed to a listener; stale once the owner starts another.
#[derive(Debug, Clone)]
pub(crate) struct Epoch {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl Epoch {
    pub(crate) fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.value
    }
}

/// The one background listener a view model keeps alive. Starting a new one
/// or dropping the owner aborts the previous task.
#[derive(Debug, Default)]
pub(crate) struct ActiveListener {
    handle: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
}

impl ActiveListener {
    /// Stops the current listener and returns the epoch for its successor.
    /// Call before publishing `Started` for the new load.
    pub(crate) fn begin(&self) -> Epoch {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let value = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Epoch {
            counter: Arc::clone(&self.generation),
            value,
        }
    }

    pub(crate) fn attach(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.slot().replace(handle) {
            previous.abort();
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ActiveListener {
    fn drop(&mut self) {
        self.begin();
    }
}
