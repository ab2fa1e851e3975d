//! Shared, idempotent loading of the widget and clustering capabilities.
//!
//! Browser hosts back these loads with script injection, and a script
//! tag is a per-page singleton. The first caller to observe the idle
//! state becomes the leader and drives the provider's load; callers
//! arriving while a load is in flight register as waiters and are
//! notified when the leader finishes. Terminal states are sticky for
//! the lifetime of the process.

use crate::{
    sdk::{ClusterCapability, MapSdk},
    MapError, Result,
};
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Waiter<T> = oneshot::Sender<std::result::Result<Arc<T>, String>>;

enum LoadState<T: ?Sized> {
    Idle,
    Loading(Vec<Waiter<T>>),
    Ready(Arc<T>),
    Failed(String),
}

/// Memoizes one asynchronous capability load across concurrent callers
pub struct SharedLoader<T: ?Sized + Send + Sync> {
    state: Mutex<LoadState<T>>,
}

enum Role<T: ?Sized> {
    Leader,
    Follower(oneshot::Receiver<std::result::Result<Arc<T>, String>>),
    Ready(Arc<T>),
    Failed(String),
}

impl<T: ?Sized + Send + Sync> SharedLoader<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoadState::Idle),
        }
    }

    /// Returns the loaded capability without triggering a load
    pub fn ready(&self) -> Option<Arc<T>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            LoadState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the capability, loading it via `load` if this is the
    /// first caller. Concurrent callers share the single in-flight load.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>>>,
    {
        let role = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *state {
                LoadState::Ready(value) => Role::Ready(value.clone()),
                LoadState::Failed(message) => Role::Failed(message.clone()),
                LoadState::Loading(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Follower(rx)
                }
                LoadState::Idle => {
                    *state = LoadState::Loading(Vec::new());
                    Role::Leader
                }
            }
        };

        match role {
            Role::Ready(value) => Ok(value),
            Role::Failed(message) => Err(MapError::SdkLoad(message).into()),
            Role::Follower(rx) => match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(MapError::SdkLoad(message).into()),
                Err(_) => Err(MapError::SdkLoad("capability load was abandoned".into()).into()),
            },
            Role::Leader => {
                let outcome = load().await;
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let waiters = match std::mem::replace(&mut *state, LoadState::Idle) {
                    LoadState::Loading(waiters) => waiters,
                    // The leader is the only writer while Loading
                    _ => Vec::new(),
                };
                match &outcome {
                    Ok(value) => {
                        *state = LoadState::Ready(value.clone());
                        drop(state);
                        for waiter in waiters {
                            let _ = waiter.send(Ok(value.clone()));
                        }
                    }
                    Err(error) => {
                        let message = error.to_string();
                        *state = LoadState::Failed(message.clone());
                        drop(state);
                        log::debug!("capability load failed: {message}");
                        for waiter in waiters {
                            let _ = waiter.send(Err(message.clone()));
                        }
                    }
                }
                outcome
            }
        }
    }
}

impl<T: ?Sized + Send + Sync> Default for SharedLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

static WIDGET_LOADER: Lazy<Arc<SharedLoader<dyn MapSdk>>> =
    Lazy::new(|| Arc::new(SharedLoader::new()));

static CLUSTER_LOADER: Lazy<Arc<SharedLoader<dyn ClusterCapability>>> =
    Lazy::new(|| Arc::new(SharedLoader::new()));

/// Process-wide loader for the widget SDK
pub fn widget_loader() -> Arc<SharedLoader<dyn MapSdk>> {
    WIDGET_LOADER.clone()
}

/// Process-wide loader for the clustering capability
pub fn cluster_loader() -> Arc<SharedLoader<dyn ClusterCapability>> {
    CLUSTER_LOADER.clone()
}
