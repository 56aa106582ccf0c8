//! Shared application state.

pub mod channels;
pub mod chat;
pub mod presence;
pub mod tictactoe;
pub mod wordle;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::store::CoupleStore,
    error::ServiceError,
    services::push::PushSender,
    state::{channels::ChannelHub, presence::PresenceRegistry},
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing live connections and database handles.
pub struct AppState {
    store: RwLock<Option<Arc<dyn CoupleStore>>>,
    presence: PresenceRegistry,
    channels: ChannelHub,
    config: Arc<AppConfig>,
    push: Arc<dyn PushSender>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, push: Arc<dyn PushSender>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            presence: PresenceRegistry::new(),
            channels: ChannelHub::new(),
            config: Arc::new(config),
            push,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn CoupleStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store, or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn CoupleStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn CoupleStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Registry of authenticated socket sessions keyed by user id.
    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Named broadcast channels for couple rooms, games, and chat threads.
    pub fn channels(&self) -> &ChannelHub {
        &self.channels
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Push notification transport for offline partners.
    pub fn push(&self) -> &Arc<dyn PushSender> {
        &self.push
    }

    /// Update and broadcast the degraded flag when the value changes.
    async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
