//! Wiring of the long-lived client components.
//!
//! One [`AppContext`] exists per running client. It owns the API client,
//! the realtime channel, the store and the credential file, and ties them
//! together: the 401 hook tears the session down, the bridge feeds push
//! events into the store.

use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use tracing::{info, warn};

use omnilead_api::{ApiClient, ApiConfig};
use omnilead_realtime::{RealtimeChannel, Subscription};
use omnilead_store::ClientStore;

use crate::bridge;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;

pub struct AppContext {
    pub api: ApiClient,
    pub realtime: RealtimeChannel,
    pub store: Arc<ClientStore>,
    pub credentials: CredentialStore,
    bridge_subs: Mutex<Vec<Subscription>>,
}

impl AppContext {
    /// Build and wire everything. Any credential persisted by a previous run
    /// is attached to the API client so [`crate::flows::restore_session`]
    /// can pick it up.
    pub fn new(config: ClientConfig) -> anyhow::Result<Arc<Self>> {
        let api = ApiClient::new(ApiConfig {
            base_url: config.api_base_url.clone(),
            request_timeout: config.request_timeout,
        })
        .context("Failed to build the HTTP client")?;

        let realtime = RealtimeChannel::new(config.realtime_url.clone());
        let store = Arc::new(ClientStore::new());
        let credentials =
            CredentialStore::open(config.data_dir).context("Failed to open credential storage")?;

        if let Some(token) = credentials.load()? {
            api.set_credential(Some(token));
            info!("Persisted credential loaded");
        }

        // A rejected credential tears the whole session down, wherever the
        // rejection surfaced.
        let hook_credentials = credentials.clone();
        let hook_store = store.clone();
        let hook_realtime = realtime.clone();
        api.set_unauthorized_hook(Arc::new(move || {
            session_teardown(&hook_credentials, &hook_store, &hook_realtime);
        }));

        let bridge_subs = bridge::register_store_bridge(store.clone(), &realtime);

        Ok(Arc::new(Self {
            api,
            realtime,
            store,
            credentials,
            bridge_subs: Mutex::new(bridge_subs),
        }))
    }

    /// Release the realtime connection and the bridge handlers.
    pub fn shutdown(&self) {
        self.realtime.disconnect();
        let subs = std::mem::take(&mut *self.bridge_subs.lock().expect("subs lock poisoned"));
        bridge::remove_store_bridge(&self.realtime, subs);
        info!("Client context shut down");
    }
}

/// Drop every trace of the current session: persisted credential, cached
/// state, live connection. Shared by logout and the 401 hook.
pub(crate) fn session_teardown(
    credentials: &CredentialStore,
    store: &ClientStore,
    realtime: &RealtimeChannel,
) {
    realtime.disconnect();
    if let Err(e) = credentials.clear() {
        warn!(error = %e, "Failed to clear persisted credential");
    }
    store.reset();
    info!("Session torn down");
}
