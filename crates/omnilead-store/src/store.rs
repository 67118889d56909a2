//! Central observable store shared across the client.
//!
//! All domain state lives behind one mutex; mutations go through the typed
//! methods below, which delegate to the pure transition rules in
//! [`crate::domains`] and [`crate::reconcile`] and broadcast a change
//! notification whenever something was actually applied. Rendering is a
//! pure function of the snapshots returned here.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use omnilead_shared::models::{
    AnalyticsSnapshot, ConversationPatch, ConversationSummary, Filter, Message,
    PerformanceMetrics, Session,
};
use omnilead_shared::types::ConversationId;

use crate::domains::{AnalyticsState, ConversationDetail, ConversationsState, SessionState};
use crate::reconcile;

/// Which domain changed. Receivers re-read the matching snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Session,
    Conversations,
    Analytics,
}

#[derive(Default)]
struct StoreInner {
    session: SessionState,
    conversations: ConversationsState,
    analytics: AnalyticsState,
}

pub struct ClientStore {
    inner: Mutex<StoreInner>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(StoreInner::default()),
            changes,
        }
    }

    /// Subscribe to change notifications. Lagging receivers miss
    /// notifications, not state: the snapshots always reflect the latest
    /// applied mutation.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    // -----------------------------------------------------------------
    // Session domain
    // -----------------------------------------------------------------

    pub fn session_start(&self) {
        self.lock().session.start();
        self.notify(StoreChange::Session);
    }

    pub fn session_success(&self, session: Session) {
        self.lock().session.success(session);
        self.notify(StoreChange::Session);
    }

    pub fn session_failure(&self, message: String) {
        self.lock().session.failure(message);
        self.notify(StoreChange::Session);
    }

    /// Tear down the whole store: session gone, cached resources cleared.
    /// Used on logout and on authentication rejection; safe to call
    /// redundantly.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.session.clear();
            inner.conversations.clear();
            inner.analytics.clear();
        }
        info!("Client store reset");
        self.notify(StoreChange::Session);
        self.notify(StoreChange::Conversations);
        self.notify(StoreChange::Analytics);
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.session.clone()
    }

    pub fn session_state(&self) -> SessionState {
        self.lock().session.clone()
    }

    // -----------------------------------------------------------------
    // Conversations domain
    // -----------------------------------------------------------------

    pub fn begin_list_fetch(&self, filter: Filter) -> u64 {
        let generation = self.lock().conversations.begin_list_fetch(filter);
        self.notify(StoreChange::Conversations);
        generation
    }

    pub fn complete_list_fetch(
        &self,
        generation: u64,
        result: Result<Vec<ConversationSummary>, String>,
    ) {
        if self.lock().conversations.complete_list_fetch(generation, result) {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn begin_detail_fetch(&self) -> u64 {
        let generation = self.lock().conversations.begin_detail_fetch();
        self.notify(StoreChange::Conversations);
        generation
    }

    pub fn complete_detail_fetch(
        &self,
        generation: u64,
        result: Result<ConversationDetail, String>,
    ) {
        if self.lock().conversations.complete_detail_fetch(generation, result) {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn clear_detail(&self) {
        self.lock().conversations.clear_detail();
        self.notify(StoreChange::Conversations);
    }

    pub fn replace_summary(&self, summary: ConversationSummary) {
        if self.lock().conversations.replace_summary(summary) {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn push_provisional(
        &self,
        conversation_id: ConversationId,
        content: &str,
        sent_at: DateTime<Utc>,
    ) -> Option<u64> {
        let local_id = self
            .lock()
            .conversations
            .push_provisional(conversation_id, content, sent_at);
        if local_id.is_some() {
            self.notify(StoreChange::Conversations);
        }
        local_id
    }

    pub fn remove_provisional(&self, conversation_id: ConversationId, local_id: u64) {
        if self.lock().conversations.remove_provisional(conversation_id, local_id) {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn conversations_error(&self, message: String) {
        self.lock().conversations.error = Some(message);
        self.notify(StoreChange::Conversations);
    }

    pub fn apply_new_message(&self, conversation_id: ConversationId, message: &Message) {
        let changed = reconcile::apply_new_message(
            &mut self.lock().conversations,
            conversation_id,
            message,
        );
        if changed {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn apply_conversation_patch(&self, patch: &ConversationPatch) {
        if reconcile::apply_conversation_patch(&mut self.lock().conversations, patch) {
            self.notify(StoreChange::Conversations);
        }
    }

    pub fn conversations_state(&self) -> ConversationsState {
        self.lock().conversations.clone()
    }

    pub fn current_detail(&self) -> Option<ConversationDetail> {
        self.lock().conversations.current.clone()
    }

    // -----------------------------------------------------------------
    // Analytics domain
    // -----------------------------------------------------------------

    pub fn begin_dashboard_fetch(&self) -> u64 {
        let generation = self.lock().analytics.begin_dashboard_fetch();
        self.notify(StoreChange::Analytics);
        generation
    }

    pub fn complete_dashboard_fetch(
        &self,
        generation: u64,
        result: Result<AnalyticsSnapshot, String>,
    ) {
        if self.lock().analytics.complete_dashboard_fetch(generation, result) {
            self.notify(StoreChange::Analytics);
        }
    }

    pub fn begin_performance_fetch(&self) -> u64 {
        let generation = self.lock().analytics.begin_performance_fetch();
        self.notify(StoreChange::Analytics);
        generation
    }

    pub fn complete_performance_fetch(
        &self,
        generation: u64,
        result: Result<PerformanceMetrics, String>,
    ) {
        if self.lock().analytics.complete_performance_fetch(generation, result) {
            self.notify(StoreChange::Analytics);
        }
    }

    pub fn analytics_state(&self) -> AnalyticsState {
        self.lock().analytics.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store lock poisoned")
    }
}
