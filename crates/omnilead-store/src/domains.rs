//! Per-domain state and transition rules.
//!
//! Each resource domain (session, conversations, analytics) carries the
//! request lifecycle: `start` sets loading and clears the error, `success`
//! installs the payload, `failure` records a displayable message and leaves
//! previously fetched data in place (stale-but-present beats a blank
//! screen). Fetches are tagged with a generation number; a completion whose
//! generation is no longer current belongs to a superseded request and is
//! ignored, success or failure alike.

use chrono::{DateTime, Utc};

use omnilead_shared::models::{
    AnalyticsSnapshot, ConversationSummary, Filter, Message, PerformanceMetrics, Session,
};
use omnilead_shared::types::{ConversationId, Direction};

/// Message identity inside the client cache.
///
/// Outbound sends are recorded immediately under a local monotonic id and
/// swapped for the server id once the canonical copy arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Provisional(u64),
    Server(i64),
}

impl MessageId {
    pub fn is_provisional(&self) -> bool {
        matches!(self, MessageId::Provisional(_))
    }
}

/// One message in the open conversation's cached sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMessage {
    pub id: MessageId,
    pub direction: Direction,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl CachedMessage {
    pub fn from_server(message: &Message) -> Self {
        Self {
            id: MessageId::Server(message.id),
            direction: message.direction,
            content: message.content.clone(),
            sent_at: message.sent_at,
        }
    }
}

/// The conversation currently open in the detail view: its summary plus the
/// ordered message sequence (send time ascending, append-only while open).
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDetail {
    pub summary: ConversationSummary,
    pub messages: Vec<CachedMessage>,
}

impl ConversationDetail {
    pub fn new(summary: ConversationSummary, messages: &[Message]) -> Self {
        let mut cached: Vec<CachedMessage> =
            messages.iter().map(CachedMessage::from_server).collect();
        cached.sort_by_key(|m| m.sent_at);
        Self {
            summary,
            messages: cached,
        }
    }

    /// Insert keeping sent-time order. Messages normally arrive in order,
    /// so this is almost always a plain push.
    pub fn insert_ordered(&mut self, message: CachedMessage) {
        let pos = self
            .messages
            .iter()
            .rposition(|m| m.sent_at <= message.sent_at)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(pos, message);
    }
}

// ---------------------------------------------------------------------------
// Session domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session: Option<Session>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn success(&mut self, session: Session) {
        self.session = Some(session);
        self.loading = false;
    }

    pub fn failure(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }

    /// Drop the session entirely (logout or authentication rejection).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Conversations domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConversationsState {
    pub conversations: Vec<ConversationSummary>,
    pub current: Option<ConversationDetail>,
    pub filter: Filter,
    pub loading: bool,
    pub error: Option<String>,
    list_generation: u64,
    detail_generation: u64,
    next_provisional_id: u64,
}

impl ConversationsState {
    /// Begin a list fetch for `filter`. Returns the generation the caller
    /// must present on completion; issuing a new fetch invalidates every
    /// earlier one.
    pub fn begin_list_fetch(&mut self, filter: Filter) -> u64 {
        self.filter = filter;
        self.loading = true;
        self.error = None;
        self.list_generation += 1;
        self.list_generation
    }

    /// Apply a list fetch result. Stale generations are discarded; a fresh
    /// success replaces the whole collection (no merging with prior state).
    /// Returns whether the completion was applied.
    pub fn complete_list_fetch(
        &mut self,
        generation: u64,
        result: Result<Vec<ConversationSummary>, String>,
    ) -> bool {
        if generation != self.list_generation {
            tracing::debug!(
                generation,
                current = self.list_generation,
                "Discarding stale conversation list response"
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(conversations) => self.conversations = conversations,
            Err(message) => self.error = Some(message),
        }
        true
    }

    pub fn begin_detail_fetch(&mut self) -> u64 {
        self.loading = true;
        self.error = None;
        self.detail_generation += 1;
        self.detail_generation
    }

    pub fn complete_detail_fetch(
        &mut self,
        generation: u64,
        result: Result<ConversationDetail, String>,
    ) -> bool {
        if generation != self.detail_generation {
            tracing::debug!(
                generation,
                current = self.detail_generation,
                "Discarding stale conversation detail response"
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(detail) => self.current = Some(detail),
            Err(message) => self.error = Some(message),
        }
        true
    }

    /// Close the detail view. Bumps the detail generation so an in-flight
    /// fetch for the old conversation lands in the void.
    pub fn clear_detail(&mut self) {
        self.current = None;
        self.detail_generation += 1;
    }

    /// Replace one summary in place (targeted update-by-id fetch). Ignored
    /// when the id is not in the list.
    pub fn replace_summary(&mut self, summary: ConversationSummary) -> bool {
        match self.conversations.iter_mut().find(|c| c.id == summary.id) {
            Some(slot) => {
                if let Some(current) = &mut self.current {
                    if current.summary.id == summary.id {
                        current.summary = summary.clone();
                    }
                }
                *slot = summary;
                true
            }
            None => false,
        }
    }

    /// Record an optimistic outbound message in the open detail. Returns
    /// the provisional id, or `None` when `conversation_id` is not the open
    /// detail.
    pub fn push_provisional(
        &mut self,
        conversation_id: ConversationId,
        content: &str,
        sent_at: DateTime<Utc>,
    ) -> Option<u64> {
        let current = self.current.as_mut()?;
        if current.summary.id != conversation_id {
            return None;
        }
        self.next_provisional_id += 1;
        let local_id = self.next_provisional_id;
        current.insert_ordered(CachedMessage {
            id: MessageId::Provisional(local_id),
            direction: Direction::Outbound,
            content: content.to_string(),
            sent_at,
        });
        Some(local_id)
    }

    /// Roll back an optimistic message whose send failed.
    pub fn remove_provisional(&mut self, conversation_id: ConversationId, local_id: u64) -> bool {
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        if current.summary.id != conversation_id {
            return false;
        }
        let before = current.messages.len();
        current
            .messages
            .retain(|m| m.id != MessageId::Provisional(local_id));
        before != current.messages.len()
    }

    pub fn clear(&mut self) {
        let list_generation = self.list_generation;
        let detail_generation = self.detail_generation;
        *self = Self::default();
        // Generations survive the reset so in-flight responses from before
        // the reset still get discarded.
        self.list_generation = list_generation + 1;
        self.detail_generation = detail_generation + 1;
    }
}

// ---------------------------------------------------------------------------
// Analytics domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AnalyticsState {
    pub dashboard: Option<AnalyticsSnapshot>,
    pub performance: Option<PerformanceMetrics>,
    pub loading: bool,
    pub error: Option<String>,
    dashboard_generation: u64,
    performance_generation: u64,
}

impl AnalyticsState {
    pub fn begin_dashboard_fetch(&mut self) -> u64 {
        self.loading = true;
        self.error = None;
        self.dashboard_generation += 1;
        self.dashboard_generation
    }

    /// The snapshot is replaced wholesale, never patched incrementally.
    pub fn complete_dashboard_fetch(
        &mut self,
        generation: u64,
        result: Result<AnalyticsSnapshot, String>,
    ) -> bool {
        if generation != self.dashboard_generation {
            return false;
        }
        self.loading = false;
        match result {
            Ok(snapshot) => self.dashboard = Some(snapshot),
            Err(message) => self.error = Some(message),
        }
        true
    }

    pub fn begin_performance_fetch(&mut self) -> u64 {
        self.loading = true;
        self.error = None;
        self.performance_generation += 1;
        self.performance_generation
    }

    pub fn complete_performance_fetch(
        &mut self,
        generation: u64,
        result: Result<PerformanceMetrics, String>,
    ) -> bool {
        if generation != self.performance_generation {
            return false;
        }
        self.loading = false;
        match result {
            Ok(metrics) => self.performance = Some(metrics),
            Err(message) => self.error = Some(message),
        }
        true
    }

    pub fn clear(&mut self) {
        let dashboard_generation = self.dashboard_generation;
        let performance_generation = self.performance_generation;
        *self = Self::default();
        self.dashboard_generation = dashboard_generation + 1;
        self.performance_generation = performance_generation + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use omnilead_shared::types::{Channel, ConversationStatus};

    fn summary(id: i64) -> ConversationSummary {
        ConversationSummary {
            id: ConversationId(id),
            external_id: None,
            channel: Channel::Whatsapp,
            sender_id: format!("wa-{id}"),
            sender_name: "Ada".into(),
            message_text: "hello".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            lead_score: 10.0,
            sentiment: 0.0,
            intent: None,
            ai_confidence: 0.5,
            needs_human: false,
            assigned_to: None,
            status: ConversationStatus::Open,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn loading_is_true_strictly_between_start_and_terminal() {
        let mut state = ConversationsState::default();
        assert!(!state.loading);

        let generation = state.begin_list_fetch(Filter::default());
        assert!(state.loading);
        assert!(state.error.is_none());

        state.complete_list_fetch(generation, Ok(vec![summary(1)]));
        assert!(!state.loading);
    }

    #[test]
    fn success_replaces_collection_exactly() {
        let mut state = ConversationsState::default();
        let generation = state.begin_list_fetch(Filter::default());
        state.complete_list_fetch(generation, Ok(vec![summary(1), summary(2)]));

        // A later fetch with fewer results must not merge with prior state.
        let generation = state.begin_list_fetch(Filter::default());
        state.complete_list_fetch(generation, Ok(vec![summary(3)]));

        let ids: Vec<i64> = state.conversations.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn failure_keeps_stale_data() {
        let mut state = ConversationsState::default();
        let generation = state.begin_list_fetch(Filter::default());
        state.complete_list_fetch(generation, Ok(vec![summary(1)]));

        let generation = state.begin_list_fetch(Filter::default());
        state.complete_list_fetch(generation, Err("Server unreachable".into()));

        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.error.as_deref(), Some("Server unreachable"));
        assert!(!state.loading);
    }

    #[test]
    fn stale_generation_response_is_discarded() {
        let mut state = ConversationsState::default();

        // Fetch for {status: open} starts...
        let open_generation = state.begin_list_fetch(Filter {
            status: Some(ConversationStatus::Open),
            ..Filter::default()
        });

        // ...but the filter changes to {status: closed} before it resolves.
        let closed_generation = state.begin_list_fetch(Filter {
            status: Some(ConversationStatus::Closed),
            ..Filter::default()
        });

        // The late-arriving "open" response must be discarded.
        let applied = state.complete_list_fetch(open_generation, Ok(vec![summary(1), summary(2), summary(3)]));
        assert!(!applied);
        assert!(state.conversations.is_empty());
        assert!(state.loading);

        let applied = state.complete_list_fetch(closed_generation, Ok(vec![summary(9)]));
        assert!(applied);
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.conversations[0].id, ConversationId(9));
    }

    #[test]
    fn clear_detail_invalidates_in_flight_fetch() {
        let mut state = ConversationsState::default();
        let generation = state.begin_detail_fetch();
        state.clear_detail();

        let detail = ConversationDetail::new(summary(1), &[]);
        assert!(!state.complete_detail_fetch(generation, Ok(detail)));
        assert!(state.current.is_none());
    }

    #[test]
    fn provisional_requires_matching_open_detail() {
        let mut state = ConversationsState::default();
        let now = Utc::now();
        assert_eq!(state.push_provisional(ConversationId(1), "hi", now), None);

        let generation = state.begin_detail_fetch();
        state.complete_detail_fetch(generation, Ok(ConversationDetail::new(summary(1), &[])));

        assert_eq!(state.push_provisional(ConversationId(2), "hi", now), None);
        let local_id = state.push_provisional(ConversationId(1), "hi", now);
        assert!(local_id.is_some());
        assert_eq!(state.current.as_ref().unwrap().messages.len(), 1);
    }

    #[test]
    fn remove_provisional_rolls_back_failed_send() {
        let mut state = ConversationsState::default();
        let generation = state.begin_detail_fetch();
        state.complete_detail_fetch(generation, Ok(ConversationDetail::new(summary(1), &[])));

        let local_id = state
            .push_provisional(ConversationId(1), "hi", Utc::now())
            .unwrap();
        assert!(state.remove_provisional(ConversationId(1), local_id));
        assert!(state.current.as_ref().unwrap().messages.is_empty());
        // Second removal is a no-op.
        assert!(!state.remove_provisional(ConversationId(1), local_id));
    }

    #[test]
    fn insert_ordered_keeps_send_time_ascending() {
        let mut detail = ConversationDetail::new(summary(1), &[]);
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        for offset in [2i64, 0, 1] {
            detail.insert_ordered(CachedMessage {
                id: MessageId::Server(offset),
                direction: Direction::Inbound,
                content: format!("m{offset}"),
                sent_at: base + chrono::Duration::seconds(offset),
            });
        }

        let order: Vec<&str> = detail.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn clear_survives_generation_for_in_flight_requests() {
        let mut state = ConversationsState::default();
        let generation = state.begin_list_fetch(Filter::default());
        state.clear();

        assert!(!state.complete_list_fetch(generation, Ok(vec![summary(1)])));
        assert!(state.conversations.is_empty());
    }

    #[test]
    fn analytics_snapshot_is_replaced_wholesale() {
        let mut state = AnalyticsState::default();
        let generation = state.begin_dashboard_fetch();
        assert!(state.loading);

        let snapshot: AnalyticsSnapshot = serde_json::from_str(
            r#"{
                "total_conversations": 10,
                "conversations_by_channel": {"whatsapp": 7},
                "conversations_by_status": {"open": 4},
                "total_leads": 5,
                "leads_by_status": {"new": 5},
                "avg_response_time_hours": 1.5,
                "conversion_funnel": {
                    "conversations": 10, "leads": 5,
                    "qualified_leads": 2, "converted": 1
                }
            }"#,
        )
        .unwrap();

        assert!(state.complete_dashboard_fetch(generation, Ok(snapshot.clone())));
        assert!(!state.loading);
        assert_eq!(state.dashboard, Some(snapshot));
    }

    #[test]
    fn analytics_failure_is_domain_local() {
        let mut conversations = ConversationsState::default();
        let generation = conversations.begin_list_fetch(Filter::default());
        conversations.complete_list_fetch(generation, Ok(vec![summary(1)]));

        let mut analytics = AnalyticsState::default();
        let generation = analytics.begin_dashboard_fetch();
        analytics.complete_dashboard_fetch(generation, Err("Server error".into()));

        assert_eq!(analytics.error.as_deref(), Some("Server error"));
        // The conversations domain is untouched by an analytics failure.
        assert!(conversations.error.is_none());
        assert_eq!(conversations.conversations.len(), 1);
    }
}
