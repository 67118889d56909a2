use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, ConversationId, ConversationStatus, Direction, UserId};

/// Account record returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Credential exchange result from `POST /api/auth/login` / `register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// The authenticated identity bound to the running client.
///
/// At most one exists per client instance. Built after login once the
/// current user has been fetched, destroyed on logout or on any
/// authentication-rejected response.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: String,
    pub role: String,
    pub access_credential: String,
}

impl Session {
    pub fn from_user(user: &User, access_credential: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            display_name: user.full_name.clone(),
            role: user.role.clone(),
            access_credential: access_credential.into(),
        }
    }
}

/// One conversation as it appears in the list view.
///
/// `timestamp` and `message_text` track the most recent message; the AI
/// triage fields (`lead_score`, `sentiment`, `intent`, `ai_confidence`,
/// `needs_human`) are computed server-side and only displayed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub external_id: Option<String>,
    pub channel: Channel,
    pub sender_id: String,
    pub sender_name: String,
    pub message_text: String,
    pub timestamp: DateTime<Utc>,
    pub lead_score: f64,
    pub sentiment: f64,
    #[serde(default)]
    pub intent: Option<String>,
    pub ai_confidence: f64,
    pub needs_human: bool,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Overwrite the fields present in `patch`, leaving the rest untouched.
    pub fn apply_patch(&mut self, patch: &ConversationPatch) {
        if let Some(text) = &patch.message_text {
            self.message_text = text.clone();
        }
        if let Some(ts) = patch.timestamp {
            self.timestamp = ts;
        }
        if let Some(score) = patch.lead_score {
            self.lead_score = score;
        }
        if let Some(sentiment) = patch.sentiment {
            self.sentiment = sentiment;
        }
        if let Some(intent) = &patch.intent {
            self.intent = Some(intent.clone());
        }
        if let Some(confidence) = patch.ai_confidence {
            self.ai_confidence = confidence;
        }
        if let Some(needs_human) = patch.needs_human {
            self.needs_human = needs_human;
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

/// Partial conversation delivered by a `conversation_updated` push event.
///
/// Absent fields mean "unchanged". The id must reference a conversation the
/// client already holds; patches for unknown ids are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationPatch {
    pub id: ConversationId,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lead_score: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    #[serde(default)]
    pub needs_human: Option<bool>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One message inside a conversation, as the backend serializes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub direction: Direction,
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Lead conversion funnel counters.
///
/// The backend guarantees conversations ≥ leads ≥ qualified_leads ≥
/// converted; the client only displays the numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConversionFunnel {
    pub conversations: u64,
    pub leads: u64,
    pub qualified_leads: u64,
    pub converted: u64,
}

impl ConversionFunnel {
    pub fn is_monotonic(&self) -> bool {
        self.conversations >= self.leads
            && self.leads >= self.qualified_leads
            && self.qualified_leads >= self.converted
    }
}

/// Aggregate dashboard counters from `GET /api/analytics/dashboard`.
///
/// Read-only on the client: replaced wholesale on each fetch, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    pub total_conversations: u64,
    pub conversations_by_channel: HashMap<String, u64>,
    pub conversations_by_status: HashMap<String, u64>,
    pub total_leads: u64,
    pub leads_by_status: HashMap<String, u64>,
    pub avg_response_time_hours: f64,
    pub conversion_funnel: ConversionFunnel,
}

/// Per-agent metrics from `GET /api/analytics/performance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub agent_performance: Vec<AgentPerformance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentPerformance {
    pub agent: String,
    pub conversations_handled: u64,
    pub avg_lead_score: f64,
}

/// Conversation list filter, owned by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    pub channel: Option<Channel>,
    pub status: Option<ConversationStatus>,
}
