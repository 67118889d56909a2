//! Conversation endpoints: list, detail, messages, assignment, replies.

use serde::{Deserialize, Serialize};
use tracing::debug;

use omnilead_shared::error::Result;
use omnilead_shared::models::{ConversationSummary, Filter, Message};
use omnilead_shared::types::{ConversationId, UserId};

use crate::client::ApiClient;

/// Plain acknowledgement body (`{"message": "..."}`) returned by the
/// mutation endpoints. The canonical data arrives via push events or a
/// subsequent fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
struct AssignRequest {
    user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
struct ReplyRequest<'a> {
    content: &'a str,
}

impl ApiClient {
    /// Fetch the conversation list, optionally filtered and paginated.
    pub async fn list_conversations(
        &self,
        filter: &Filter,
        skip: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<ConversationSummary>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(channel) = filter.channel {
            query.push(("channel", channel.to_string()));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }
        if let Some(skip) = skip {
            query.push(("skip", skip.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        debug!(?filter, "Fetching conversation list");
        self.get_json("/api/conversations/", &query).await
    }

    pub async fn get_conversation(&self, id: ConversationId) -> Result<ConversationSummary> {
        self.get_json(&format!("/api/conversations/{id}"), &[]).await
    }

    /// Fetch a conversation's messages, ordered by send time ascending.
    pub async fn get_messages(&self, id: ConversationId) -> Result<Vec<Message>> {
        self.get_json(&format!("/api/conversations/{id}/messages"), &[])
            .await
    }

    pub async fn assign_conversation(&self, id: ConversationId, user_id: UserId) -> Result<Ack> {
        self.post_json(
            &format!("/api/conversations/{id}/assign"),
            &AssignRequest { user_id },
        )
        .await
    }

    /// Send an outbound reply. The server acknowledges with a message
    /// string; the persisted copy is delivered later as a `new_message`
    /// push event.
    pub async fn send_reply(&self, id: ConversationId, content: &str) -> Result<Ack> {
        self.post_json(&format!("/api/conversations/{id}/reply"), &ReplyRequest { content })
            .await
    }
}
