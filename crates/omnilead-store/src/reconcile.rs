//! Push-event reconciliation: merging live updates into cached state
//! without a full refetch.
//!
//! Events referencing conversations the client has never seen are dropped;
//! the next full list refresh picks them up. A refresh response racing a
//! push event is last-write-wins by completion order; accepted behavior,
//! not a defect.

use tracing::debug;

use omnilead_shared::constants::PROVISIONAL_MATCH_WINDOW_SECS;
use omnilead_shared::models::{ConversationPatch, Message};
use omnilead_shared::types::{ConversationId, Direction};

use crate::domains::{CachedMessage, ConversationsState, MessageId};

/// Apply a `new_message` push event.
///
/// If the conversation is the open detail, the message is appended in send
/// order, unless it confirms an optimistic outbound send (same direction
/// and content, sent within [`PROVISIONAL_MATCH_WINDOW_SECS`]), in which
/// case the provisional entry is replaced in place rather than duplicated.
/// The matching list summary's last-message fields are refreshed either
/// way. Returns whether anything changed.
pub fn apply_new_message(
    state: &mut ConversationsState,
    conversation_id: ConversationId,
    message: &Message,
) -> bool {
    let mut changed = false;

    if let Some(current) = state.current.as_mut() {
        if current.summary.id == conversation_id {
            match find_provisional_match(&current.messages, message) {
                Some(index) => {
                    debug!(
                        conversation = %conversation_id,
                        server_id = message.id,
                        "Confirming optimistic message"
                    );
                    current.messages[index] = CachedMessage::from_server(message);
                }
                None => current.insert_ordered(CachedMessage::from_server(message)),
            }
            changed = true;
        }
    }

    if let Some(summary) = state
        .conversations
        .iter_mut()
        .find(|c| c.id == conversation_id)
    {
        summary.message_text = message.content.clone();
        summary.timestamp = message.sent_at;
        changed = true;
    }

    if !changed {
        debug!(conversation = %conversation_id, "new_message for unknown conversation dropped");
    }
    changed
}

/// Apply a `conversation_updated` push event: fields present in the patch
/// overwrite the cached summary, everything else is preserved. Unknown ids
/// are ignored: the client has no list-ordering context for them, so no
/// synthetic insert happens.
pub fn apply_conversation_patch(state: &mut ConversationsState, patch: &ConversationPatch) -> bool {
    let mut changed = false;

    if let Some(summary) = state.conversations.iter_mut().find(|c| c.id == patch.id) {
        summary.apply_patch(patch);
        changed = true;
    }

    if let Some(current) = state.current.as_mut() {
        if current.summary.id == patch.id {
            current.summary.apply_patch(patch);
            changed = true;
        }
    }

    if !changed {
        debug!(conversation = %patch.id, "conversation_updated for unknown conversation dropped");
    }
    changed
}

/// Locate a provisional outbound entry equivalent to the incoming server
/// copy. The backend echoes no correlation id, so equivalence is direction
/// + content + timestamp proximity; the tolerance window is deliberately
/// small so two identical sends a few seconds apart stay distinct.
fn find_provisional_match(messages: &[CachedMessage], incoming: &Message) -> Option<usize> {
    if incoming.direction != Direction::Outbound {
        return None;
    }
    messages.iter().position(|m| {
        m.id.is_provisional()
            && m.direction == incoming.direction
            && m.content == incoming.content
            && (m.sent_at - incoming.sent_at)
                .num_seconds()
                .abs()
                <= PROVISIONAL_MATCH_WINDOW_SECS
    })
}
