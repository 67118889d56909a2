//! JSON frames exchanged over the realtime socket.

use serde::{Deserialize, Serialize};

use omnilead_shared::models::{ConversationPatch, Message};
use omnilead_shared::types::ConversationId;

/// Frames sent by the client. Authentication happens once, immediately
/// after the websocket handshake; join/leave scope which conversations'
/// message streams the server pushes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth { token: String },
    JoinConversation { conversation_id: ConversationId },
    LeaveConversation { conversation_id: ConversationId },
}

/// Server-initiated push frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    NewMessage {
        conversation_id: ConversationId,
        message: Message,
    },
    ConversationUpdated {
        conversation: ConversationPatch,
    },
}
