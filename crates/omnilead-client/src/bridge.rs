//! Forwards realtime push events into the client store.
//!
//! Registered once when the context is built and removed on shutdown, so
//! no handlers leak across logout/login cycles. The handlers run on the
//! socket task, in server-delivery order.

use std::sync::Arc;

use tracing::info;

use omnilead_realtime::{EventName, RealtimeChannel, RealtimeEvent, Subscription};
use omnilead_store::ClientStore;

/// Wire `new_message` and `conversation_updated` pushes into the store's
/// reconciliation rules. Returns the handles needed to unregister.
pub fn register_store_bridge(
    store: Arc<ClientStore>,
    channel: &RealtimeChannel,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    let message_store = store.clone();
    subscriptions.push(channel.bus().subscribe(EventName::NewMessage, move |event| {
        if let RealtimeEvent::NewMessage {
            conversation_id,
            message,
        } = event
        {
            message_store.apply_new_message(*conversation_id, message);
        }
    }));

    let patch_store = store;
    subscriptions.push(
        channel
            .bus()
            .subscribe(EventName::ConversationUpdated, move |event| {
                if let RealtimeEvent::ConversationUpdated(patch) = event {
                    patch_store.apply_conversation_patch(patch);
                }
            }),
    );

    info!("Realtime store bridge registered");
    subscriptions
}

pub fn remove_store_bridge(channel: &RealtimeChannel, subscriptions: Vec<Subscription>) {
    for subscription in subscriptions {
        channel.bus().unsubscribe(subscription);
    }
}
