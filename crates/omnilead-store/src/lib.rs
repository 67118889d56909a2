// In-memory, observable cache of the three server resource domains, with
// pure transition rules and push-event reconciliation.

pub mod domains;
pub mod reconcile;
pub mod store;

pub use domains::{
    AnalyticsState, CachedMessage, ConversationDetail, ConversationsState, MessageId,
    SessionState,
};
pub use store::{ClientStore, StoreChange};
