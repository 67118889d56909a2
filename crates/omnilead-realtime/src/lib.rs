// Live update channel: a single authenticated websocket connection with a
// typed publish/subscribe surface on top.

pub mod bus;
pub mod channel;
pub mod state;
pub mod wire;

pub use bus::{EventBus, EventName, RealtimeEvent, Subscription};
pub use channel::{ChannelCommand, RealtimeChannel, RealtimeError};
pub use state::ConnectionState;
pub use wire::{ClientFrame, ServerFrame};
