// Authenticated HTTP access to the OmniLead backend.

pub mod analytics;
pub mod auth;
pub mod client;
pub mod conversations;

pub use auth::RegisterRequest;
pub use client::{ApiClient, ApiConfig, UnauthorizedHook};
pub use conversations::Ack;
