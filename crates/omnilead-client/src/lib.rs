// Application layer of the OmniLead dashboard client: context wiring,
// credential persistence, user flows and the realtime-to-store bridge.

pub mod bridge;
pub mod config;
pub mod context;
pub mod credentials;
pub mod export;
pub mod flows;
pub mod logging;

pub use config::ClientConfig;
pub use context::AppContext;
pub use credentials::{CredentialError, CredentialStore};
