// Shared domain types for the OmniLead dashboard client.

pub mod constants;
pub mod error;
pub mod models;
pub mod types;

pub use error::{ApiError, Result};
pub use models::{
    AgentPerformance, AnalyticsSnapshot, ConversationPatch, ConversationSummary,
    ConversionFunnel, Filter, Message, PerformanceMetrics, Session, TokenResponse, User,
};
pub use types::{Channel, ConversationId, ConversationStatus, Direction, ExportFormat, UserId};
