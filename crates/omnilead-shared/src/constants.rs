/// Default backend REST base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default realtime websocket endpoint.
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:8000/ws";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default page size for conversation list requests (matches the backend's
/// own default).
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Default reporting period for analytics requests, in days.
pub const DEFAULT_ANALYTICS_DAYS: u32 = 30;

/// Tolerance window for matching an optimistic outbound message against the
/// server's canonical copy, in seconds. The backend does not echo a
/// correlation id, so the match is content + direction + timestamp proximity.
pub const PROVISIONAL_MATCH_WINDOW_SECS: i64 = 5;
