//! Analytics endpoints: dashboard snapshot, per-agent metrics, exports.

use tracing::debug;

use omnilead_shared::error::Result;
use omnilead_shared::models::{AnalyticsSnapshot, PerformanceMetrics};
use omnilead_shared::types::ExportFormat;

use crate::client::ApiClient;

impl ApiClient {
    /// Fetch the aggregate dashboard for the last `days` days (backend
    /// default when `None`).
    pub async fn analytics_dashboard(&self, days: Option<u32>) -> Result<AnalyticsSnapshot> {
        let query = match days {
            Some(days) => vec![("days", days.to_string())],
            None => Vec::new(),
        };
        self.get_json("/api/analytics/dashboard", &query).await
    }

    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics> {
        self.get_json("/api/analytics/performance", &[]).await
    }

    /// Download an analytics report as raw bytes. Writing the file is the
    /// caller's side effect; nothing here touches client state.
    pub async fn export_analytics(
        &self,
        format: ExportFormat,
        days: Option<u32>,
    ) -> Result<Vec<u8>> {
        let query = match days {
            Some(days) => vec![("days", days.to_string())],
            None => Vec::new(),
        };
        debug!(%format, ?days, "Requesting analytics export");
        self.get_bytes(&format!("/api/analytics/export/{format}"), &query)
            .await
    }
}
