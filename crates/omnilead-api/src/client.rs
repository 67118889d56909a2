//! HTTP transport with single-point error classification.
//!
//! Every backend call goes through the helpers here, so the bearer header,
//! the 401 session-teardown hook and the error taxonomy are applied in one
//! place. Resource endpoints live in the sibling modules as `impl ApiClient`
//! blocks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use omnilead_shared::constants::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use omnilead_shared::error::{flatten_field_errors, ApiError, FieldError, Result};

/// Callback invoked once per authentication-rejected response, after the
/// stored credential has been cleared. The application wires session
/// teardown and navigation here.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Thin wrapper around `reqwest::Client` holding the current access
/// credential. Cheap to clone; clones share the credential slot and hook.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credential: Arc<Mutex<Option<String>>>,
    on_unauthorized: Arc<Mutex<Option<UnauthorizedHook>>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> std::result::Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential: Arc::new(Mutex::new(None)),
            on_unauthorized: Arc::new(Mutex::new(None)),
        })
    }

    /// Replace the access credential attached to subsequent requests.
    pub fn set_credential(&self, credential: Option<String>) {
        *self.credential.lock().expect("credential lock poisoned") = credential;
    }

    pub fn credential(&self) -> Option<String> {
        self.credential.lock().expect("credential lock poisoned").clone()
    }

    /// Register the hook run on every 401-equivalent response. Replaces any
    /// previously registered hook.
    pub fn set_unauthorized_hook(&self, hook: UnauthorizedHook) {
        *self.on_unauthorized.lock().expect("hook lock poisoned") = Some(hook);
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // -----------------------------------------------------------------
    // Request helpers
    // -----------------------------------------------------------------

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.http.get(self.url(path)).query(query);
        if let Some(token) = self.credential() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport_error)?;
        self.decode_json(response).await
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = self.credential() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport_error)?;
        self.decode_json(response).await
    }

    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self.http.post(self.url(path)).form(form);
        if let Some(token) = self.credential() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport_error)?;
        self.decode_json(response).await
    }

    pub(crate) async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>> {
        let mut request = self.http.get(self.url(path)).query(query);
        if let Some(token) = self.credential() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status, &body));
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn decode_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(self.classify_failure(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(status = %status, error = %e, "Failed to decode response body");
            ApiError::Unknown(format!("Unexpected response from server: {e}"))
        })
    }

    /// Map a non-success response to the error taxonomy. Runs exactly once
    /// per failed request; call sites never re-classify.
    pub(crate) fn classify_failure(&self, status: StatusCode, body: &str) -> ApiError {
        match status {
            StatusCode::UNAUTHORIZED => {
                self.set_credential(None);
                let hook = self.on_unauthorized.lock().expect("hook lock poisoned").clone();
                if let Some(hook) = hook {
                    debug!("401 received, running unauthorized hook");
                    hook();
                }
                ApiError::Unauthorized
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                ApiError::ValidationFailed(flatten_validation_body(body))
            }
            status if status.is_server_error() => ApiError::ServerFault,
            status => ApiError::Unknown(detail_message(body).unwrap_or_else(|| {
                format!("Request failed with status {}", status.as_u16())
            })),
        }
    }
}

/// Classify a transport-level failure: no response at all is Unreachable,
/// anything else is passed through.
fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() {
        ApiError::Unreachable
    } else {
        ApiError::Unknown(err.to_string())
    }
}

/// Pull `detail` out of an error body, whether it is a plain string or a
/// structured field-error list.
fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn flatten_validation_body(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ValidationBody {
        detail: serde_json::Value,
    }

    let Ok(parsed) = serde_json::from_str::<ValidationBody>(body) else {
        return "Invalid request".to_string();
    };

    match parsed.detail {
        serde_json::Value::String(message) => message,
        detail => match serde_json::from_value::<Vec<FieldError>>(detail) {
            Ok(errors) => flatten_field_errors(&errors),
            Err(_) => "Invalid request".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> ApiClient {
        ApiClient::new(ApiConfig::default()).expect("client should build")
    }

    #[test]
    fn unauthorized_clears_credential_and_fires_hook() {
        let client = client();
        client.set_credential(Some("T1".into()));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        client.set_unauthorized_hook(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let err = client.classify_failure(StatusCode::UNAUTHORIZED, r#"{"detail": "expired"}"#);

        assert_eq!(err, ApiError::Unauthorized);
        assert_eq!(client.credential(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn validation_body_is_flattened() {
        let client = client();
        let body = r#"{"detail": [
            {"loc": ["body", "content"], "msg": ""},
            {"loc": ["body", "user_id"], "msg": "value is not a valid integer"}
        ]}"#;

        let err = client.classify_failure(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(
            err,
            ApiError::ValidationFailed(
                "content is required; user_id: value is not a valid integer".into()
            )
        );
    }

    #[test]
    fn validation_string_detail_passes_through() {
        let client = client();
        let err = client.classify_failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": "content must not be empty"}"#,
        );
        assert_eq!(
            err,
            ApiError::ValidationFailed("content must not be empty".into())
        );
    }

    #[test]
    fn server_errors_become_server_fault() {
        let client = client();
        let err = client.classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err, ApiError::ServerFault);
        let err = client.classify_failure(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err, ApiError::ServerFault);
    }

    #[test]
    fn other_statuses_pass_detail_through() {
        let client = client();
        let err = client.classify_failure(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Conversation not found"}"#,
        );
        assert_eq!(err, ApiError::Unknown("Conversation not found".into()));

        let err = client.classify_failure(StatusCode::IM_A_TEAPOT, "not json");
        assert_eq!(err, ApiError::Unknown("Request failed with status 418".into()));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new(ApiConfig {
            base_url: "http://localhost:8000/".into(),
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/api/auth/me"), "http://localhost:8000/api/auth/me");
    }
}
