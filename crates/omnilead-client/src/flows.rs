//! User-facing flows: each function drives one interaction end to end,
//! sequencing API calls, store transitions and realtime membership.
//!
//! Flows report failures both ways: the store gets a user-facing error
//! string, the caller gets the typed [`omnilead_shared::error::ApiError`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use omnilead_api::RegisterRequest;
use omnilead_shared::constants::{DEFAULT_ANALYTICS_DAYS, DEFAULT_PAGE_LIMIT};
use omnilead_shared::error::{ApiError, Result};
use omnilead_shared::models::{Filter, Session};
use omnilead_shared::types::{ConversationId, ExportFormat, UserId};
use omnilead_store::ConversationDetail;

use crate::context::{session_teardown, AppContext};
use crate::export;

/// Exchange credentials for a session. The token is persisted and attached
/// to the API client only once the whole flow has succeeded, so a failed
/// identity fetch never leaves a half-authenticated client behind.
pub async fn login(ctx: &AppContext, username: &str, password: &str) -> Result<()> {
    ctx.store.session_start();

    let token = match ctx.api.login(username, password).await {
        Ok(token) => token,
        Err(e) => {
            ctx.store.session_failure(e.to_string());
            return Err(e);
        }
    };
    ctx.api.set_credential(Some(token.access_token.clone()));

    let user = match ctx.api.current_user().await {
        Ok(user) => user,
        Err(e) => {
            ctx.api.set_credential(None);
            ctx.store.session_failure(e.to_string());
            return Err(e);
        }
    };

    if let Err(e) = ctx.credentials.save(&token.access_token) {
        // The session still works for this run; it just will not survive a
        // restart.
        warn!(error = %e, "Failed to persist credential");
    }

    ctx.store
        .session_success(Session::from_user(&user, token.access_token.clone()));
    info!(user = %user.email, "Login flow completed");

    if let Err(e) = ctx.realtime.connect(&token.access_token).await {
        // Live updates degrade gracefully; the session itself stands.
        warn!(error = %e, "Realtime connect failed after login");
    }
    Ok(())
}

/// Create an account and continue straight into the login steps.
pub async fn register(
    ctx: &AppContext,
    email: &str,
    password: &str,
    full_name: &str,
    role: &str,
) -> Result<()> {
    ctx.store.session_start();

    let request = RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        full_name: full_name.to_string(),
        role: role.to_string(),
    };
    let token = match ctx.api.register(&request).await {
        Ok(token) => token,
        Err(e) => {
            ctx.store.session_failure(e.to_string());
            return Err(e);
        }
    };
    ctx.api.set_credential(Some(token.access_token.clone()));

    let user = match ctx.api.current_user().await {
        Ok(user) => user,
        Err(e) => {
            ctx.api.set_credential(None);
            ctx.store.session_failure(e.to_string());
            return Err(e);
        }
    };

    if let Err(e) = ctx.credentials.save(&token.access_token) {
        warn!(error = %e, "Failed to persist credential");
    }

    ctx.store
        .session_success(Session::from_user(&user, token.access_token.clone()));
    info!(user = %user.email, "Registration flow completed");

    if let Err(e) = ctx.realtime.connect(&token.access_token).await {
        warn!(error = %e, "Realtime connect failed after registration");
    }
    Ok(())
}

/// Resume the session persisted by a previous run, if any. A missing or
/// rejected credential leaves the client signed out without an error
/// banner.
pub async fn restore_session(ctx: &AppContext) -> Result<bool> {
    let Some(token) = ctx.credentials.load().map_err(|e| {
        ApiError::Unknown(format!("Could not read persisted credential: {e}"))
    })?
    else {
        return Ok(false);
    };

    ctx.api.set_credential(Some(token.clone()));
    ctx.store.session_start();

    match ctx.api.current_user().await {
        Ok(user) => {
            ctx.store.session_success(Session::from_user(&user, token.clone()));
            info!(user = %user.email, "Session restored");
            if let Err(e) = ctx.realtime.connect(&token).await {
                warn!(error = %e, "Realtime connect failed after restore");
            }
            Ok(true)
        }
        Err(ApiError::Unauthorized) => {
            // The 401 hook has already torn the session down; just leave
            // the signed-out state clean.
            ctx.store.reset();
            Ok(false)
        }
        Err(e) => {
            ctx.store.session_failure(e.to_string());
            Err(e)
        }
    }
}

/// Sign out. Safe to call in any state.
pub fn logout(ctx: &AppContext) {
    session_teardown(&ctx.credentials, &ctx.store, &ctx.realtime);
    ctx.api.set_credential(None);
}

/// Refresh the conversation list under `filter`. A response that arrives
/// after a newer fetch started is discarded by the store.
pub async fn load_conversations(ctx: &AppContext, filter: Filter) -> Result<()> {
    let generation = ctx.store.begin_list_fetch(filter);
    let result = ctx
        .api
        .list_conversations(&filter, None, Some(DEFAULT_PAGE_LIMIT))
        .await;
    match result {
        Ok(conversations) => {
            ctx.store.complete_list_fetch(generation, Ok(conversations));
            Ok(())
        }
        Err(e) => {
            ctx.store.complete_list_fetch(generation, Err(e.to_string()));
            Err(e)
        }
    }
}

/// Open a conversation: fetch its summary and messages, then join its push
/// stream.
pub async fn open_conversation(ctx: &AppContext, id: ConversationId) -> Result<()> {
    let generation = ctx.store.begin_detail_fetch();

    let detail: Result<ConversationDetail> = async {
        let summary = ctx.api.get_conversation(id).await?;
        let messages = ctx.api.get_messages(id).await?;
        Ok(ConversationDetail::new(summary, &messages))
    }
    .await;

    match detail {
        Ok(detail) => {
            ctx.store.complete_detail_fetch(generation, Ok(detail));
            ctx.realtime.join(id).await;
            Ok(())
        }
        Err(e) => {
            ctx.store.complete_detail_fetch(generation, Err(e.to_string()));
            Err(e)
        }
    }
}

/// Close the open conversation and leave its push stream.
pub async fn close_conversation(ctx: &AppContext, id: ConversationId) {
    ctx.realtime.leave(id).await;
    ctx.store.clear_detail();
}

/// Send an outbound reply optimistically: the message appears in the open
/// detail immediately and is either confirmed by the later push event or
/// rolled back when the request fails.
pub async fn send_reply(ctx: &AppContext, id: ConversationId, content: &str) -> Result<()> {
    let sent_at = Utc::now();
    let provisional = ctx.store.push_provisional(id, content, sent_at);

    match ctx.api.send_reply(id, content).await {
        Ok(ack) => {
            info!(conversation = %id, ack = %ack.message, "Reply accepted");
            Ok(())
        }
        Err(e) => {
            if let Some(local_id) = provisional {
                ctx.store.remove_provisional(id, local_id);
            }
            ctx.store.conversations_error(e.to_string());
            Err(e)
        }
    }
}

/// Assign a conversation to an agent, then refresh that one summary so the
/// list reflects the change without waiting for a push.
pub async fn assign_conversation(
    ctx: &AppContext,
    id: ConversationId,
    user_id: UserId,
) -> Result<()> {
    ctx.api.assign_conversation(id, user_id).await?;

    match ctx.api.get_conversation(id).await {
        Ok(summary) => ctx.store.replace_summary(summary),
        // The assignment itself stood; the refresh is best-effort.
        Err(e) => warn!(conversation = %id, error = %e, "Post-assign refresh failed"),
    }
    Ok(())
}

/// Refresh the aggregate dashboard for the last `days` days (30 when
/// unspecified).
pub async fn load_dashboard(ctx: &AppContext, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
    let generation = ctx.store.begin_dashboard_fetch();
    match ctx.api.analytics_dashboard(Some(days)).await {
        Ok(snapshot) => {
            ctx.store.complete_dashboard_fetch(generation, Ok(snapshot));
            Ok(())
        }
        Err(e) => {
            ctx.store.complete_dashboard_fetch(generation, Err(e.to_string()));
            Err(e)
        }
    }
}

/// Refresh the per-agent performance metrics.
pub async fn load_performance(ctx: &AppContext) -> Result<()> {
    let generation = ctx.store.begin_performance_fetch();
    match ctx.api.performance_metrics().await {
        Ok(metrics) => {
            ctx.store.complete_performance_fetch(generation, Ok(metrics));
            Ok(())
        }
        Err(e) => {
            ctx.store.complete_performance_fetch(generation, Err(e.to_string()));
            Err(e)
        }
    }
}

/// Download an analytics report and write it into `dir`. Pure side effect:
/// no store state changes on success or failure.
pub async fn export_analytics(
    ctx: &AppContext,
    format: ExportFormat,
    days: u32,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let bytes = ctx.api.export_analytics(format, Some(days)).await?;
    let path = export::write_report(dir, format, days, &bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::config::ClientConfig;
    use crate::context::AppContext;

    type Route = (&'static str, &'static str, u16, &'static str);

    /// Minimal localhost backend: canned JSON per (method, path), every
    /// request recorded for assertions.
    struct StubServer {
        addr: std::net::SocketAddr,
        requests: Arc<Mutex<Vec<(String, String, String)>>>,
    }

    impl StubServer {
        async fn start(routes: Vec<Route>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests: Arc<Mutex<Vec<(String, String, String)>>> =
                Arc::new(Mutex::new(Vec::new()));
            let log = requests.clone();

            tokio::spawn(async move {
                loop {
                    let Ok((mut stream, _)) = listener.accept().await else {
                        break;
                    };
                    let routes = routes.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let (method, path, body) = read_request(&mut stream).await;
                        log.lock().unwrap().push((method.clone(), path.clone(), body));

                        let (status, reply) = routes
                            .iter()
                            .find(|(m, p, _, _)| *m == method && *p == path)
                            .map(|(_, _, s, b)| (*s, *b))
                            .unwrap_or((404, r#"{"detail":"Not found"}"#));
                        let response = format!(
                            "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\n\
                             content-length: {}\r\nconnection: close\r\n\r\n{reply}",
                            reply.len()
                        );
                        let _ = stream.write_all(response.as_bytes()).await;
                    });
                }
            });

            Self { addr, requests }
        }

        fn base_url(&self) -> String {
            format!("http://{}", self.addr)
        }

        fn request_body(&self, method: &str, path: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .find(|(m, p, _)| m == method && p == path)
                .map(|(_, _, body)| body.clone())
        }
    }

    async fn read_request(stream: &mut TcpStream) -> (String, String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break buf.len(),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();
        let content_length: usize = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
        (method, path, body)
    }

    /// Websocket endpoint that completes the handshake and records the
    /// first text frame it receives.
    async fn spawn_ws_recorder() -> (std::net::SocketAddr, Arc<Mutex<Option<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let first_frame: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let recorded = first_frame.clone();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            if let Some(Ok(WsMessage::Text(text))) = ws.next().await {
                *recorded.lock().unwrap() = Some(text);
            }
            while let Some(Ok(_)) = ws.next().await {}
        });

        (addr, first_frame)
    }

    const TOKEN_BODY: &str = r#"{"access_token":"T1","token_type":"bearer"}"#;
    const USER_BODY: &str = r#"{
        "id": 1, "email": "a@b.com", "full_name": "Ada",
        "role": "agent", "is_active": true
    }"#;

    #[tokio::test]
    async fn login_builds_session_and_hands_token_to_realtime() {
        let server = StubServer::start(vec![
            ("POST", "/api/auth/login", 200, TOKEN_BODY),
            ("GET", "/api/auth/me", 200, USER_BODY),
        ])
        .await;
        let (ws_addr, auth_frame) = spawn_ws_recorder().await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(ClientConfig {
            api_base_url: server.base_url(),
            realtime_url: format!("ws://{ws_addr}"),
            data_dir: Some(dir.path().to_path_buf()),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        login(&ctx, "a@b.com", "pw").await.unwrap();

        // Session built from the fetched user, credential attached and
        // persisted, realtime up.
        let session = ctx.store.session().unwrap();
        assert_eq!(session.user_id, UserId(1));
        assert_eq!(session.display_name, "Ada");
        assert_eq!(session.access_credential, "T1");
        assert_eq!(ctx.api.credential().as_deref(), Some("T1"));
        assert_eq!(ctx.credentials.load().unwrap().as_deref(), Some("T1"));
        assert!(ctx.realtime.state().is_connected());

        // The backend saw a form-encoded credential exchange.
        let login_body = server.request_body("POST", "/api/auth/login").unwrap();
        assert!(login_body.contains("username=a%40b.com"), "{login_body}");
        assert!(login_body.contains("password=pw"), "{login_body}");

        // The auth frame carried the freshly issued token.
        let mut frame = None;
        for _ in 0..100 {
            frame = auth_frame.lock().unwrap().clone();
            if frame.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(frame.as_deref(), Some(r#"{"type":"auth","token":"T1"}"#));

        ctx.shutdown();
    }

    #[tokio::test]
    async fn failed_identity_fetch_rolls_back_credential() {
        let server = StubServer::start(vec![
            ("POST", "/api/auth/login", 200, TOKEN_BODY),
            ("GET", "/api/auth/me", 500, r#"{"detail":"boom"}"#),
        ])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(ClientConfig {
            api_base_url: server.base_url(),
            realtime_url: "ws://127.0.0.1:9".into(),
            data_dir: Some(dir.path().to_path_buf()),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = login(&ctx, "a@b.com", "pw").await.unwrap_err();
        assert_eq!(err, ApiError::ServerFault);

        // No half-authenticated client left behind.
        assert_eq!(ctx.api.credential(), None);
        assert_eq!(ctx.credentials.load().unwrap(), None);
        assert!(ctx.store.session().is_none());
        let state = ctx.store.session_state();
        assert!(!state.loading);
        assert!(state.error.is_some());
        assert!(!ctx.realtime.state().is_connected());
    }

    #[tokio::test]
    async fn rejected_credential_during_login_reports_failure() {
        let server = StubServer::start(vec![(
            "POST",
            "/api/auth/login",
            401,
            r#"{"detail":"Incorrect username or password"}"#,
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(ClientConfig {
            api_base_url: server.base_url(),
            realtime_url: "ws://127.0.0.1:9".into(),
            data_dir: Some(dir.path().to_path_buf()),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = login(&ctx, "a@b.com", "wrong").await.unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
        assert!(ctx.store.session().is_none());
        assert_eq!(
            ctx.store.session_state().error.as_deref(),
            Some("Authentication rejected")
        );
    }
}
