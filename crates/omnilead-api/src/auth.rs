//! Auth endpoints: credential exchange and current-user lookup.

use serde::Serialize;
use tracing::info;

use omnilead_shared::error::Result;
use omnilead_shared::models::{TokenResponse, User};

use crate::client::ApiClient;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

impl ApiClient {
    /// Exchange username/password for an access token.
    ///
    /// The backend expects a form-encoded body. The returned token is NOT
    /// stored automatically; the login flow persists it and calls
    /// [`ApiClient::set_credential`] once the whole flow succeeds.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let token: TokenResponse = self
            .post_form("/api/auth/login", &[("username", username), ("password", password)])
            .await?;
        info!(username, "Login accepted");
        Ok(token)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse> {
        let token: TokenResponse = self.post_json("/api/auth/register", request).await?;
        info!(email = %request.email, "Registration accepted");
        Ok(token)
    }

    /// Fetch the account behind the current credential.
    pub async fn current_user(&self) -> Result<User> {
        self.get_json("/api/auth/me", &[]).await
    }
}
