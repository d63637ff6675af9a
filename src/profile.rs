//! External profile-picture updates.
//!
//! The pipeline only needs an opaque "set the avatar to this mood's image"
//! action with a success/failure outcome, so the HTTP client sits behind
//! the [`ProfileUpdater`] trait and tests substitute stubs. Failures are
//! split into two kinds: an expired session (worth one transparent
//! re-auth + retry, the gate reservation stands) and everything else.

use crate::config::ProfileConfig;
use crate::mood::MoodLabel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Failure kinds for the external update action.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    /// Session expired. The caller may re-auth and retry the action once
    /// without re-running the gate check.
    #[error("profile session expired, re-authentication required")]
    NeedsReauth,
    /// Any other failure. The update is reported failed and the gate slot
    /// is not consumed.
    #[error("profile update failed: {0}")]
    Other(String),
}

/// Opaque external profile-update action.
#[async_trait]
pub trait ProfileUpdater: Send + Sync {
    /// Push the image configured for `mood` to the external profile.
    async fn apply(&self, mood: MoodLabel) -> Result<(), ProfileError>;

    /// Re-establish the session after [`ProfileError::NeedsReauth`].
    async fn reauth(&self) -> Result<(), ProfileError>;
}

/// HTTP avatar client: session login plus a multipart avatar upload.
pub struct HttpProfileUpdater {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    images: HashMap<MoodLabel, PathBuf>,
    session_token: Mutex<Option<String>>,
}

impl HttpProfileUpdater {
    #[must_use]
    pub fn new(config: &ProfileConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            username: config.username.clone(),
            password: config.password.clone(),
            images: config.images.clone(),
            session_token: Mutex::new(None),
        }
    }

    async fn login(&self) -> Result<String, ProfileError> {
        let response = self
            .client
            .post(format!("{}/api/v1/session", self.base_url))
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| ProfileError::Other(format!("login request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ProfileError::Other(format!(
                "login rejected ({})",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProfileError::Other(format!("login response unreadable: {e}")))?;
        body.get("token")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProfileError::Other("login response missing token".to_owned()))
    }

    async fn session_token(&self) -> Result<String, ProfileError> {
        let mut token = self.session_token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        let fresh = self.login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }
}

#[async_trait]
impl ProfileUpdater for HttpProfileUpdater {
    async fn apply(&self, mood: MoodLabel) -> Result<(), ProfileError> {
        let image_path = self
            .images
            .get(&mood)
            .ok_or_else(|| ProfileError::Other(format!("no image configured for `{mood}`")))?;

        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            ProfileError::Other(format!("cannot read {}: {e}", image_path.display()))
        })?;

        let token = self.session_token().await?;

        let file_name = image_path
            .file_name()
            .map_or_else(|| format!("{mood}.png"), |n| n.to_string_lossy().into_owned());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ProfileError::Other(format!("bad image mime: {e}")))?;
        let form = reqwest::multipart::Form::new().part("avatar", part);

        let response = self
            .client
            .post(format!("{}/api/v1/account/avatar", self.base_url))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProfileError::Other(format!("avatar upload failed: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(mood = %mood, "profile picture updated");
                Ok(())
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                // Session died under us; drop it so the retry logs in anew.
                self.session_token.lock().await.take();
                Err(ProfileError::NeedsReauth)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProfileError::Other(format!(
                    "avatar upload rejected ({status}): {body}"
                )))
            }
        }
    }

    async fn reauth(&self) -> Result<(), ProfileError> {
        let fresh = self.login().await?;
        *self.session_token.lock().await = Some(fresh);
        tracing::info!("profile session re-established");
        Ok(())
    }
}
