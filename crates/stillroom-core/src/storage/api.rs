//! HTTP client for a remote stillroom server.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::SessionStore;
use crate::actor::ActorKey;
use crate::error::{StorageError, ValidationError};
use crate::session::{NewSession, Session, SessionPatch};
use crate::settings::{SettingsPatch, UserSettings};

/// [`SessionStore`] that talks to the `/api` routes of a stillroom server.
#[derive(Debug, Clone)]
pub struct ApiStore {
    client: Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    success: bool,
}

impl ApiStore {
    /// # Errors
    /// Returns an error if `base_url` is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StorageError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| StorageError::Unavailable(format!("invalid api base url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::Unavailable(format!(
                "api base url '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_actor(mut url: Url, actor: &ActorKey) -> Url {
        if let Some(user_id) = actor.user_id() {
            url.query_pairs_mut().append_pair("userId", user_id);
        }
        url
    }

    fn send(request: RequestBuilder) -> Result<Response, StorageError> {
        let response = request.send()?;
        tracing::trace!(status = %response.status(), url = %response.url(), "api response");
        Ok(response)
    }

    /// Decode a 2xx body, or turn the response into an error.
    fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
        if response.status().is_success() {
            return Ok(response.json()?);
        }
        Err(Self::failure(response))
    }

    fn failure(response: Response) -> StorageError {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        match status {
            StatusCode::BAD_REQUEST => StorageError::Validation(ValidationError::InvalidValue {
                field: "request".into(),
                message,
            }),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                StorageError::Unavailable(format!("{status}: {message}"))
            }
            _ => StorageError::UnexpectedStatus {
                status: status.as_u16(),
                body: message,
            },
        }
    }
}

impl SessionStore for ApiStore {
    fn create_session(&self, new: NewSession) -> Result<Session, StorageError> {
        new.validate()?;
        let url = self.endpoint(&["api", "sessions"]);
        Self::decode(Self::send(self.client.post(url).json(&new))?)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        let url = self.endpoint(&["api", "sessions", id]);
        let response = Self::send(self.client.get(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).map(Some)
    }

    fn list_sessions(&self, actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
        let url = Self::with_actor(self.endpoint(&["api", "sessions"]), actor);
        Self::decode(Self::send(self.client.get(url))?)
    }

    fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
        let url = self.endpoint(&["api", "sessions", id]);
        let response = Self::send(self.client.patch(url).json(patch))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).map(Some)
    }

    fn delete_session(&self, id: &str) -> Result<bool, StorageError> {
        let url = self.endpoint(&["api", "sessions", id]);
        let response = Self::send(self.client.delete(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::decode::<DeleteBody>(response).map(|b| b.success)
    }

    fn get_settings(&self, actor: &ActorKey) -> Result<UserSettings, StorageError> {
        let url = Self::with_actor(self.endpoint(&["api", "settings"]), actor);
        Self::decode(Self::send(self.client.get(url))?)
    }

    fn upsert_settings(
        &self,
        actor: &ActorKey,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StorageError> {
        patch.validate()?;
        let url = Self::with_actor(self.endpoint(&["api", "settings"]), actor);
        Self::decode(Self::send(self.client.patch(url).json(patch))?)
    }
}
