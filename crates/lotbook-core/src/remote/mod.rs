//! Remote API client used by the sync engine.
//!
//! The engine only ever talks to the server through the [`RemoteApi`] trait,
//! so tests drive it with a scripted implementation and the HTTP client
//! stays a thin reqwest wrapper.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::models::{CompletionPayload, DiaryFields, DocketPayload, LotFields, PhotoUpload, RemoteLot};
use crate::util::compact_text;

/// Dispatch failure: network trouble or a non-2xx response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// One method per remote endpoint the queue can target.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `POST /api/itp-completions`
    async fn create_completion(&self, payload: &CompletionPayload) -> DispatchResult<()>;

    /// `PUT /api/diary/{projectId}`
    async fn save_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()>;

    /// `POST /api/diary/{projectId}/submit`
    async fn submit_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()>;

    /// `POST /api/dockets`
    async fn create_docket(&self, payload: &DocketPayload) -> DispatchResult<()>;

    /// `POST /api/dockets/{projectId}/submit`
    async fn submit_docket(&self, payload: &DocketPayload) -> DispatchResult<()>;

    /// `POST /api/documents/upload` (multipart)
    async fn upload_photo(&self, upload: &PhotoUpload) -> DispatchResult<()>;

    /// `GET /api/lots/{lotId}` — conflict pre-check against live state
    async fn fetch_lot(&self, lot_id: &str) -> DispatchResult<RemoteLot>;

    /// `PATCH /api/lots/{lotId}` — returns the updated server representation
    async fn patch_lot(&self, lot_id: &str, fields: &LotFields) -> DispatchResult<RemoteLot>;
}

/// reqwest-backed implementation of [`RemoteApi`].
#[derive(Clone)]
pub struct HttpRemoteApi {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    pub fn new(config: RemoteConfig) -> DispatchResult<Self> {
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn check(response: reqwest::Response) -> DispatchResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Api(parse_api_error(status, &body)))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create_completion(&self, payload: &CompletionPayload) -> DispatchResult<()> {
        let response = self
            .client
            .post(self.url("/api/itp-completions"))
            .bearer_auth(&self.config.auth_token)
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn save_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()> {
        let path = format!("/api/diary/{}", urlencoding::encode(project_id));
        let response = self
            .client
            .put(self.url(&path))
            .bearer_auth(&self.config.auth_token)
            .json(fields)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn submit_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()> {
        let path = format!("/api/diary/{}/submit", urlencoding::encode(project_id));
        let response = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.config.auth_token)
            .json(fields)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_docket(&self, payload: &DocketPayload) -> DispatchResult<()> {
        let response = self
            .client
            .post(self.url("/api/dockets"))
            .bearer_auth(&self.config.auth_token)
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn submit_docket(&self, payload: &DocketPayload) -> DispatchResult<()> {
        let path = format!(
            "/api/dockets/{}/submit",
            urlencoding::encode(&payload.project_id)
        );
        let response = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.config.auth_token)
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upload_photo(&self, upload: &PhotoUpload) -> DispatchResult<()> {
        let part = reqwest::multipart::Part::bytes(upload.data.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("lotId", upload.lot_id.clone())
            .text("documentId", upload.photo_id.clone());
        if let Some(caption) = &upload.caption {
            form = form.text("caption", caption.clone());
        }

        let response = self
            .client
            .post(self.url("/api/documents/upload"))
            .bearer_auth(&self.config.auth_token)
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_lot(&self, lot_id: &str) -> DispatchResult<RemoteLot> {
        let path = format!("/api/lots/{}", urlencoding::encode(lot_id));
        let response = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.config.auth_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<RemoteLot>().await?)
    }

    async fn patch_lot(&self, lot_id: &str, fields: &LotFields) -> DispatchResult<RemoteLot> {
        let path = format!("/api/lots/{}", urlencoding::encode(lot_id));
        let response = self
            .client
            .patch(self.url(&path))
            .bearer_auth(&self.config.auth_token)
            .json(fields)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<RemoteLot>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
