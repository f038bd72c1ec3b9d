use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::EventId,
    error::{ApiException, ErrorCode},
    protocol::{
        AttendantEnvelope, AttendantPayload, EventDraftPayload, EventEnvelope,
        InterestCatalogResponse, UploadEnvelope,
    },
};
use tracing::debug;
use url::Url;

/// A cover-photo file picked by the user.
#[derive(Debug, Clone)]
pub struct CoverPhotoUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The remote collaborator calls the wizard consumes. Narrow seam so tests
/// substitute failure-injecting mocks for the HTTP client.
#[async_trait]
pub trait EventApi: Send + Sync {
    async fn fetch_interest_catalog(&self) -> Result<InterestCatalogResponse>;
    async fn fetch_event(&self, id: &EventId) -> Result<EventEnvelope>;
    async fn create_event(&self, draft: &EventDraftPayload) -> Result<EventEnvelope>;
    async fn update_event(&self, id: &EventId, draft: &EventDraftPayload) -> Result<EventEnvelope>;
    async fn create_attendant(
        &self,
        event_id: &EventId,
        attendant: &AttendantPayload,
    ) -> Result<AttendantEnvelope>;
    async fn upload_cover_photo(&self, upload: CoverPhotoUpload) -> Result<UploadEnvelope>;
}

/// `EventApi` against the real JSON endpoints.
pub struct HttpEventApi {
    http: Client,
    base_url: Url,
}

impl HttpEventApi {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut base = base_url.as_ref().to_string();
        // Url::join treats a missing trailing slash as a file segment.
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(&base).context("invalid API base url")?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid API path {path}"))
    }
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

/// Decode a response body. Validation failures arrive as 4xx responses whose
/// JSON body still matches the envelope shape, so the body is parsed before
/// the status is consulted; only non-JSON failures become transport errors.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .context("failed to read API response body")?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(ApiException::new(
            code_for_status(status),
            format!("request failed with status {status}"),
        )
        .into()),
        Err(err) => Err(err).context("failed to decode API response"),
    }
}

#[async_trait]
impl EventApi for HttpEventApi {
    async fn fetch_interest_catalog(&self) -> Result<InterestCatalogResponse> {
        let url = self.endpoint("interests")?;
        debug!("api: fetch interest catalog url={url}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to fetch interest catalog")?;
        decode(response).await
    }

    async fn fetch_event(&self, id: &EventId) -> Result<EventEnvelope> {
        let url = self.endpoint(&format!("events/{id}"))?;
        debug!("api: fetch event id={id}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch event {id}"))?;
        decode(response).await
    }

    async fn create_event(&self, draft: &EventDraftPayload) -> Result<EventEnvelope> {
        let url = self.endpoint("events")?;
        debug!("api: create event name={}", draft.name);
        let response = self
            .http
            .post(url)
            .json(draft)
            .send()
            .await
            .context("failed to create event")?;
        decode(response).await
    }

    async fn update_event(&self, id: &EventId, draft: &EventDraftPayload) -> Result<EventEnvelope> {
        let url = self.endpoint(&format!("events/{id}"))?;
        debug!("api: update event id={id}");
        let response = self
            .http
            .put(url)
            .json(draft)
            .send()
            .await
            .with_context(|| format!("failed to update event {id}"))?;
        decode(response).await
    }

    async fn create_attendant(
        &self,
        event_id: &EventId,
        attendant: &AttendantPayload,
    ) -> Result<AttendantEnvelope> {
        let url = self.endpoint(&format!("events/{event_id}/attendants"))?;
        debug!("api: register attendant event={event_id} user={}", attendant.user);
        let response = self
            .http
            .post(url)
            .json(attendant)
            .send()
            .await
            .with_context(|| format!("failed to register attendant for event {event_id}"))?;
        decode(response).await
    }

    async fn upload_cover_photo(&self, upload: CoverPhotoUpload) -> Result<UploadEnvelope> {
        let url = self.endpoint("file-upload")?;
        debug!(
            "api: upload cover photo filename={} bytes={}",
            upload.filename,
            upload.bytes.len()
        );
        let mut part = multipart::Part::bytes(upload.bytes).file_name(upload.filename);
        if let Some(mime) = &upload.mime_type {
            part = part
                .mime_str(mime)
                .with_context(|| format!("invalid cover photo mime type {mime}"))?;
        }
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("failed to upload cover photo")?;
        decode(response).await
    }
}
