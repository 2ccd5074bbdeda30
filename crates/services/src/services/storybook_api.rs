//! HTTP client for the storybook backend.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDateTime;
use reqwest::{
    Client, Method, RequestBuilder, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::{
    batch_collector::{
        CollectedItem, CollectionRequest, GenerateOutcome, GenerationError, StoryGenerator,
    },
    config::{ApiConfig, GenerationSettings},
};

/// Substrings of the backend's "not enough valid stories" message.
pub const INSUFFICIENT_COUNT_MARKERS: [&str; 2] =
    ["有效收集数量不足", "insufficient valid collection count"];

const GENERIC_COLLECT_FAILURE: &str = "story collection failed";

#[derive(Debug, Clone, Error)]
pub enum StorybookApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("only .csv files can be uploaded: {0}")]
    NotCsv(String),
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("no story ids given")]
    EmptySelection,
}

impl StorybookApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// A message in the generation conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /api/collect`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub category: String,
    pub count: u32,
    pub batch_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// `duplicate` is a title list on success and `true` when a single story
/// already existed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DuplicateField {
    Flag(bool),
    Titles(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct CollectResponseBody {
    stories: Option<Vec<CollectedItem>>,
    duplicate: Option<DuplicateField>,
    message: Option<String>,
    error: Option<String>,
}

/// Turn a `/api/collect` response into a [`GenerateOutcome`].
///
/// Shapes are checked in the order the web client checked them: a non-2xx
/// status is always a failure, then a story array wins over any message.
pub fn decode_collect_response(
    status: StatusCode,
    body: &str,
) -> Result<GenerateOutcome, StorybookApiError> {
    if !status.is_success() {
        let message = serde_json::from_str::<CollectResponseBody>(body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| GENERIC_COLLECT_FAILURE.to_string());
        return Ok(GenerateOutcome::Failure { message });
    }

    let parsed: CollectResponseBody =
        serde_json::from_str(body).map_err(|e| StorybookApiError::Serde(e.to_string()))?;

    if let Some(stories) = parsed.stories {
        let duplicates = match parsed.duplicate {
            Some(DuplicateField::Titles(titles)) => titles,
            _ => Vec::new(),
        };
        return Ok(GenerateOutcome::Success {
            stories,
            duplicates,
        });
    }

    let insufficient = parsed
        .message
        .as_deref()
        .filter(|message| INSUFFICIENT_COUNT_MARKERS.iter().any(|m| message.contains(*m)));
    if let Some(message) = insufficient {
        return Ok(GenerateOutcome::InsufficientCount {
            message: message.to_string(),
        });
    }

    if matches!(parsed.duplicate, Some(DuplicateField::Flag(true))) {
        return Ok(GenerateOutcome::AlreadyExists);
    }

    if let Some(message) = parsed.error {
        return Ok(GenerateOutcome::Failure { message });
    }

    Ok(GenerateOutcome::Success {
        stories: Vec::new(),
        duplicates: Vec::new(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse::<NaiveDateTime>().ok()))
}

/// A story stored on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

/// Fields left as `None` keep their current value on the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl StoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.content.is_none()
            && self.source.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadSummary {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub duplicate_count: u64,
}

/// A model the backend's provider offers for generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

/// Storybook backend client
#[derive(Debug, Clone)]
pub struct StorybookApiClient {
    http: Client,
    base_url: Url,
    read_retries: usize,
}

impl StorybookApiClient {
    const READ_RETRY_MIN_DELAY: Duration = Duration::from_millis(250);
    const READ_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
    const DEFAULT_READ_RETRIES: usize = 3;

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StorybookApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("storybook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorybookApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            read_retries: Self::DEFAULT_READ_RETRIES,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, StorybookApiError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// How many times a failed GET is retried. Writes are never retried.
    pub fn with_read_retries(mut self, retries: usize) -> Self {
        self.read_retries = retries;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorybookApiError> {
        self.base_url
            .join(path)
            .map_err(|e| StorybookApiError::InvalidBaseUrl(e.to_string()))
    }

    /// One generation call. Sent exactly once.
    pub async fn collect(
        &self,
        payload: &CollectPayload,
    ) -> Result<GenerateOutcome, StorybookApiError> {
        let url = self.endpoint("api/collect")?;
        debug!(%url, category = %payload.category, count = payload.count, "Sending collect request");

        let res = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = res.status();
        let body = res.text().await.map_err(map_reqwest_error)?;

        decode_collect_response(status, &body)
    }

    pub async fn list_stories(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Story>, StorybookApiError> {
        let mut url = self.endpoint("api/stories")?;
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            url.query_pairs_mut().append_pair("category", category);
        }
        self.get_json(url).await
    }

    pub async fn update_story(
        &self,
        id: i64,
        update: &StoryUpdate,
    ) -> Result<String, StorybookApiError> {
        let url = self.endpoint(&format!("api/story/{id}"))?;
        self.send_write(self.http.request(Method::PUT, url).json(update))
            .await
    }

    pub async fn delete_story(&self, id: i64) -> Result<String, StorybookApiError> {
        let url = self.endpoint(&format!("api/story/{id}"))?;
        self.send_write(self.http.request(Method::DELETE, url)).await
    }

    pub async fn batch_delete_stories(&self, ids: &[i64]) -> Result<String, StorybookApiError> {
        if ids.is_empty() {
            return Err(StorybookApiError::EmptySelection);
        }
        let url = self.endpoint("api/stories/batch_delete")?;
        self.send_write(self.http.post(url).json(&serde_json::json!({ "ids": ids })))
            .await
    }

    /// CSV bytes of the selected stories.
    pub async fn batch_export_stories(&self, ids: &[i64]) -> Result<Vec<u8>, StorybookApiError> {
        if ids.is_empty() {
            return Err(StorybookApiError::EmptySelection);
        }
        let url = self.endpoint("api/stories/batch_export")?;
        debug!(%url, count = ids.len(), "Exporting stories");

        let res = self
            .http
            .post(url)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let res = error_for_status(res).await?;
        let bytes = res.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, StorybookApiError> {
        let url = self.endpoint("api/categories")?;
        self.get_json(url).await
    }

    pub async fn create_category(&self, name: &str) -> Result<String, StorybookApiError> {
        let url = self.endpoint("api/categories")?;
        self.send_write(self.http.post(url).json(&serde_json::json!({ "name": name })))
            .await
    }

    pub async fn rename_category(&self, id: i64, name: &str) -> Result<String, StorybookApiError> {
        let url = self.endpoint(&format!("api/categories/{id}"))?;
        self.send_write(
            self.http
                .request(Method::PUT, url)
                .json(&serde_json::json!({ "name": name })),
        )
        .await
    }

    pub async fn delete_category(&self, id: i64) -> Result<String, StorybookApiError> {
        let url = self.endpoint(&format!("api/categories/{id}"))?;
        self.send_write(self.http.request(Method::DELETE, url)).await
    }

    /// Models available for generation. Without `api_key` the backend uses
    /// the key it was configured with. Read-only, so retried like a GET.
    pub async fn list_models(
        &self,
        api_key: Option<&str>,
    ) -> Result<Vec<ModelInfo>, StorybookApiError> {
        let url = self.endpoint("api/models")?;
        let body = serde_json::json!({ "api_key": api_key.unwrap_or_default() });
        let list: ModelList = self
            .read_json(|| self.http.post(url.clone()).json(&body))
            .await?;
        Ok(list.data)
    }

    /// Store the provider API key on the backend.
    pub async fn update_settings(&self, api_key: &str) -> Result<String, StorybookApiError> {
        let url = self.endpoint("api/settings")?;
        self.send_write(
            self.http
                .post(url)
                .json(&serde_json::json!({ "api_key": api_key })),
        )
        .await
    }

    /// Upload a CSV batch of stories. The server deduplicates by title or content.
    pub async fn upload_csv(&self, path: &Path) -> Result<UploadSummary, StorybookApiError> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(StorybookApiError::NotCsv(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorybookApiError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| StorybookApiError::Transport(e.to_string()))?;

        let url = self.endpoint("api/upload")?;
        let res = self
            .http
            .post(url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let res = error_for_status(res).await?;
        res.json::<UploadSummary>()
            .await
            .map_err(|e| StorybookApiError::Serde(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, StorybookApiError> {
        self.read_json(|| self.http.get(url.clone())).await
    }

    /// Send a read-only request, rebuilt by `build` for every retry.
    async fn read_json<T, F>(&self, build: F) -> Result<T, StorybookApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        (|| async { self.send_read(build()).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Self::READ_RETRY_MIN_DELAY)
                    .with_max_delay(Self::READ_RETRY_MAX_DELAY)
                    .with_max_times(self.read_retries)
                    .with_jitter(),
            )
            .when(|e: &StorybookApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Storybook API read failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_read<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, StorybookApiError> {
        let res = request.send().await.map_err(map_reqwest_error)?;
        let res = error_for_status(res).await?;
        res.json::<T>()
            .await
            .map_err(|e| StorybookApiError::Serde(e.to_string()))
    }

    /// Send a mutation and return the server's `message`.
    async fn send_write(&self, request: RequestBuilder) -> Result<String, StorybookApiError> {
        let res = request.send().await.map_err(map_reqwest_error)?;
        let res = error_for_status(res).await?;
        let body = res.text().await.map_err(map_reqwest_error)?;
        Ok(serde_json::from_str::<ApiMessage>(&body)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| "ok".to_string()))
    }
}

/// Collect-endpoint adapter for the batch collector.
#[derive(Debug, Clone)]
pub struct StorybookGenerator {
    client: StorybookApiClient,
    settings: GenerationSettings,
    api_key: Option<String>,
}

impl StorybookGenerator {
    pub fn new(
        client: StorybookApiClient,
        settings: GenerationSettings,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }

    pub fn payload(&self, request: &CollectionRequest, need: u32) -> CollectPayload {
        CollectPayload {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(
                    self.settings
                        .render_system_prompt(&request.category, &request.prompt),
                ),
                ChatMessage::user(request.prompt.clone()),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            category: request.category.clone(),
            count: need,
            batch_size: need,
            api_key: self.api_key.clone(),
        }
    }
}

#[async_trait]
impl StoryGenerator for StorybookGenerator {
    async fn generate(
        &self,
        request: &CollectionRequest,
        need: u32,
    ) -> Result<GenerateOutcome, GenerationError> {
        self.client
            .collect(&self.payload(request, need))
            .await
            .map_err(|e| GenerationError(format!("{GENERIC_COLLECT_FAILURE}: {e}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, StorybookApiError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| StorybookApiError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(StorybookApiError::InvalidBaseUrl(raw.to_string()));
    }
    // Endpoints are joined relative to the base, so keep its path as a directory.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn error_for_status(res: reqwest::Response) -> Result<reqwest::Response, StorybookApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });
    Err(StorybookApiError::Http {
        status: status.as_u16(),
        message,
    })
}

fn map_reqwest_error(e: reqwest::Error) -> StorybookApiError {
    if e.is_timeout() {
        StorybookApiError::Timeout
    } else {
        StorybookApiError::Transport(e.to_string())
    }
}
