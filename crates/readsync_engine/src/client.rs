use std::time::Duration;

use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde_json::{json, Value};

use crate::{FailureKind, FetchError};

/// Where the backend lives and how its paths are shaped.
///
/// Path templates use `{item}` for a book id and `{id}` for a review id.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub discussion_path: String,
    pub create_review_path: String,
    pub update_review_path: String,
    pub delete_review_path: String,
    pub search_path: String,
    pub fact_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub bearer_token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            discussion_path: "books/{item}/reviews/".to_string(),
            create_review_path: "reviews/".to_string(),
            update_review_path: "reviews/{id}/".to_string(),
            delete_review_path: "reviews/{id}/delete/".to_string(),
            search_path: "search/".to_string(),
            fact_path: "books/{item}/update-status/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 2 * 1024 * 1024,
            bearer_token: None,
        }
    }
}

/// A discussion write as the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCall {
    CreateReview { item: String, text: String },
    Reply {
        item: String,
        parent_id: String,
        text: String,
    },
    Edit { review_id: String, text: String },
    Delete { review_id: String },
}

#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    async fn fetch_discussion(&self, item: &str) -> Result<Value, FetchError>;

    async fn send_mutation(&self, call: &MutationCall) -> Result<Value, FetchError>;

    async fn fetch_page(&self, query: &str, page: u32, page_size: u32)
        -> Result<Value, FetchError>;

    /// Tell the backend a rewardable fact happened; the body may carry a reward.
    async fn report_fact(&self, subject_id: &str, fact_kind: &str) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ReqwestApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn url(&self, template: &str, item: Option<&str>, id: Option<&str>) -> Result<Url, FetchError> {
        let mut path = template.to_string();
        if let Some(item) = item {
            path = path.replace("{item}", item);
        }
        if let Some(id) = id {
            path = path.replace("{id}", id);
        }
        let joined = format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, FetchError> {
        engine_debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.settings.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            let bytes = serde_json::to_vec(&body)
                .map_err(|err| FetchError::new(FailureKind::MalformedResponse, err.to_string()))?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::MalformedResponse, err.to_string()))
    }
}

#[async_trait::async_trait]
impl ApiClient for ReqwestApiClient {
    async fn fetch_discussion(&self, item: &str) -> Result<Value, FetchError> {
        let url = self.url(&self.settings.discussion_path, Some(item), None)?;
        self.send(Method::GET, url, None).await
    }

    async fn send_mutation(&self, call: &MutationCall) -> Result<Value, FetchError> {
        let settings = &self.settings;
        let (method, url, body) = match call {
            MutationCall::CreateReview { item, text } => (
                Method::POST,
                self.url(&settings.create_review_path, Some(item), None)?,
                Some(json!({"book": item, "review_text": text})),
            ),
            MutationCall::Reply {
                item,
                parent_id,
                text,
            } => (
                Method::POST,
                self.url(&settings.create_review_path, Some(item), None)?,
                Some(json!({"book": item, "review_text": text, "parent": parent_id})),
            ),
            MutationCall::Edit { review_id, text } => (
                Method::PUT,
                self.url(&settings.update_review_path, None, Some(review_id))?,
                Some(json!({"review_text": text})),
            ),
            MutationCall::Delete { review_id } => (
                Method::DELETE,
                self.url(&settings.delete_review_path, None, Some(review_id))?,
                None,
            ),
        };
        self.send(method, url, body).await
    }

    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Value, FetchError> {
        let mut url = self.url(&self.settings.search_path, None, None)?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        self.send(Method::GET, url, None).await
    }

    async fn report_fact(&self, subject_id: &str, fact_kind: &str) -> Result<Value, FetchError> {
        let url = self.url(&self.settings.fact_path, Some(subject_id), None)?;
        self.send(Method::POST, url, Some(json!({"status": fact_kind})))
            .await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
