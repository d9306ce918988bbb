use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ArchiveSettings;
use crate::domain::StudyAccession;
use crate::error::ExportError;

pub const DEFAULT_BASE_URL: &str = "https://metadata.ega-archive.org";

#[derive(Debug, Clone, Deserialize)]
pub struct RawStudy {
    pub accession_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDataset {
    pub accession_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub released_date: String,
}

/// Offset/limit window. Unset fields are left out of the query string and the
/// archive applies its own defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// Blocking GET returning a parsed JSON body. Non-2xx must surface as
/// [`ExportError::ArchiveStatus`].
pub trait Transport: Send + Sync {
    fn get_json(&self, url: &Url) -> Result<Value, ExportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: usize,
}

impl HttpTransport {
    pub fn new(settings: &ArchiveSettings) -> Result<Self, ExportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("researchdata-export/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ExportError::ArchiveTransport(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| ExportError::ArchiveTransport(err.to_string()))?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
        })
    }

    fn handle_status(
        url: &Url,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ExportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        if let Ok(body) = response.text() {
            debug!(%url, status, body = %body, "archive error body");
        }
        Err(ExportError::ArchiveStatus {
            status,
            endpoint: url.to_string(),
        })
    }

    fn send_with_retries(&self, url: &Url) -> Result<reqwest::blocking::Response, ExportError> {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = self.client.get(url.clone()).send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(%url, status, attempt, "retrying archive request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(%url, error = %err, attempt, "retrying archive request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ExportError::ArchiveTransport(format!("{url}: {err}")));
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &Url) -> Result<Value, ExportError> {
        debug!(%url, "GET");
        let response = self.send_with_retries(url)?;
        let response = Self::handle_status(url, response)?;
        response.json().map_err(|err| ExportError::ArchiveDecode {
            endpoint: url.to_string(),
            message: err.to_string(),
        })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Read-only client for the EGA metadata API.
pub struct EgaClient<T: Transport> {
    transport: T,
    base_url: Url,
}

impl<T: Transport> EgaClient<T> {
    pub fn new(transport: T, base_url: &str) -> Result<Self, ExportError> {
        let base_url =
            Url::parse(base_url).map_err(|_| ExportError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ExportError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            transport,
            base_url,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{base}/{segments...}` plus the page's query parameters, if any.
    pub fn endpoint_url(&self, segments: &[&str], page: Page) -> Result<Url, ExportError> {
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ExportError::InvalidRequest(format!(
                "empty path segment in {segments:?}"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ExportError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        let pairs = page.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs.iter());
        }
        Ok(url)
    }

    pub fn fetch_entity(
        &self,
        entity_type: &str,
        accession_id: Option<&str>,
        page: Page,
    ) -> Result<Value, ExportError> {
        let mut segments = vec![entity_type];
        if let Some(accession_id) = accession_id {
            segments.push(accession_id);
        }
        let url = self.endpoint_url(&segments, page)?;
        self.transport.get_json(&url)
    }

    pub fn fetch_related_entities(
        &self,
        entity_type: &str,
        related_entity_type: &str,
        accession_id: &str,
        page: Page,
    ) -> Result<Vec<Value>, ExportError> {
        let url = self.endpoint_url(&[entity_type, accession_id, related_entity_type], page)?;
        match self.transport.get_json(&url)? {
            Value::Array(items) => Ok(items),
            other => Err(ExportError::ArchiveDecode {
                endpoint: url.to_string(),
                message: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }

    /// Requests pages of `page_size` and advances the offset by the number of
    /// records received, until the archive returns an empty page. The archive
    /// may cap pages below the requested limit.
    /// Without a page size a single unparameterized request is made.
    pub fn fetch_all_related_entities(
        &self,
        entity_type: &str,
        related_entity_type: &str,
        accession_id: &str,
        page_size: Option<u32>,
    ) -> Result<Vec<Value>, ExportError> {
        let Some(page_size) = page_size else {
            return self.fetch_related_entities(
                entity_type,
                related_entity_type,
                accession_id,
                Page::default(),
            );
        };
        if page_size == 0 {
            return Err(ExportError::InvalidRequest(
                "page size must be positive".to_string(),
            ));
        }

        let mut collected = Vec::new();
        let mut previous: Option<Vec<Value>> = None;
        let mut offset = 0u32;
        loop {
            let page = self.fetch_related_entities(
                entity_type,
                related_entity_type,
                accession_id,
                Page::new(page_size, offset),
            )?;
            if page.is_empty() {
                break;
            }
            if previous.as_ref() == Some(&page) {
                return Err(ExportError::ArchiveDecode {
                    endpoint: format!("{entity_type}/{accession_id}/{related_entity_type}"),
                    message: format!("archive returned the same page again at offset {offset}"),
                });
            }
            debug!(offset, count = page.len(), "received page");
            let received = u32::try_from(page.len())
                .ok()
                .and_then(|count| offset.checked_add(count))
                .ok_or_else(|| {
                    ExportError::InvalidRequest("pagination offset overflow".to_string())
                })?;
            collected.extend(page.iter().cloned());
            previous = Some(page);
            offset = received;
        }
        Ok(collected)
    }

    pub fn fetch_study(&self, accession: &StudyAccession) -> Result<RawStudy, ExportError> {
        let url = self.endpoint_url(&["studies", accession.as_str()], Page::default())?;
        let value = self.transport.get_json(&url)?;
        decode(value, &url)
    }

    pub fn fetch_study_datasets(
        &self,
        accession: &StudyAccession,
        page_size: Option<u32>,
    ) -> Result<Vec<Value>, ExportError> {
        self.fetch_all_related_entities("studies", "datasets", accession.as_str(), page_size)
    }
}

fn decode<R: DeserializeOwned>(value: Value, url: &Url) -> Result<R, ExportError> {
    serde_json::from_value(value).map_err(|err| ExportError::ArchiveDecode {
        endpoint: url.to_string(),
        message: err.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
