use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::AssayId;
use crate::error::KiraError;

pub const DEFAULT_TRIPOD_URL: &str = "https://tripod.nih.gov/tox21/pubdata/download";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RETRIES: usize = 3;

/// Source of raw per-assay result archives.
pub trait AssayClient: Send + Sync {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError>;
}

impl<C: AssayClient + ?Sized> AssayClient for &C {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError> {
        (**self).fetch(assay)
    }
}

impl<C: AssayClient + ?Sized> AssayClient for Box<C> {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError> {
        (**self).fetch(assay)
    }
}

#[derive(Debug, Clone)]
pub struct TripodOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub retries: usize,
}

impl Default for TripodOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRIPOD_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
        }
    }
}

#[derive(Clone)]
pub struct TripodHttpClient {
    client: Client,
    base_url: String,
    retries: usize,
}

impl TripodHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_options(TripodOptions::default())
    }

    pub fn with_options(options: TripodOptions) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-tox21/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::TripodHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|err| KiraError::TripodHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            retries: options.retries,
        })
    }

    pub fn archive_url(&self, assay: &AssayId) -> String {
        format!("{}/{}.zip", self.base_url, assay.as_str())
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Tripod request failed".to_string());
        Err(KiraError::TripodStatus { status, message })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, KiraError> {
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.retries && is_retryable_status(status) {
                        warn!(url, status, attempt, "retrying Tripod download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.retries && is_retryable_error(&err) {
                        warn!(url, error = %err, attempt, "retrying Tripod download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::TripodHttp(err.to_string()));
                }
            }
        }
    }
}

impl AssayClient for TripodHttpClient {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError> {
        let url = self.archive_url(assay);
        debug!(%url, "downloading assay archive");
        let response = self.send_with_retries(&url)?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::TripodHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
