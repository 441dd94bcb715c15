use std::time::Duration;

use async_trait::async_trait;
use clockex_timing::{SyncError, TimeSource};
use reqwest::header::CACHE_CONTROL;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use crate::error::UploadError;
use crate::sink::{AudioUpload, UploadReceipt, UploadSink, interpret_response};

fn build_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Posts finished sessions to one upload endpoint.
#[derive(Debug, Clone)]
pub struct HttpUploadSink {
    client: reqwest::Client,
    url: String,
}

impl HttpUploadSink {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UploadError> {
        let client = build_client(timeout).map_err(|e| UploadError::Request(e.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn read_response(response: reqwest::Response) -> Result<UploadReceipt, UploadError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;
        interpret_response(status, &body)
    }
}

#[async_trait]
impl UploadSink for HttpUploadSink {
    #[tracing::instrument(skip(self, payload), fields(url = %self.url))]
    async fn upload_json(&self, filename: &str, payload: &Value) -> Result<UploadReceipt, UploadError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "filename": filename, "payload": payload }))
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;
        Self::read_response(response).await
    }

    #[tracing::instrument(skip(self, upload), fields(url = %self.url, filename = %upload.filename))]
    async fn upload_audio(&self, upload: &AudioUpload) -> Result<UploadReceipt, UploadError> {
        let part = Part::bytes(upload.blob.bytes.clone())
            .file_name(upload.filename.clone())
            .mime_str(&upload.blob.mime)
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let mut form = Form::new().part("audio", part);
        for (name, value) in upload.fields() {
            form = form.text(name, value);
        }
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;
        Self::read_response(response).await
    }
}

/// `GET {url}` returning `{"server_time_ms": <epoch ms>}`.
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    client: reqwest::Client,
    url: String,
    timeout: Option<Duration>,
}

impl HttpTimeSource {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SyncError> {
        let client = build_client(timeout).map_err(|e| SyncError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> SyncError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => SyncError::Timeout(timeout),
            _ => SyncError::Request(e.to_string()),
        }
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn server_time_ms(&self) -> Result<i64, SyncError> {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        let body: Value = response.json().await.map_err(|e| self.request_error(e))?;
        let server_time = &body["server_time_ms"];
        server_time
            .as_i64()
            .or_else(|| server_time.as_f64().map(|ms| ms.round() as i64))
            .ok_or(SyncError::MissingTimestamp)
    }
}
