//! HTTP boundary between this client and the rendering backend.
//!
//! The [`Gateway`] trait covers the three calls the lifecycle controller
//! drives (upload, start, poll). It is a trait so the controller can be run
//! against a scripted backend in tests. [`HttpGateway`] is the reqwest
//! implementation and additionally offers the calls a CLI needs around a job
//! (download, preview, listing, deletion) plus pure URL builders.
//!
//! No call here retries. A failure is mapped to a [`ClientError`] and handed
//! straight back; the caller decides whether it is worth another attempt.

use crate::config::{ClientConfig, ExportFormat, RenderConfig};
use crate::error::ClientError;
use crate::response::{
    ErrorBody, JobList, ProcessRequest, ProcessResponse, StatusResponse, UploadResponse,
};
use async_trait::async_trait;
use futures::StreamExt;
use image::DynamicImage;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// The backend calls the lifecycle controller depends on.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `POST /upload`, multipart with the PDF in field `file`.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse, ClientError>;

    /// `POST /process/{job_id}`. Returns once the backend has queued the job.
    async fn start_processing(
        &self,
        job_id: &str,
        config: &RenderConfig,
    ) -> Result<ProcessResponse, ClientError>;

    /// `GET /status/{job_id}`. Side-effect free.
    async fn get_status(&self, job_id: &str) -> Result<StatusResponse, ClientError>;
}

/// reqwest-backed [`Gateway`] for `{base_url}/api/v1`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    api_base: String,
    request_timeout: Duration,
    transfer_timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            transfer_timeout: Duration::from_secs(config.transfer_timeout_secs),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    // ── URL builders (no network) ────────────────────────────────────────

    pub fn download_url(&self, job_id: &str, format: ExportFormat) -> String {
        format!(
            "{}/download/{}?format={}",
            self.api_base,
            job_id,
            format.as_str()
        )
    }

    /// `page` is 1-indexed.
    pub fn preview_url(&self, job_id: &str, page: u32) -> String {
        format!("{}/preview/{}/{}", self.api_base, job_id, page)
    }

    // ── Result retrieval ─────────────────────────────────────────────────

    /// Fetch the rendered result into memory.
    pub async fn download(&self, job_id: &str, format: ExportFormat) -> Result<Vec<u8>, ClientError> {
        let url = self.download_url(job_id, format);
        let response = self
            .send(self.client.get(&url), &url, self.transfer_timeout)
            .await?;
        read_bytes(&url, self.transfer_timeout, response).await
    }

    /// Stream the rendered result to `path`.
    ///
    /// Writes to a `.part` sibling first and renames on success, so an
    /// interrupted download never leaves a truncated file under the final
    /// name. Returns the number of bytes written.
    pub async fn download_to(
        &self,
        job_id: &str,
        format: ExportFormat,
        path: &Path,
    ) -> Result<u64, ClientError> {
        let url = self.download_url(job_id, format);
        let response = self
            .send(self.client.get(&url), &url, self.transfer_timeout)
            .await?;

        let write_err = |source: std::io::Error| ClientError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = partial_path(path);
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(write_err)?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| transport_error(&url, self.transfer_timeout, e))?;
            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(write_err)?;

        info!("Downloaded {} bytes to {}", written, path.display());
        Ok(written)
    }

    /// Fetch the PNG preview of one rendered page (1-indexed).
    pub async fn preview(&self, job_id: &str, page: u32) -> Result<Vec<u8>, ClientError> {
        let url = self.preview_url(job_id, page);
        let response = self
            .send(self.client.get(&url), &url, self.request_timeout)
            .await?;
        read_bytes(&url, self.request_timeout, response).await
    }

    /// Like [`preview`](Self::preview), decoded. Returns the raw bytes too so
    /// the caller can save them without re-encoding.
    pub async fn preview_image(
        &self,
        job_id: &str,
        page: u32,
    ) -> Result<(DynamicImage, Vec<u8>), ClientError> {
        let bytes = self.preview(job_id, page).await?;
        let img = image::load_from_memory(&bytes).map_err(|e| ClientError::InvalidResponse {
            url: self.preview_url(job_id, page),
            reason: format!("preview is not a readable image: {e}"),
        })?;
        debug!(
            "Preview {} p{}: {}x{} px",
            job_id,
            page,
            img.width(),
            img.height()
        );
        Ok((img, bytes))
    }

    // ── Job administration ───────────────────────────────────────────────

    /// `GET /jobs`: the 50 most recent jobs on the backend.
    pub async fn list_jobs(&self) -> Result<JobList, ClientError> {
        let url = format!("{}/jobs", self.api_base);
        let response = self
            .send(self.client.get(&url), &url, self.request_timeout)
            .await?;
        read_json(&url, self.request_timeout, response).await
    }

    /// `DELETE /jobs/{job_id}`: removes the job and its files server-side.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/jobs/{}", self.api_base, job_id);
        self.send(self.client.delete(&url), &url, self.request_timeout)
            .await?;
        info!("Deleted job {}", job_id);
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        debug!("→ {}", url);
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, timeout, e))?;
        check_status(response).await
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse, ClientError> {
        let url = format!("{}/upload", self.api_base);
        info!("Uploading '{}' ({} bytes)", filename, bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ClientError::Internal(format!("multipart part: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .send(self.client.post(&url).multipart(form), &url, self.transfer_timeout)
            .await?;
        read_json(&url, self.transfer_timeout, response).await
    }

    async fn start_processing(
        &self,
        job_id: &str,
        config: &RenderConfig,
    ) -> Result<ProcessResponse, ClientError> {
        let url = format!("{}/process/{}", self.api_base, job_id);
        let request = self.client.post(&url).json(&ProcessRequest { config });
        let response = self.send(request, &url, self.request_timeout).await?;
        read_json(&url, self.request_timeout, response).await
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusResponse, ClientError> {
        let url = format!("{}/status/{}", self.api_base, job_id);
        let response = self
            .send(self.client.get(&url), &url, self.request_timeout)
            .await?;
        read_json(&url, self.request_timeout, response).await
    }
}

/// Turn a non-2xx response into [`ClientError::Api`], preferring the
/// backend's `detail` text over the bare status line.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message())
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(
    url: &str,
    timeout: Duration,
    response: Response,
) -> Result<T, ClientError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(url, timeout, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

async fn read_bytes(url: &str, timeout: Duration, response: Response) -> Result<Vec<u8>, ClientError> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| transport_error(url, timeout, e))
}

fn transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        ClientError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpGateway {
        let config = ClientConfig::builder()
            .base_url("http://render.local:8000/")
            .build()
            .unwrap();
        HttpGateway::new(&config).unwrap()
    }

    #[test]
    fn download_url_includes_format() {
        let g = gateway();
        assert_eq!(
            g.download_url("abc", ExportFormat::Png),
            "http://render.local:8000/api/v1/download/abc?format=png"
        );
        assert_eq!(
            g.download_url("abc", ExportFormat::default()),
            "http://render.local:8000/api/v1/download/abc?format=pdf"
        );
    }

    #[test]
    fn preview_url_is_one_indexed_path() {
        assert_eq!(
            gateway().preview_url("abc", 2),
            "http://render.local:8000/api/v1/preview/abc/2"
        );
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/handwritten_notes.pdf")),
            PathBuf::from("/tmp/out/handwritten_notes.pdf.part")
        );
    }
}
