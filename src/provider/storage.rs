//! REST client for the hosted blob store, using its resumable upload
//! protocol: one session-start call, then the payload in fixed-size chunks
//! with a finalize marker on the last one.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::traits::{BlobError, BlobStore, ProgressObserver};
use crate::types::Progress;

/// Chunk size for resumable uploads. The protocol requires a multiple of
/// 256 KiB for every chunk except the last.
pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

const UPLOAD_URL_HEADER: &str = "X-Goog-Upload-URL";

/// Resumable-upload client scoped to one bucket.
pub struct RestBlobs {
    client: Client,
    base_url: String,
    bucket: String,
}

impl RestBlobs {
    /// Create a client against the given endpoint, e.g.
    /// `https://firebasestorage.googleapis.com`.
    pub fn new(client: Client, base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bucket: bucket.into(),
        }
    }

    fn object_root(&self) -> String {
        format!("{}/v0/b/{}/o", self.base_url, self.bucket)
    }

    /// Open an upload session; the store answers with the session URL all
    /// chunks go to.
    async fn start_session(&self, path: &str, content_type: &str) -> Result<String, BlobError> {
        let url = format!(
            "{}?name={}&uploadType=resumable",
            self.object_root(),
            urlencoding::encode(path)
        );
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Type", content_type)
            .send()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                BlobError::Session(format!("missing {} header", UPLOAD_URL_HEADER))
            })
    }
}

fn provider_error(status: StatusCode, body: &str) -> BlobError {
    super::traits::map_provider_error(status, body, BlobError::Provider, |status, body| {
        BlobError::Transfer(format!("HTTP {}: {}", status, body))
    })
}

#[derive(Deserialize)]
struct FinalizeResponse {
    #[serde(rename = "downloadTokens", default)]
    download_tokens: Option<String>,
}

/// Byte ranges of each chunk, in order. Always yields at least one span so
/// an empty payload still gets its finalize call.
fn chunk_spans(total: usize) -> Vec<(usize, usize)> {
    if total == 0 {
        return vec![(0, 0)];
    }
    let mut spans = Vec::with_capacity(total.div_ceil(UPLOAD_CHUNK_SIZE));
    let mut offset = 0;
    while offset < total {
        let end = usize::min(offset + UPLOAD_CHUNK_SIZE, total);
        spans.push((offset, end));
        offset = end;
    }
    spans
}

#[async_trait]
impl BlobStore for RestBlobs {
    async fn put(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Result<String, BlobError> {
        let total = data.len();
        let upload_url = self.start_session(path, content_type).await?;
        debug!(path, total, "upload session opened");

        let spans = chunk_spans(total);
        let last_index = spans.len() - 1;
        let mut finalize_body: Option<FinalizeResponse> = None;

        for (index, (start, end)) in spans.into_iter().enumerate() {
            let command = if index == last_index {
                "upload, finalize"
            } else {
                "upload"
            };
            let response = self
                .client
                .post(&upload_url)
                .header("X-Goog-Upload-Command", command)
                .header("X-Goog-Upload-Offset", start.to_string())
                .body(data.slice(start..end))
                .send()
                .await
                .map_err(|e| BlobError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(provider_error(status, &body));
            }

            let snapshot = Progress {
                bytes_transferred: end as u64,
                total_bytes: total as u64,
            };
            debug!(path, percent = snapshot.percent(), "upload progress");
            if let Some(observer) = &progress {
                observer(snapshot);
            }

            if index == last_index {
                finalize_body = Some(
                    response
                        .json()
                        .await
                        .map_err(|e| BlobError::Parse(e.to_string()))?,
                );
            }
        }

        let token = finalize_body.and_then(|f| f.download_tokens);
        let mut url = format!(
            "{}/{}?alt=media",
            self.object_root(),
            urlencoding::encode(path)
        );
        if let Some(token) = token {
            url.push_str("&token=");
            url.push_str(&token);
        }
        info!(path, url = %url, "upload complete");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_spans_cover_payload() {
        let spans = chunk_spans(UPLOAD_CHUNK_SIZE * 2 + 100);
        assert_eq!(
            spans,
            vec![
                (0, UPLOAD_CHUNK_SIZE),
                (UPLOAD_CHUNK_SIZE, UPLOAD_CHUNK_SIZE * 2),
                (UPLOAD_CHUNK_SIZE * 2, UPLOAD_CHUNK_SIZE * 2 + 100),
            ]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_span() {
        let spans = chunk_spans(UPLOAD_CHUNK_SIZE);
        assert_eq!(spans, vec![(0, UPLOAD_CHUNK_SIZE)]);
    }

    #[test]
    fn test_empty_payload_still_finalizes() {
        assert_eq!(chunk_spans(0), vec![(0, 0)]);
    }

    #[test]
    fn test_object_path_is_encoded_in_url() {
        let blobs = RestBlobs::new(Client::new(), "http://localhost:9199", "bucket");
        assert_eq!(blobs.object_root(), "http://localhost:9199/v0/b/bucket/o");
        assert_eq!(urlencoding::encode("images/a b.png"), "images%2Fa%20b.png");
    }
}
