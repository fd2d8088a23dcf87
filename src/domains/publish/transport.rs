use crate::domains::export::types::Chunk;
use crate::errors::TransportError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// One upload attempt per call; implementations never retry
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send_chunk(&self, chunk: &Chunk, digest_hex: &str) -> Result<(), TransportError>;
}

/// Multipart POST of each chunk as `file` plus its digest as `hash`
pub struct HttpChunkTransport {
    client: Client,
    url: String,
    require_success_status: bool,
}

impl HttpChunkTransport {
    pub fn new(
        url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
        require_success_status: bool,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            require_success_status,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send_chunk(&self, chunk: &Chunk, digest_hex: &str) -> Result<(), TransportError> {
        let part = Part::bytes(chunk.bytes.clone())
            .file_name("file")
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::InvalidPart(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("hash", digest_hex.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::NoResponse
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        log::debug!(
            "Chunk {} upload answered with {}",
            chunk.sequence,
            status
        );

        // Any response counts as delivered unless status checking is switched on
        if self.require_success_status && !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// One recorded upload attempt
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChunk {
    pub sequence: usize,
    pub bytes: Vec<u8>,
    pub digest: String,
}

/// Records every attempt; optionally fails the n-th one (1-based)
#[cfg(test)]
#[derive(Default)]
pub struct MockChunkTransport {
    attempts: std::sync::Mutex<Vec<SentChunk>>,
    fail_on_attempt: Option<usize>,
}

#[cfg(test)]
impl MockChunkTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(attempt: usize) -> Self {
        Self {
            fail_on_attempt: Some(attempt),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<SentChunk> {
        self.attempts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ChunkTransport for MockChunkTransport {
    async fn send_chunk(&self, chunk: &Chunk, digest_hex: &str) -> Result<(), TransportError> {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.push(SentChunk {
            sequence: chunk.sequence,
            bytes: chunk.bytes.clone(),
            digest: digest_hex.to_string(),
        });

        if self.fail_on_attempt == Some(attempts.len()) {
            return Err(TransportError::NoResponse);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunk() -> Chunk {
        Chunk {
            sequence: 0,
            records: 1,
            bytes: b"chunk-bytes".to_vec(),
            more_remaining: false,
        }
    }

    fn transport(url: String, require_success_status: bool) -> HttpChunkTransport {
        HttpChunkTransport::new(
            &url,
            Duration::from_secs(5),
            Duration::from_secs(2),
            require_success_status,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_multipart_carries_file_and_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport(format!("{}/upload", server.uri()), false)
            .send_chunk(&chunk(), "0a1b2c")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\"; filename=\"file\""));
        assert!(body.contains("Content-Type: application/octet-stream"));
        assert!(body.contains("chunk-bytes"));
        assert!(body.contains("name=\"hash\""));
        assert!(body.contains("0a1b2c"));
    }

    #[tokio::test]
    async fn test_error_status_only_fails_when_required() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(transport(server.uri(), false).send_chunk(&chunk(), "ff").await.is_ok());
        assert_eq!(
            transport(server.uri(), true).send_chunk(&chunk(), "ff").await,
            Err(TransportError::Status(500))
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_failure() {
        let result = transport("http://127.0.0.1:1/upload".to_string(), false)
            .send_chunk(&chunk(), "ff")
            .await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }

    #[tokio::test]
    async fn test_mock_fails_requested_attempt() {
        let mock = MockChunkTransport::failing_on(2);
        assert!(mock.send_chunk(&chunk(), "a").await.is_ok());
        assert_eq!(mock.send_chunk(&chunk(), "b").await, Err(TransportError::NoResponse));
        assert_eq!(mock.attempts().len(), 2);
    }
}
