//! Model artifact reachability and loading
//!
//! The probe asks for the first byte of the artifact (an HTTP `Range: bytes=0-0`
//! request, or a one-byte read for local files) and falls back to a plain
//! existence check (`HEAD`, or file metadata). An unreachable artifact is
//! reported as [`WhiteMuseError::Unavailable`].

use crate::config::ModelLocation;
use crate::error::{Result, WhiteMuseError};
use reqwest::{header::RANGE, Client, StatusCode};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Timeout for the reachability probe
const PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for fetching the whole artifact
const FETCH_TIMEOUT_SECS: u64 = 300;

/// Probes and loads the segmentation model artifact
#[derive(Debug, Clone)]
pub struct ModelProbe {
    client: Client,
}

impl ModelProbe {
    /// Create a probe with its own HTTP client
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| WhiteMuseError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client })
    }

    /// Check that the artifact is reachable without downloading it
    ///
    /// # Errors
    /// - `Unavailable` when neither the partial read nor the existence check succeeds
    pub async fn probe(&self, location: &ModelLocation) -> Result<()> {
        let reachable = match location {
            ModelLocation::Local(path) => probe_local(path).await,
            ModelLocation::Remote(url) => self.probe_remote(url).await,
        };

        if reachable {
            log::debug!("Model artifact reachable: {}", location.display_name());
            Ok(())
        } else {
            log::warn!("Model artifact unreachable: {}", location.display_name());
            Err(WhiteMuseError::unavailable(format!(
                "model not found at {}",
                location.display_name()
            )))
        }
    }

    /// Read the whole artifact into memory
    ///
    /// # Errors
    /// - File read failures for local artifacts
    /// - Network or HTTP status errors for remote artifacts
    pub async fn fetch(&self, location: &ModelLocation) -> Result<Vec<u8>> {
        let bytes = match location {
            ModelLocation::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| WhiteMuseError::file_io_error("read model", path, &e))?,
            ModelLocation::Remote(url) => {
                let response = self.client.get(url).send().await.map_err(|e| {
                    WhiteMuseError::network_error(format!("Failed to download {url}"), e)
                })?;
                if !response.status().is_success() {
                    return Err(WhiteMuseError::Network(format!(
                        "HTTP error {} for {url}",
                        response.status()
                    )));
                }
                response
                    .bytes()
                    .await
                    .map_err(|e| WhiteMuseError::network_error("Failed to read model body", e))?
                    .to_vec()
            },
        };

        log::info!(
            "Loaded model {} ({:.2} MB)",
            location.display_name(),
            bytes.len() as f64 / (1024.0 * 1024.0)
        );
        Ok(bytes)
    }

    async fn probe_remote(&self, url: &str) -> bool {
        let timeout = std::time::Duration::from_secs(PROBE_TIMEOUT_SECS);

        match self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response)
                if matches!(response.status(), StatusCode::OK | StatusCode::PARTIAL_CONTENT) =>
            {
                return true;
            },
            Ok(response) => {
                log::debug!("Range probe for {url} returned {}", response.status());
            },
            Err(e) => log::debug!("Range probe for {url} failed: {e}"),
        }

        match self.client.head(url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("Existence check for {url} failed: {e}");
                false
            },
        }
    }
}

async fn probe_local(path: &Path) -> bool {
    if let Ok(mut file) = tokio::fs::File::open(path).await {
        let mut first = [0_u8; 1];
        if matches!(file.read(&mut first).await, Ok(1)) {
            return true;
        }
    }

    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Serve every connection with the response chosen for its request method
    async fn serve(get_status: &'static str, head_status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let status = if request.starts_with(b"HEAD") {
                    head_status
                } else {
                    get_status
                };
                let body = if request.starts_with(b"HEAD") { "" } else { "x" };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{addr}/models/silueta.onnx")
    }

    #[tokio::test]
    async fn test_local_file_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"onnx").unwrap();

        let probe = ModelProbe::new().unwrap();
        let location = ModelLocation::Local(path);
        probe.probe(&location).await.unwrap();
        assert_eq!(probe.fetch(&location).await.unwrap(), b"onnx");
    }

    #[tokio::test]
    async fn test_empty_file_passes_existence_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.onnx");
        std::fs::write(&path, b"").unwrap();

        let probe = ModelProbe::new().unwrap();
        assert!(probe.probe(&ModelLocation::Local(path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_unavailable() {
        let probe = ModelProbe::new().unwrap();
        let location = ModelLocation::Local(PathBuf::from("/nonexistent/whitemuse/model.onnx"));

        assert!(matches!(
            probe.probe(&location).await,
            Err(WhiteMuseError::Unavailable(_))
        ));
        assert!(matches!(
            probe.fetch(&location).await,
            Err(WhiteMuseError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ModelProbe::new().unwrap();
        let location = ModelLocation::Local(dir.path().to_path_buf());
        assert!(probe.probe(&location).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_partial_content_reachable() {
        let url = serve("206 Partial Content", "404 Not Found").await;
        let probe = ModelProbe::new().unwrap();
        assert!(probe.probe(&ModelLocation::Remote(url)).await.is_ok());
    }

    #[tokio::test]
    async fn test_remote_falls_back_to_head() {
        let url = serve("416 Range Not Satisfiable", "200 OK").await;
        let probe = ModelProbe::new().unwrap();
        assert!(probe.probe(&ModelLocation::Remote(url)).await.is_ok());
    }

    #[tokio::test]
    async fn test_remote_missing_unavailable() {
        let url = serve("404 Not Found", "404 Not Found").await;
        let probe = ModelProbe::new().unwrap();
        let location = ModelLocation::Remote(url);

        assert!(matches!(
            probe.probe(&location).await,
            Err(WhiteMuseError::Unavailable(_))
        ));
        assert!(matches!(
            probe.fetch(&location).await,
            Err(WhiteMuseError::Network(_))
        ));
    }
}
