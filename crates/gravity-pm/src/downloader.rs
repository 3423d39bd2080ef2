//! Artifact downloader.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::http::{HttpClient, HttpError};

/// Streams artifacts to disk through the authenticated [`HttpClient`]
pub struct Downloader {
    http_client: Arc<HttpClient>,
}

impl Downloader {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self { http_client }
    }

    /// Download `url` to `dest`.
    ///
    /// Returns once the file is flushed and closed. On failure no file is
    /// left at `dest`.
    pub async fn download<F>(&self, url: &str, dest: &Path, progress: Option<F>) -> Result<(), HttpError>
    where
        F: Fn(u64, u64),
    {
        // Redirects and credential gating happen inside the client; nothing
        // touches the disk until a 2xx response arrives.
        let response = self.http_client.get(url).await?;
        let total_size = response.content_length().unwrap_or(0);

        log::debug!(
            "Writing {} to {} ({} bytes announced)",
            response.url(),
            dest.display(),
            total_size
        );

        let result = write_body(response, dest, total_size, progress.as_ref()).await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Could not remove partial download {}: {}", dest.display(), e);
                }
            }
        }

        result
    }
}

async fn write_body<F>(
    response: reqwest::Response,
    dest: &Path,
    total_size: u64,
    progress: Option<&F>,
) -> Result<(), HttpError>
where
    F: Fn(u64, u64),
{
    let mut file = File::create(dest).await?;
    let mut downloaded: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(callback) = progress {
            callback(downloaded, total_size);
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    log::trace!("Downloaded {} bytes to {}", downloaded, dest.display());
    Ok(())
}
