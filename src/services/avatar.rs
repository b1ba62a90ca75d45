// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local copies of remote profile pictures.

use crate::config::Config;
use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use ring::rand::{SecureRandom, SystemRandom};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Downloads avatars into the uploads directory.
#[derive(Clone)]
pub struct AvatarStore {
    http_client: reqwest::Client,
    uploads_dir: PathBuf,
    public_base_url: String,
    rng: SystemRandom,
}

impl AvatarStore {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed building avatar HTTP client")?;

        Ok(Self {
            http_client,
            uploads_dir: config.uploads_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            rng: SystemRandom::new(),
        })
    }

    /// Fetch `url` and store it as `<unix-millis>-<random>.<ext>`.
    ///
    /// Returns the public URL of the stored copy.
    pub async fn save_remote(&self, url: &str) -> anyhow::Result<String> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .context("avatar request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("avatar request returned status {}", response.status());
        }

        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_for_content_type)
            .unwrap_or("jpg");

        let bytes = read_capped(response, MAX_AVATAR_BYTES).await?;

        let file_name = self.unique_file_name(extension)?;
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .context("failed creating uploads directory")?;
        tokio::fs::write(self.uploads_dir.join(&file_name), &bytes)
            .await
            .context("failed writing avatar")?;

        tracing::debug!(file = %file_name, size = bytes.len(), "Stored avatar copy");

        Ok(format!(
            "{}/{}/{}",
            self.public_base_url,
            self.public_dir_name(),
            file_name
        ))
    }

    fn unique_file_name(&self, extension: &str) -> anyhow::Result<String> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut suffix = [0u8; 4];
        self.rng
            .fill(&mut suffix)
            .map_err(|_| anyhow::anyhow!("random source failure"))?;

        Ok(format!("{millis}-{}.{extension}", hex::encode(suffix)))
    }

    /// Last path component of the uploads directory, as served over HTTP.
    fn public_dir_name(&self) -> String {
        self.uploads_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "public".to_string())
    }
}

/// Read the body, giving up as soon as it is known to exceed `limit`.
async fn read_capped(mut response: reqwest::Response, limit: usize) -> anyhow::Result<Vec<u8>> {
    if let Some(length) = response.content_length() {
        if length > limit as u64 {
            anyhow::bail!("avatar is too large ({length} bytes)");
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.context("avatar body read failed")? {
        if body.len() + chunk.len() > limit {
            anyhow::bail!("avatar is larger than {limit} bytes");
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim();
    match mime {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_content_type() {
        assert_eq!(extension_for_content_type("image/png"), Some("png"));
        assert_eq!(
            extension_for_content_type("image/jpeg; charset=binary"),
            Some("jpg")
        );
        assert_eq!(extension_for_content_type("text/html"), None);
    }

    /// Serves a 64-byte body with a length and an 80-byte body without one.
    async fn spawn_body_server() -> String {
        use axum::{body::Body, body::Bytes, routing::get, Router};

        let app = Router::new()
            .route("/sized", get(|| async { vec![7u8; 64] }))
            .route(
                "/streamed",
                get(|| async {
                    let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 20])));
                    Body::from_stream(futures_util::stream::iter(chunks))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let base = spawn_body_server().await;
        let client = reqwest::Client::new();

        let sized = client.get(format!("{base}/sized")).send().await.unwrap();
        assert_eq!(sized.content_length(), Some(64));
        let err = read_capped(sized, 32).await.unwrap_err();
        assert!(err.to_string().contains("64 bytes"));

        let streamed = client.get(format!("{base}/streamed")).send().await.unwrap();
        assert_eq!(streamed.content_length(), None);
        let err = read_capped(streamed, 50).await.unwrap_err();
        assert!(err.to_string().contains("larger than 50"));
    }

    #[tokio::test]
    async fn bodies_within_limit_are_read_whole() {
        let base = spawn_body_server().await;
        let client = reqwest::Client::new();

        let sized = client.get(format!("{base}/sized")).send().await.unwrap();
        assert_eq!(read_capped(sized, 64).await.unwrap().len(), 64);

        let streamed = client.get(format!("{base}/streamed")).send().await.unwrap();
        assert_eq!(read_capped(streamed, 100).await.unwrap().len(), 80);
    }

    #[test]
    fn file_names_are_unique() {
        let store = AvatarStore::new(&Config::test_default()).unwrap();
        let a = store.unique_file_name("png").unwrap();
        let b = store.unique_file_name("png").unwrap();

        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
    }
}
