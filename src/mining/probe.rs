//! Lightweight existence probe for candidate image URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Checks whether a URL actually serves an image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn is_image(&self, url: &str) -> bool;
}

/// Probes with an HTTP HEAD request and inspects the content type.
/// Any transport failure or non-image answer is simply `false`.
pub struct HeadRequestProbe {
    http: reqwest::Client,
}

impl HeadRequestProbe {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }
}

impl Default for HeadRequestProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProbe for HeadRequestProbe {
    async fn is_image(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) if response.status().is_success() => response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.starts_with("image"))
                .unwrap_or(false),
            _ => false,
        }
    }
}
