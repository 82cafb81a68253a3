//! Extra images for a query from dedicated image sources.
//!
//! Order: the backend's DuckDuckGo image proxy, then Pexels, then Unsplash.
//! The first source that answers successfully wins. Failures are logged and
//! never fail the search they decorate.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_PEXELS_URL: &str = "https://api.pexels.com/v1/search";
pub const DEFAULT_UNSPLASH_URL: &str = "https://api.unsplash.com/search/photos";

const PER_QUERY: u32 = 5;

#[derive(Debug, Deserialize)]
struct ProxyImages {
    #[serde(default)]
    images: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    medium: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    small: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImageAugmenter {
    /// Full URL of the backend image proxy endpoint
    proxy_url: Option<String>,
    pexels_key: Option<String>,
    pexels_url: String,
    unsplash_key: Option<String>,
    unsplash_url: String,
    client: Client,
}

impl ImageAugmenter {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            proxy_url: None,
            pexels_key: None,
            pexels_url: DEFAULT_PEXELS_URL.to_string(),
            unsplash_key: None,
            unsplash_url: DEFAULT_UNSPLASH_URL.to_string(),
            client,
        }
    }

    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn with_pexels(mut self, key: impl Into<String>, url: Option<String>) -> Self {
        self.pexels_key = Some(key.into());
        if let Some(url) = url {
            self.pexels_url = url;
        }
        self
    }

    pub fn with_unsplash(mut self, key: impl Into<String>, url: Option<String>) -> Self {
        self.unsplash_key = Some(key.into());
        if let Some(url) = url {
            self.unsplash_url = url;
        }
        self
    }

    /// Append images for `query` to `current` from the first source that answers.
    pub async fn augment(&self, query: &str, mut current: Vec<String>) -> Vec<String> {
        if let Some(url) = &self.proxy_url {
            match self.from_proxy(url, query).await {
                Ok(images) => {
                    current.extend(images);
                    return current;
                }
                Err(e) => warn!(query = %query, error = %e, "DuckDuckGo image search failed"),
            }
        }

        if let Some(key) = &self.pexels_key {
            match self.from_pexels(key, query).await {
                Ok(images) => {
                    current.extend(images);
                    return current;
                }
                Err(e) => warn!(query = %query, error = %e, "Pexels image search failed"),
            }
        }

        if let Some(key) = &self.unsplash_key {
            match self.from_unsplash(key, query).await {
                Ok(images) => {
                    current.extend(images);
                    return current;
                }
                Err(e) => warn!(query = %query, error = %e, "Unsplash image search failed"),
            }
        }

        debug!(query = %query, "No image source answered");
        current
    }

    async fn from_proxy(&self, url: &str, query: &str) -> Result<Vec<String>, reqwest::Error> {
        let max_results = PER_QUERY.to_string();
        let body: ProxyImages = self
            .client
            .get(url)
            .query(&[("query", query), ("max_results", max_results.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The proxy returns either bare URLs or objects with an `image` field.
        Ok(body
            .images
            .into_iter()
            .filter_map(|v| match v {
                Value::String(url) => Some(url),
                other => other.get("image").and_then(Value::as_str).map(str::to_string),
            })
            .collect())
    }

    async fn from_pexels(&self, key: &str, query: &str) -> Result<Vec<String>, reqwest::Error> {
        let per_page = PER_QUERY.to_string();
        let body: PexelsResponse = self
            .client
            .get(&self.pexels_url)
            .header("Authorization", key)
            .query(&[("query", query), ("per_page", per_page.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.photos.into_iter().map(|p| p.src.medium).collect())
    }

    async fn from_unsplash(&self, key: &str, query: &str) -> Result<Vec<String>, reqwest::Error> {
        let per_page = PER_QUERY.to_string();
        let body: UnsplashResponse = self
            .client
            .get(&self.unsplash_url)
            .header("Authorization", format!("Client-ID {key}"))
            .query(&[("query", query), ("per_page", per_page.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.results.into_iter().map(|p| p.urls.small).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_nothing_configured_returns_input() {
        let augmenter = ImageAugmenter::new(Duration::from_secs(5));
        let images = augmenter.augment("q", vec!["https://a/1.png".to_string()]).await;
        assert_eq!(images, vec!["https://a/1.png"]);
    }

    #[tokio::test]
    async fn test_proxy_failure_falls_through_to_pexels() {
        let server = MockServer::start().await;
        Mock::given(path("/api/duckduckgo/images"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pexels"))
            .and(header("authorization", "px-key"))
            .and(query_param("query", "mars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "photos": [{ "src": { "medium": "https://images.pexels.com/mars.jpg" } }]
            })))
            .mount(&server)
            .await;

        let augmenter = ImageAugmenter::new(Duration::from_secs(5))
            .with_proxy(format!("{}/api/duckduckgo/images", server.uri()))
            .with_pexels("px-key", Some(format!("{}/pexels", server.uri())));

        let images = augmenter.augment("mars", Vec::new()).await;
        assert_eq!(images, vec!["https://images.pexels.com/mars.jpg"]);
    }

    #[tokio::test]
    async fn test_proxy_accepts_both_shapes() {
        let server = MockServer::start().await;
        Mock::given(path("/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": ["https://x/1.png", { "image": "https://x/2.png", "title": "t" }]
            })))
            .mount(&server)
            .await;

        let augmenter =
            ImageAugmenter::new(Duration::from_secs(5)).with_proxy(format!("{}/images", server.uri()));

        let images = augmenter.augment("q", Vec::new()).await;
        assert_eq!(images, vec!["https://x/1.png", "https://x/2.png"]);
    }

    #[tokio::test]
    async fn test_unsplash_client_id_header() {
        let server = MockServer::start().await;
        Mock::given(path("/unsplash"))
            .and(header("authorization", "Client-ID us-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "urls": { "small": "https://images.unsplash.com/s.jpg" } }]
            })))
            .mount(&server)
            .await;

        let augmenter = ImageAugmenter::new(Duration::from_secs(5))
            .with_unsplash("us-key", Some(format!("{}/unsplash", server.uri())));

        let images = augmenter.augment("q", Vec::new()).await;
        assert_eq!(images, vec!["https://images.unsplash.com/s.jpg"]);
    }
}
