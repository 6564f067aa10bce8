//! Image search and download with a single fallback to the next result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{ImageSource, SearchConfig};
use crate::credentials::Credentials;
use crate::error::PipelineError;
use crate::storage::artifact_path;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Direct URL of the image bytes.
    pub url: String,
}

impl ImageCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// An image-search service returning candidates in rank order.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> Result<Vec<ImageCandidate>, PipelineError>;
}

fn http_client() -> Result<reqwest::Client, PipelineError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("triviagen/", env!("CARGO_PKG_VERSION")))
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()?)
}

/// Send a request and decode its JSON body into `T`.
///
/// Non-success statuses become `RemoteService`, bodies that don't match the
/// schema become `MalformedResponse`.
async fn fetch_json<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, PipelineError> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(PipelineError::from_response(service, response).await);
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| PipelineError::MalformedResponse {
        service,
        reason: e.to_string(),
    })
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// === Google Custom Search ===

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    /// Absent when the search has no hits.
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    link: String,
}

/// Google Custom Search restricted to images.
pub struct GoogleImageSearch {
    api_key: String,
    engine_id: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl GoogleImageSearch {
    pub fn new(
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: base_url.into(),
            http_client: http_client()?,
        })
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    fn name(&self) -> &'static str {
        "Google Custom Search"
    }

    async fn search(&self, query: &str) -> Result<Vec<ImageCandidate>, PipelineError> {
        let request = self
            .http_client
            .get(endpoint(&self.base_url, "/customsearch/v1"))
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("searchType", "image"),
            ]);

        let response: GoogleSearchResponse = fetch_json(self.name(), request).await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| ImageCandidate::new(item.link))
            .collect())
    }
}

// === Unsplash ===

#[derive(Debug, Deserialize)]
struct UnsplashSearchResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: String,
}

/// Unsplash photo search, one portrait result per query.
pub struct UnsplashImageSearch {
    access_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl UnsplashImageSearch {
    pub fn new(
        access_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            access_key: access_key.into(),
            base_url: base_url.into(),
            http_client: http_client()?,
        })
    }
}

#[async_trait]
impl ImageSearch for UnsplashImageSearch {
    fn name(&self) -> &'static str {
        "Unsplash"
    }

    async fn search(&self, query: &str) -> Result<Vec<ImageCandidate>, PipelineError> {
        let request = self
            .http_client
            .get(endpoint(&self.base_url, "/search/photos"))
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "portrait"),
                ("client_id", self.access_key.as_str()),
            ]);

        let response: UnsplashSearchResponse = fetch_json(self.name(), request).await?;
        Ok(response
            .results
            .into_iter()
            .map(|photo| ImageCandidate::new(photo.urls.regular))
            .collect())
    }
}

// === Shutterstock ===

#[derive(Debug, Deserialize)]
struct ShutterstockSearchResponse {
    #[serde(default)]
    data: Vec<ShutterstockImage>,
}

#[derive(Debug, Deserialize)]
struct ShutterstockImage {
    assets: ShutterstockAssets,
}

#[derive(Debug, Deserialize)]
struct ShutterstockAssets {
    preview_1500: ShutterstockAsset,
}

#[derive(Debug, Deserialize)]
struct ShutterstockAsset {
    url: String,
}

/// Shutterstock image search using the 1500px preview asset.
pub struct ShutterstockImageSearch {
    client_id: String,
    token: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl ShutterstockImageSearch {
    pub fn new(
        client_id: impl Into<String>,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            client_id: client_id.into(),
            token: token.into(),
            base_url: base_url.into(),
            http_client: http_client()?,
        })
    }
}

#[async_trait]
impl ImageSearch for ShutterstockImageSearch {
    fn name(&self) -> &'static str {
        "Shutterstock"
    }

    async fn search(&self, query: &str) -> Result<Vec<ImageCandidate>, PipelineError> {
        let request = self
            .http_client
            .get(endpoint(&self.base_url, "/v2/images/search"))
            .bearer_auth(&self.token)
            .query(&[
                ("query", query),
                ("sort", "relevance"),
                ("per_page", "1"),
                ("client_id", self.client_id.as_str()),
            ]);

        let response: ShutterstockSearchResponse = fetch_json(self.name(), request).await?;
        Ok(response
            .data
            .into_iter()
            .map(|image| ImageCandidate::new(image.assets.preview_1500.url))
            .collect())
    }
}

/// Build the configured search provider, demanding only its credentials.
pub fn image_search_from_config(
    config: &SearchConfig,
    credentials: &Credentials,
) -> Result<Box<dyn ImageSearch>, PipelineError> {
    Ok(match config.source {
        ImageSource::Google => {
            let (key, engine) = credentials.google_search()?;
            Box::new(GoogleImageSearch::new(key, engine, &config.google_api_base)?)
        }
        ImageSource::Unsplash => {
            let key = credentials.unsplash()?;
            Box::new(UnsplashImageSearch::new(key, &config.unsplash_api_base)?)
        }
        ImageSource::Shutterstock => {
            let (key, token) = credentials.shutterstock()?;
            Box::new(ShutterstockImageSearch::new(
                key,
                token,
                &config.shutterstock_api_base,
            )?)
        }
    })
}

/// Searches for an image and saves the first one that downloads.
pub struct ImageFetcher {
    search: Box<dyn ImageSearch>,
    dest_dir: PathBuf,
    http_client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new(
        search: Box<dyn ImageSearch>,
        dest_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            search,
            dest_dir: dest_dir.into(),
            http_client: http_client()?,
        })
    }

    /// Search for `query` and write the image to `<dest_dir>/<name>.jpg`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when the search
    /// has no results. If the top result answers with a non-success status,
    /// the second result is tried once; any other failure, or a second
    /// failure, is returned and nothing is written.
    pub async fn fetch(&self, query: &str, name: &str) -> Result<Option<PathBuf>, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "Image query cannot be empty".to_string(),
            ));
        }

        let candidates = self.search.search(query).await?;
        let Some(primary) = candidates.first() else {
            tracing::info!(source = self.search.name(), query, "no image results");
            return Ok(None);
        };

        let image = match self.download(&primary.url).await {
            Ok(image) => image,
            Err(err @ PipelineError::RemoteService { .. }) => {
                let Some(fallback) = candidates.get(1) else {
                    return Err(err);
                };
                tracing::warn!(
                    failed = %primary.url,
                    fallback = %fallback.url,
                    "top image download failed: {}",
                    err
                );
                self.download(&fallback.url).await?
            }
            Err(err) => return Err(err),
        };

        tokio::fs::create_dir_all(&self.dest_dir).await?;
        let dest = artifact_path(&self.dest_dir, name, "jpg");
        tokio::fs::write(&dest, &image).await?;

        Ok(Some(dest))
    }

    async fn download(&self, url: &str) -> Result<Bytes, PipelineError> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::from_response("image download", response).await);
        }
        Ok(response.bytes().await?)
    }
}
