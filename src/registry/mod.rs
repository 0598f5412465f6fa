//! Read-only client for the Docker Registry HTTP API v2

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status} for {url}")]
    Status { status: u16, url: String },
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[allow(dead_code)]
    name: String,
    // the registry reports `null` once every tag of an image was deleted
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Client for `/v2/_catalog` and `/v2/<image>/tags/list`
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Create a client; `base_url` may omit the scheme (`localhost:5000`)
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let trimmed = base_url.trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, RegistryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }

    /// Repositories known to the registry
    pub async fn catalog(&self) -> Result<Vec<String>, RegistryError> {
        let catalog: CatalogResponse = self.get("/v2/_catalog").await?;
        Ok(catalog.repositories)
    }

    /// Tags of one repository
    pub async fn tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
        let image = image.trim_matches('/');
        let tags: TagsResponse = self.get(&format!("/v2/{}/tags/list", image)).await?;
        Ok(tags.tags.unwrap_or_default())
    }
}
