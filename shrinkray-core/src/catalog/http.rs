//! Reqwest-backed catalog client.
//!
//! Speaks the Immich-style REST surface: paginated metadata search,
//! original download, multipart upload, relationship copy, bulk delete,
//! and tag management. The API key travels as a default header on every
//! request; construction fails fast when the server rejects the ping.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;
use uuid::Uuid;

use super::CatalogError;
use super::api::CatalogApi;
use super::types::{Asset, AssetType, MetadataItem, SearchFilter, SearchPage, Tag, UploadRequest};
use crate::config::CatalogConfig;

const API_KEY_HEADER: &str = "x-api-key";

/// Production catalog client.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    asset_type: Option<AssetType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ids: Vec<Uuid>,
    with_exif: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    assets: SearchAssets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAssets {
    items: Vec<Asset>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CopyBody {
    source_id: Uuid,
    target_id: Uuid,
    albums: bool,
    favorite: bool,
    shared_links: bool,
    sidecar: bool,
    stack: bool,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    ids: &'a [Uuid],
    force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTagBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkTagBody<'a> {
    asset_ids: &'a [Uuid],
    tag_ids: &'a [Uuid],
}

#[derive(Debug, Deserialize)]
struct CreatedAsset {
    id: String,
}

impl HttpCatalog {
    /// Connects to the catalog server and verifies it responds.
    ///
    /// # Errors
    /// - `CatalogError::InvalidUrl` - base URL does not parse
    /// - `CatalogError::Transport` - server unreachable
    /// - `CatalogError::BadStatus` - ping rejected (bad API key, proxy error)
    pub async fn connect(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| CatalogError::InvalidUrl {
            reason: format!("'{}': {e}", config.base_url),
        })?;

        let mut headers = HeaderMap::new();
        let api_key =
            HeaderValue::from_str(&config.api_key).map_err(|e| CatalogError::Transport {
                reason: format!("API key is not a valid header value: {e}"),
            })?;
        headers.insert(API_KEY_HEADER, api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(CatalogError::from)?;

        let catalog = Self { client, base_url };
        catalog.ping().await?;

        Ok(catalog)
    }

    fn url(&self, path: &str) -> Result<Url, CatalogError> {
        self.base_url
            .join(path)
            .map_err(|e| CatalogError::InvalidUrl {
                reason: format!("'{path}': {e}"),
            })
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::BadStatus {
            status: status.as_u16(),
            body,
        })
    }
}

/// First page of a listing when no token has been seen yet.
const FIRST_PAGE: u32 = 1;

fn parse_page_token(token: Option<&str>) -> Result<u32, CatalogError> {
    match token {
        None => Ok(FIRST_PAGE),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| CatalogError::InvalidPageToken {
                token: raw.to_string(),
            }),
    }
}

#[async_trait]
impl CatalogApi for HttpCatalog {
    async fn ping(&self) -> Result<(), CatalogError> {
        let response = self.client.get(self.url("api/server/ping")?).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn search_assets(
        &self,
        filter: &SearchFilter,
        page: Option<&str>,
    ) -> Result<SearchPage, CatalogError> {
        let body = SearchBody {
            page: Some(parse_page_token(page)?),
            asset_type: filter.asset_type,
            ids: filter.ids.clone(),
            with_exif: true,
        };

        let response = self
            .client
            .post(self.url("api/search/metadata")?)
            .json(&body)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let parsed: SearchResponse = response.json().await?;
        Ok(SearchPage {
            items: parsed.assets.items,
            // The server signals the final page with an absent token.
            next_page: parsed.assets.next_page.filter(|t| !t.is_empty()),
        })
    }

    async fn download_asset(&self, id: Uuid, dest: &Path) -> Result<u64, CatalogError> {
        let response = self
            .client
            .get(self.url(&format!("api/assets/{id}/original"))?)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn asset_metadata(&self, id: Uuid) -> Result<Vec<MetadataItem>, CatalogError> {
        let response = self
            .client
            .get(self.url(&format!("api/assets/{id}/metadata"))?)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn upload_asset(
        &self,
        request: &UploadRequest,
        data: &Path,
    ) -> Result<Uuid, CatalogError> {
        let file = tokio::fs::File::open(data).await?;
        let part = Part::stream(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .file_name(request.file_name.clone());

        let metadata_json =
            serde_json::to_string(&request.metadata).map_err(|e| CatalogError::Parse {
                reason: e.to_string(),
            })?;

        let mut form = Form::new()
            .part("assetData", part)
            .text("deviceAssetId", request.device_asset_id.clone())
            .text("deviceId", request.device_id.clone())
            .text("filename", request.file_name.clone())
            .text("fileCreatedAt", request.file_created_at.to_rfc3339())
            .text("fileModifiedAt", request.file_modified_at.to_rfc3339())
            .text("isFavorite", request.is_favorite.to_string())
            .text("metadata", metadata_json);

        if let Some(duration) = &request.duration {
            form = form.text("duration", duration.clone());
        }
        if let Some(visibility) = &request.visibility {
            form = form.text("visibility", visibility.clone());
        }
        if let Some(live_photo) = &request.live_photo_video_id {
            form = form.text("livePhotoVideoId", live_photo.clone());
        }

        let response = self
            .client
            .post(self.url("api/assets")?)
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let created: CreatedAsset = response.json().await?;
        Uuid::parse_str(&created.id).map_err(|e| CatalogError::invalid_id(&created.id, e))
    }

    async fn copy_relationships(&self, source: Uuid, target: Uuid) -> Result<(), CatalogError> {
        let body = CopyBody {
            source_id: source,
            target_id: target,
            albums: true,
            favorite: true,
            shared_links: true,
            sidecar: true,
            stack: false,
        };

        let response = self
            .client
            .post(self.url("api/assets/copy")?)
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn delete_assets(&self, ids: &[Uuid], force: bool) -> Result<(), CatalogError> {
        let response = self
            .client
            .delete(self.url("api/assets")?)
            .json(&DeleteBody { ids, force })
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn all_tags(&self) -> Result<Vec<Tag>, CatalogError> {
        let response = self.client.get(self.url("api/tags")?).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn create_tag(&self, name: &str, parent: Option<Uuid>) -> Result<Tag, CatalogError> {
        let response = self
            .client
            .post(self.url("api/tags")?)
            .json(&CreateTagBody {
                name,
                parent_id: parent,
            })
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn tag_assets(&self, tag_ids: &[Uuid], asset_ids: &[Uuid]) -> Result<(), CatalogError> {
        let response = self
            .client
            .put(self.url("api/tags/assets")?)
            .json(&BulkTagBody { asset_ids, tag_ids })
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
