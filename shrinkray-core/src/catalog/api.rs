//! Abstraction over the remote catalog to enable both real and mocked runs.

use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use super::CatalogError;
use super::types::{MetadataItem, SearchFilter, SearchPage, Tag, UploadRequest};

/// Operations the pipeline consumes from the remote catalog.
///
/// Production uses [`super::HttpCatalog`]; tests implement this trait
/// with in-memory state.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Check that the server is reachable and the API key is accepted.
    async fn ping(&self) -> Result<(), CatalogError>;

    /// Fetch one page of the asset listing.
    ///
    /// `page` is the opaque token from the previous page's
    /// [`SearchPage::next_page`], or None for the first page.
    async fn search_assets(
        &self,
        filter: &SearchFilter,
        page: Option<&str>,
    ) -> Result<SearchPage, CatalogError>;

    /// Download an asset's original binary into `dest`, returning the
    /// number of bytes written.
    async fn download_asset(&self, id: Uuid, dest: &Path) -> Result<u64, CatalogError>;

    /// Fetch the custom key-value metadata attached to an asset.
    async fn asset_metadata(&self, id: Uuid) -> Result<Vec<MetadataItem>, CatalogError>;

    /// Multipart upload of a new asset, streaming the file at `data`.
    /// Returns the id of the created entry.
    async fn upload_asset(
        &self,
        request: &UploadRequest,
        data: &Path,
    ) -> Result<Uuid, CatalogError>;

    /// Copy album membership, favorites, sidecars, and shared links
    /// from `source` onto `target`.
    async fn copy_relationships(&self, source: Uuid, target: Uuid) -> Result<(), CatalogError>;

    /// Bulk delete. `force` bypasses the trash stage.
    async fn delete_assets(&self, ids: &[Uuid], force: bool) -> Result<(), CatalogError>;

    /// List every tag known to the catalog.
    async fn all_tags(&self) -> Result<Vec<Tag>, CatalogError>;

    /// Create a tag, optionally under a parent.
    async fn create_tag(&self, name: &str, parent: Option<Uuid>) -> Result<Tag, CatalogError>;

    /// Attach every tag in `tag_ids` to every asset in `asset_ids`.
    async fn tag_assets(&self, tag_ids: &[Uuid], asset_ids: &[Uuid]) -> Result<(), CatalogError>;
}
