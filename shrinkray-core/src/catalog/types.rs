//! Wire types for the catalog API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogError;
use super::tags;

/// Media type of a catalog asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Image,
    Video,
    /// Anything the pipeline has no compressor for (audio, sidecars, ...)
    #[serde(other)]
    Other,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Image => write!(f, "IMAGE"),
            AssetType::Video => write!(f, "VIDEO"),
            AssetType::Other => write!(f, "OTHER"),
        }
    }
}

/// A tag attached to an asset. `value` carries the fully qualified
/// tag path; processing markers encode their timestamp there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Exif block returned with search results; only the byte size matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifInfo {
    #[serde(default)]
    pub file_size_in_byte: Option<i64>,
}

/// One media item held by the remote catalog.
///
/// Owned by the catalog; the pipeline only reads it and requests
/// mutation through [`super::CatalogApi`] calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub original_file_name: String,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub device_asset_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub duration: Option<String>,
    pub file_created_at: DateTime<Utc>,
    pub file_modified_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_trashed: bool,
    #[serde(default)]
    pub has_metadata: bool,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub live_photo_video_id: Option<String>,
    #[serde(default)]
    pub exif_info: Option<ExifInfo>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
}

impl Asset {
    /// Original byte size as reported by the catalog, 0 when unknown.
    pub fn size_bytes(&self) -> u64 {
        self.exif_info
            .as_ref()
            .and_then(|exif| exif.file_size_in_byte)
            .map(|size| size.max(0) as u64)
            .unwrap_or(0)
    }

    /// Parses the opaque asset id into a uuid for mutation calls.
    ///
    /// # Errors
    /// - `CatalogError::InvalidId` - id is not a valid uuid
    pub fn parsed_id(&self) -> Result<Uuid, CatalogError> {
        Uuid::parse_str(&self.id).map_err(|e| CatalogError::invalid_id(&self.id, e))
    }

    /// Most recent processing-marker timestamp attached to this asset,
    /// or None when the asset was never processed.
    pub fn marker_timestamp(&self) -> Option<DateTime<Utc>> {
        self.tags
            .as_ref()?
            .iter()
            .filter_map(tags::marker_timestamp)
            .max()
    }
}

/// Server-side enumeration predicate.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to a single asset type (None = all types)
    pub asset_type: Option<AssetType>,
    /// Restrict to an explicit id set (empty = no restriction)
    pub ids: Vec<Uuid>,
}

/// One page of a paginated asset listing.
///
/// `next_page` is an opaque token; None signals the end of the data.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<Asset>,
    pub next_page: Option<String>,
}

/// Custom key-value metadata carried from the original onto its replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: serde_json::Value,
}

/// Fields of a multipart asset upload, mirrored from the original asset
/// so the replacement is indistinguishable in every surrounding system.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub device_asset_id: String,
    pub device_id: String,
    pub duration: Option<String>,
    pub file_created_at: DateTime<Utc>,
    pub file_modified_at: DateTime<Utc>,
    pub file_name: String,
    pub is_favorite: bool,
    pub visibility: Option<String>,
    pub live_photo_video_id: Option<String>,
    pub metadata: Vec<MetadataItem>,
}

/// Builds a minimal asset for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_asset(id: &str, asset_type: AssetType, size: i64) -> Asset {
    Asset {
        id: id.to_string(),
        asset_type,
        original_file_name: "holiday.jpg".to_string(),
        original_path: "/library/holiday.jpg".to_string(),
        device_asset_id: "device-asset".to_string(),
        device_id: "device".to_string(),
        duration: None,
        file_created_at: Utc::now(),
        file_modified_at: Utc::now(),
        is_favorite: false,
        is_trashed: false,
        has_metadata: false,
        visibility: None,
        live_photo_video_id: None,
        exif_info: Some(ExifInfo {
            file_size_in_byte: Some(size),
        }),
        tags: None,
    }
}
