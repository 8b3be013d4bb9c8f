//! Remote media catalog collaborator.
//!
//! The pipeline never mutates assets in place; everything goes through
//! the [`CatalogApi`] trait, implemented for production by the
//! reqwest-backed [`HttpCatalog`] and by in-memory mocks in tests.

pub mod api;
pub mod http;
pub mod tags;
pub mod types;

pub use api::CatalogApi;
pub use http::HttpCatalog;
pub use tags::{MARKER_ROOT_TAG, MarkerTags};
pub use types::{Asset, AssetType, MetadataItem, SearchFilter, SearchPage, Tag, UploadRequest};

/// Errors that can occur while talking to the remote catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Catalog returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Invalid catalog URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("Malformed identifier '{value}': {reason}")]
    InvalidId { value: String, reason: String },

    #[error("Malformed page token '{token}'")]
    InvalidPageToken { token: String },

    #[error("Failed to parse catalog response: {reason}")]
    Parse { reason: String },

    #[error("Tag resolution failed: {reason}")]
    TagResolution { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CatalogError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            CatalogError::Parse {
                reason: error.to_string(),
            }
        } else {
            CatalogError::Transport {
                reason: error.to_string(),
            }
        }
    }
}

impl CatalogError {
    /// Builds the malformed-identifier error for an unparseable uuid.
    pub fn invalid_id(value: &str, error: uuid::Error) -> Self {
        CatalogError::InvalidId {
            value: value.to_string(),
            reason: error.to_string(),
        }
    }
}
