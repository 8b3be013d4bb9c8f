//! Shrinkray Core - Catalog compression pipeline
//!
//! This crate provides the building blocks for re-compressing a remote
//! media catalog: paginated asset enumeration with look-ahead prefetch,
//! image/video compression via external encoders, a size-based
//! accept/reject gate, and an idempotent replace-and-mark sequence that
//! makes repeated runs skip assets they already improved.

pub mod catalog;
pub mod compress;
pub mod config;
pub mod enumerate;
pub mod gate;
pub mod replace;
pub mod scheduler;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use catalog::{Asset, CatalogApi, CatalogError, HttpCatalog};
pub use compress::CompressError;
pub use config::ShrinkrayConfig;
pub use gate::Outcome;
pub use scheduler::{Pipeline, RunSummary};

/// Core errors that can bubble up from any Shrinkray subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ShrinkrayError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Compression error: {0}")]
    Compress(#[from] CompressError),

    #[error("Unsupported asset type: {asset_type}")]
    UnsupportedAssetType { asset_type: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShrinkrayError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ShrinkrayError::Catalog(e) => match e {
                CatalogError::BadStatus { status, .. } => {
                    format!("Catalog request rejected with status {status}")
                }
                CatalogError::Transport { reason } => {
                    format!("Could not reach catalog server: {reason}")
                }
                _ => "Catalog error occurred".to_string(),
            },
            ShrinkrayError::Compress(_) => "Compression error occurred".to_string(),
            ShrinkrayError::UnsupportedAssetType { asset_type } => {
                format!("Asset type {asset_type} has no configured compressor")
            }
            ShrinkrayError::Configuration { reason } => {
                format!("Configuration error: {reason}")
            }
            ShrinkrayError::Cancelled => "Run cancelled".to_string(),
            ShrinkrayError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ShrinkrayError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, ShrinkrayError>;
