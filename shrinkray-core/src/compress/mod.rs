//! Compression capability: per-asset-type transforms producing a
//! smaller artifact.
//!
//! Both implementations shell out to ffmpeg with deterministically
//! derived arguments; the pipeline only sees the [`Compressor`] trait
//! and the resulting [`CompressedArtifact`].

pub mod image;
pub mod video;

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;

pub use image::{ImageCompressor, ImageFormat};
pub use video::{VideoCodec, VideoCompressor, VideoContainer};

use crate::catalog::{Asset, CatalogApi, CatalogError};

/// Errors that can occur while producing a compressed artifact.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("Encoder spawn failed: {reason}")]
    EncoderSpawn { reason: String },

    #[error("Encoder failed: {reason}")]
    EncoderFailed { reason: String },

    #[error("Compression produced empty output for '{name}'")]
    EmptyOutput { name: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A produced compression output: a finite, seekable temp file with a
/// known length.
///
/// Exclusively owned by whoever holds it; the backing file is reclaimed
/// when the artifact is dropped, on every exit path.
#[derive(Debug)]
pub struct CompressedArtifact {
    file: NamedTempFile,
    size: u64,
}

impl CompressedArtifact {
    /// Wraps a finished temp file, recording its byte length.
    pub fn measure(file: NamedTempFile) -> std::io::Result<Self> {
        let size = std::fs::metadata(file.path())?.len();
        Ok(Self { file, size })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size
    }
}

/// A size-reducing transform for one asset type.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// File extension of the produced artifact, used for the
    /// replacement's filename.
    fn target_extension(&self) -> &'static str;

    /// Downloads the asset's source and produces a re-encoded artifact.
    ///
    /// # Errors
    /// - `CompressError::Catalog` - source download failed
    /// - `CompressError::EncoderSpawn` / `EncoderFailed` - ffmpeg failed
    async fn compress(
        &self,
        catalog: &dyn CatalogApi,
        asset: &Asset,
    ) -> Result<CompressedArtifact, CompressError>;
}

/// Runs ffmpeg to completion, surfacing stderr on failure.
pub(crate) async fn run_ffmpeg(args: &[String]) -> Result<(), CompressError> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CompressError::EncoderSpawn {
            reason: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CompressError::EncoderFailed {
            reason: format!("ffmpeg exited with {}: {stderr}", output.status),
        })
    }
}

/// Temp file whose suffix preserves the given extension so encoders can
/// sniff the container from the name.
pub(crate) fn temp_file_with_extension(extension: &str) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("shrinkray-")
        .suffix(&format!(".{extension}"))
        .tempfile()
}

/// Extension of the asset's original file, used for the temp input file.
pub(crate) fn source_extension(asset: &Asset) -> &str {
    Path::new(&asset.original_file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::AssetType;

    #[test]
    fn test_artifact_cleans_up_backing_file() {
        let file = temp_file_with_extension("jxl").unwrap();
        std::fs::write(file.path(), b"data").unwrap();
        let artifact = CompressedArtifact::measure(file).unwrap();
        let path = artifact.path().to_path_buf();

        assert_eq!(artifact.size_bytes(), 4);
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_source_extension_fallback() {
        let mut asset = crate::catalog::types::test_asset("a", AssetType::Image, 10);
        assert_eq!(source_extension(&asset), "jpg");

        asset.original_file_name = "no-extension".to_string();
        assert_eq!(source_extension(&asset), "bin");
    }
}
