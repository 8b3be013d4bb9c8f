//! Compression Gate: decides whether a compressed artifact is worth
//! committing.
//!
//! The replacement condition is `saved * 100 > original * diff_percent`
//! in integer math with a strict inequality, so a saving exactly on the
//! threshold skips. A zero-length output is never treated as a 100%
//! reduction; it is a broken transform and fails the asset.

use std::sync::Arc;

use crate::catalog::{Asset, AssetType, CatalogApi};
use crate::compress::{CompressError, Compressor};
use crate::replace::ReplacementCoordinator;
use crate::{Result, ShrinkrayError};

/// Per-asset result of one pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Artifact committed; the original was replaced.
    Replaced { saved_bytes: u64 },
    /// Compression succeeded but did not clear the threshold.
    SkippedNoGain,
    /// Marker timestamp at or after the cutoff.
    SkippedAlreadyProcessed,
    /// Dropped by the enumeration predicate (trashed, wrong type).
    SkippedFilter,
}

/// True when replacing saves strictly more than `diff_percent` percent.
///
/// Integer arithmetic throughout; u128 keeps `original * 100` exact for
/// any file size.
pub fn should_replace(original: u64, compressed: u64, diff_percent: u8) -> bool {
    if compressed >= original {
        return false;
    }
    let saved = u128::from(original - compressed);
    saved * 100 > u128::from(original) * u128::from(diff_percent)
}

fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Runs one asset through compression, the size check, and (on accept)
/// the replacement sequence.
pub struct CompressionGate {
    image: Arc<dyn Compressor>,
    video: Arc<dyn Compressor>,
    diff_percent: u8,
}

impl CompressionGate {
    pub fn new(image: Arc<dyn Compressor>, video: Arc<dyn Compressor>, diff_percent: u8) -> Self {
        Self {
            image,
            video,
            diff_percent,
        }
    }

    /// Evaluates one asset.
    ///
    /// # Errors
    /// - `ShrinkrayError::UnsupportedAssetType` - no compressor for type
    /// - `ShrinkrayError::Compress` - transform failed or empty output
    /// - `ShrinkrayError::Catalog` - a replacement step failed
    pub async fn evaluate(
        &self,
        catalog: &dyn CatalogApi,
        coordinator: &ReplacementCoordinator,
        asset: &Asset,
    ) -> Result<Outcome> {
        let compressor: &dyn Compressor = match asset.asset_type {
            AssetType::Image => self.image.as_ref(),
            AssetType::Video => self.video.as_ref(),
            AssetType::Other => {
                return Err(ShrinkrayError::UnsupportedAssetType {
                    asset_type: asset.asset_type.to_string(),
                });
            }
        };

        let artifact = compressor.compress(catalog, asset).await?;
        if artifact.size_bytes() == 0 {
            return Err(CompressError::EmptyOutput {
                name: asset.original_file_name.clone(),
            }
            .into());
        }

        let original = asset.size_bytes();
        let converted = artifact.size_bytes();
        if !should_replace(original, converted, self.diff_percent) {
            println!(
                "✗ Skipped: {} (Original: {:.2} MB, Converted: {:.2} MB, No size reduction)",
                asset.original_file_name,
                bytes_to_mib(original),
                bytes_to_mib(converted)
            );
            return Ok(Outcome::SkippedNoGain);
        }

        coordinator
            .replace(asset, artifact, compressor.target_extension())
            .await?;

        let saved_bytes = original - converted;
        println!(
            "✓ Replaced: {} (Original: {:.2} MB, Converted: {:.2} MB, Saved: {:.2} MB)",
            asset.original_file_name,
            bytes_to_mib(original),
            bytes_to_mib(converted),
            bytes_to_mib(saved_bytes)
        );
        Ok(Outcome::Replaced { saved_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_replace_when_saving_clears_threshold() {
        // 10 MiB -> 5 MiB saves 50%, well past 8%
        assert!(should_replace(10 * MIB, 5 * MIB, 8));
    }

    #[test]
    fn test_skip_on_exact_threshold() {
        // Saving exactly 8% of 100 MiB: strict inequality skips
        let original = 100 * MIB;
        let saved = original * 8 / 100;
        assert!(!should_replace(original, original - saved, 8));
        // One byte more crosses it
        assert!(should_replace(original, original - saved - 1, 8));
    }

    #[test]
    fn test_skip_when_output_grew() {
        assert!(!should_replace(10 * MIB, 12 * MIB, 8));
        assert!(!should_replace(10 * MIB, 10 * MIB, 8));
    }

    #[test]
    fn test_zero_diff_percent_requires_any_saving() {
        assert!(should_replace(1000, 999, 0));
        assert!(!should_replace(1000, 1000, 0));
    }

    #[test]
    fn test_unknown_original_size_never_replaces() {
        // Catalog reported no size; 0 saved can never exceed anything
        assert!(!should_replace(0, 100, 8));
        assert!(!should_replace(0, 0, 0));
    }
}
