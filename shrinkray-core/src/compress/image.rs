//! Still-image re-encoding via ffmpeg.

use async_trait::async_trait;

use super::{
    CompressError, CompressedArtifact, Compressor, run_ffmpeg, source_extension,
    temp_file_with_extension,
};
use crate::catalog::{Asset, CatalogApi};
use crate::config::ImageSettings;

/// Target still-image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImageFormat {
    Jpeg,
    Jxl,
    Webp,
    Avif,
}

impl ImageFormat {
    /// File extension of the produced image.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Jxl => "jxl",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Maps a 1-100 quality onto mjpeg's inverted 2-31 qscale.
fn jpeg_qscale(quality: u8) -> u32 {
    (31u32.saturating_sub(u32::from(quality) * 29 / 100)).clamp(2, 31)
}

/// Maps a 1-100 quality onto libjxl's Butteraugli distance
/// (0.0 = lossless, larger = lossier).
fn jxl_distance(quality: u8) -> f32 {
    f32::from(100u8.saturating_sub(quality.min(100))) / 10.0
}

/// Maps a 1-100 quality onto libaom's 0-63 CRF (0 = best).
fn avif_crf(quality: u8) -> u32 {
    63u32.saturating_sub(u32::from(quality.min(100)) * 63 / 100)
}

/// Builds the ffmpeg invocation for one still-image re-encode.
///
/// Arguments derive deterministically from (format, quality) so the same
/// request always produces the same invocation.
pub fn encode_args(
    input: &std::path::Path,
    output: &std::path::Path,
    format: ImageFormat,
    quality: u8,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.display().to_string(),
    ];

    match format {
        ImageFormat::Jpeg => {
            args.extend(["-c:v".to_string(), "mjpeg".to_string()]);
            args.extend(["-q:v".to_string(), jpeg_qscale(quality).to_string()]);
        }
        ImageFormat::Jxl => {
            args.extend(["-c:v".to_string(), "libjxl".to_string()]);
            args.extend(["-distance".to_string(), format!("{:.1}", jxl_distance(quality))]);
            args.extend(["-effort".to_string(), "9".to_string()]);
        }
        ImageFormat::Webp => {
            args.extend(["-c:v".to_string(), "libwebp".to_string()]);
            args.extend(["-quality".to_string(), quality.to_string()]);
        }
        ImageFormat::Avif => {
            args.extend(["-c:v".to_string(), "libaom-av1".to_string()]);
            args.extend(["-still-picture".to_string(), "1".to_string()]);
            args.extend(["-crf".to_string(), avif_crf(quality).to_string()]);
        }
    }

    args.extend(["-frames:v".to_string(), "1".to_string()]);
    args.push(output.display().to_string());
    args
}

/// Image compressor: downloads the original and re-encodes it into the
/// configured format.
#[derive(Debug, Clone)]
pub struct ImageCompressor {
    format: ImageFormat,
    quality: u8,
}

impl ImageCompressor {
    pub fn new(settings: &ImageSettings) -> Self {
        Self {
            format: settings.format,
            quality: settings.quality,
        }
    }
}

#[async_trait]
impl Compressor for ImageCompressor {
    fn target_extension(&self) -> &'static str {
        self.format.extension()
    }

    async fn compress(
        &self,
        catalog: &dyn CatalogApi,
        asset: &Asset,
    ) -> Result<CompressedArtifact, CompressError> {
        let id = asset.parsed_id()?;

        let input = temp_file_with_extension(source_extension(asset))?;
        let downloaded = catalog.download_asset(id, input.path()).await?;
        tracing::debug!(
            "Downloaded {} ({downloaded} bytes) for image re-encode",
            asset.original_file_name
        );

        let output = temp_file_with_extension(self.format.extension())?;
        let args = encode_args(input.path(), output.path(), self.format, self.quality);
        run_ffmpeg(&args).await?;

        Ok(CompressedArtifact::measure(output)?)
    }
}
