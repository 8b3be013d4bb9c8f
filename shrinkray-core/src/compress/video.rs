//! Video transcoding via ffmpeg.

use async_trait::async_trait;

use super::{
    CompressError, CompressedArtifact, Compressor, run_ffmpeg, source_extension,
    temp_file_with_extension,
};
use crate::catalog::{Asset, CatalogApi};
use crate::config::VideoSettings;

/// Target video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VideoCodec {
    Av1,
    Hevc,
    H264,
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::Av1 => write!(f, "av1"),
            VideoCodec::Hevc => write!(f, "hevc"),
            VideoCodec::H264 => write!(f, "h264"),
        }
    }
}

/// Target video containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VideoContainer {
    Mkv,
    Mp4,
}

impl VideoContainer {
    /// File extension of the produced video.
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Mkv => "mkv",
            VideoContainer::Mp4 => "mp4",
        }
    }
}

impl std::fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Builds the ffmpeg invocation for one transcode.
///
/// Each codec maps to a fixed encoder and speed/profile preset; the
/// quality value is passed verbatim as the CRF rate-control parameter.
pub fn encode_args(
    input: &std::path::Path,
    output: &std::path::Path,
    codec: VideoCodec,
    quality: u8,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.display().to_string(),
    ];

    let codec_args: &[&str] = match codec {
        // 10-bit SVT-AV1; preset 5 trades encode time for compression
        VideoCodec::Av1 => &[
            "-c:v",
            "libsvtav1",
            "-pix_fmt",
            "yuv420p10le",
            "-preset",
            "5",
            "-c:a",
            "libopus",
            "-b:a",
            "128k",
        ],
        // 10-bit main10 x265, 'slow' preset
        VideoCodec::Hevc => &[
            "-c:v",
            "libx265",
            "-profile:v",
            "main10",
            "-pix_fmt",
            "yuv420p10le",
            "-preset",
            "slow",
            "-c:a",
            "libopus",
            "-b:a",
            "128k",
        ],
        // 8-bit high-profile x264 with aac for maximum compatibility
        VideoCodec::H264 => &[
            "-c:v",
            "libx264",
            "-profile:v",
            "high",
            "-pix_fmt",
            "yuv420p",
            "-preset",
            "slow",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
        ],
    };
    args.extend(codec_args.iter().map(|s| s.to_string()));

    args.extend(["-crf".to_string(), quality.to_string()]);
    args.push(output.display().to_string());
    args
}

/// Video compressor: downloads the original to a temp file and runs the
/// external encoder over it.
#[derive(Debug, Clone)]
pub struct VideoCompressor {
    codec: VideoCodec,
    container: VideoContainer,
    quality: u8,
}

impl VideoCompressor {
    pub fn new(settings: &VideoSettings) -> Self {
        Self {
            codec: settings.codec,
            container: settings.container,
            quality: settings.quality,
        }
    }
}

#[async_trait]
impl Compressor for VideoCompressor {
    fn target_extension(&self) -> &'static str {
        self.container.extension()
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
            "Downloaded {} ({downloaded} bytes) for transcode to {} in {}",
            asset.original_file_name,
            self.codec,
            self.container
        );

        let output = temp_file_with_extension(self.container.extension())?;
        let args = encode_args(input.path(), output.path(), self.codec, self.quality);
        run_ffmpeg(&args).await?;

        Ok(CompressedArtifact::measure(output)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_av1_args() {
        let args = encode_args(Path::new("in.mov"), Path::new("out.mkv"), VideoCodec::Av1, 30);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libsvtav1"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "5"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p10le"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "30"]));
        assert_eq!(args.last().unwrap(), "out.mkv");
    }

    #[test]
    fn test_hevc_args() {
        let args = encode_args(Path::new("in.mov"), Path::new("out.mkv"), VideoCodec::Hevc, 24);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx265"]));
        assert!(args.windows(2).any(|w| w == ["-profile:v", "main10"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "slow"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "24"]));
    }

    #[test]
    fn test_h264_args_use_aac() {
        let args = encode_args(Path::new("in.mov"), Path::new("out.mp4"), VideoCodec::H264, 20);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
    }

    #[test]
    fn test_container_extension() {
        let compressor = VideoCompressor::new(&VideoSettings::default());
        assert_eq!(compressor.target_extension(), "mkv");
        assert_eq!(VideoContainer::Mp4.extension(), "mp4");
    }
}
