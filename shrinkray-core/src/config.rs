//! Centralized configuration for Shrinkray.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::AssetType;
use crate::compress::{ImageFormat, VideoCodec, VideoContainer};

/// Central configuration for all Shrinkray components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ShrinkrayConfig {
    pub catalog: CatalogConfig,
    pub run: RunConfig,
    pub image: ImageSettings,
    pub video: VideoSettings,
}

/// Remote catalog connection configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL of the catalog server
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Connect timeout for catalog requests
    pub connect_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            connect_timeout: Duration::from_secs(30),
            user_agent: "shrinkray/0.1.0",
        }
    }
}

/// Pipeline run configuration: enumeration filters, worker budget,
/// and the replacement gate threshold.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum concurrently executing workers (must be >= 1)
    pub parallelism: usize,
    /// Stop after this many accepted assets (<= 0 means unbounded)
    pub limit: i64,
    /// Minimum size reduction, in percent of the original, required to replace
    pub diff_percent: u8,
    /// Assets with a processing marker at or after this time are skipped
    pub cutoff: DateTime<Utc>,
    /// Restrict enumeration to a single asset type (None = all types)
    pub asset_type: Option<AssetType>,
    /// Restrict enumeration to an explicit id set (empty = no restriction)
    pub ids: Vec<Uuid>,
    /// Bypass the trash stage when removing replaced originals
    pub force_delete: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get(),
            limit: 0,
            diff_percent: 8,
            // Any existing marker counts as processed unless the caller
            // moves the cutoff forward.
            cutoff: DateTime::UNIX_EPOCH,
            asset_type: None,
            ids: Vec::new(),
            force_delete: false,
        }
    }
}

/// Image re-encoding settings.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Target still-image format
    pub format: ImageFormat,
    /// Quality parameter, 1-100
    pub quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jxl,
            quality: 80,
        }
    }
}

/// Video transcoding settings.
#[derive(Debug, Clone)]
pub struct VideoSettings {
    /// Target video codec
    pub codec: VideoCodec,
    /// Target container
    pub container: VideoContainer,
    /// Constant rate factor passed verbatim to the encoder
    pub quality: u8,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Av1,
            container: VideoContainer::Mkv,
            quality: 30,
        }
    }
}

impl ShrinkrayConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(parallel) = std::env::var("SHRINKRAY_PARALLEL") {
            if let Ok(count) = parallel.parse::<usize>() {
                config.run.parallelism = count;
            }
        }

        if let Ok(limit) = std::env::var("SHRINKRAY_LIMIT") {
            if let Ok(count) = limit.parse::<i64>() {
                config.run.limit = count;
            }
        }

        if let Ok(percent) = std::env::var("SHRINKRAY_DIFF_PERCENT") {
            if let Ok(value) = percent.parse::<u8>() {
                config.run.diff_percent = value;
            }
        }

        if let Ok(timeout) = std::env::var("SHRINKRAY_CONNECT_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.catalog.connect_timeout = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Creates a configuration optimized for testing: single worker,
    /// tiny limit, permissive gate.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.run.parallelism = 1;
        config.run.limit = 10;
        config
    }
}
