//! CLI command implementations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use shrinkray_core::catalog::{AssetType, HttpCatalog};
use shrinkray_core::compress::{ImageFormat, VideoCodec, VideoContainer};
use shrinkray_core::config::{ImageSettings, ShrinkrayConfig, VideoSettings};
use shrinkray_core::scheduler::Pipeline;
use shrinkray_core::Result;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Asset type restriction for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TypeFilter {
    All,
    Image,
    Video,
}

impl TypeFilter {
    fn as_asset_type(self) -> Option<AssetType> {
        match self {
            TypeFilter::All => None,
            TypeFilter::Image => Some(AssetType::Image),
            TypeFilter::Video => Some(AssetType::Video),
        }
    }
}

impl std::fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeFilter::All => write!(f, "all"),
            TypeFilter::Image => write!(f, "image"),
            TypeFilter::Video => write!(f, "video"),
        }
    }
}

#[derive(Args)]
pub struct CompressArgs {
    /// Catalog server base URL
    #[arg(long)]
    pub server: String,

    /// Catalog API key
    #[arg(long)]
    pub api_key: String,

    /// Restrict the run to one asset type
    #[arg(long = "type", value_enum, default_value_t = TypeFilter::All)]
    pub type_filter: TypeFilter,

    /// Only process these asset ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<Uuid>,

    /// Concurrent workers (default: available core count)
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Stop after this many replaced-or-skipped assets (default 0 = unbounded)
    #[arg(long)]
    pub limit: Option<i64>,

    /// Re-process assets whose marker is older than this RFC 3339 time.
    /// When omitted, any already-marked asset is left alone.
    #[arg(long)]
    pub after: Option<DateTime<Utc>>,

    /// Minimum size reduction percent required to replace (default 8)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub diff_percent: Option<u8>,

    /// Target still-image format
    #[arg(long, value_enum, default_value_t = ImageFormat::Jxl)]
    pub image_format: ImageFormat,

    /// Image quality, 1-100
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub image_quality: u8,

    /// Target video codec
    #[arg(long, value_enum, default_value_t = VideoCodec::Av1)]
    pub video_codec: VideoCodec,

    /// Target video container
    #[arg(long, value_enum, default_value_t = VideoContainer::Mkv)]
    pub video_container: VideoContainer,

    /// Video quality as CRF, lower is better
    #[arg(long, default_value_t = 30)]
    pub video_quality: u8,

    /// Permanently delete replaced originals instead of trashing them
    #[arg(long)]
    pub force_delete: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Re-compress catalog assets and replace the originals
    Compress(CompressArgs),
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Compress(args) => compress(args).await,
    }
}

/// Run one compression pass over the catalog
///
/// # Errors
/// - `ShrinkrayError::Catalog` - Server unreachable or rejected a request
/// - `ShrinkrayError::Compress` - An encoder invocation failed
/// - `ShrinkrayError::Cancelled` - Interrupted before completion
async fn compress(args: CompressArgs) -> Result<()> {
    let config = build_config(args);

    let catalog = HttpCatalog::connect(&config.catalog).await?;
    tracing::info!("Connected to catalog at {}", config.catalog.base_url);

    let pipeline = Pipeline::new(Arc::new(catalog), &config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, draining in-flight work...");
            interrupt.cancel();
        }
    });

    let summary = pipeline.run(cancel).await?;
    println!("Replaced {} assets", summary.replaced);
    Ok(())
}

/// Environment defaults overlaid with the command-line flags.
fn build_config(args: CompressArgs) -> ShrinkrayConfig {
    let mut config = ShrinkrayConfig::from_env();

    config.catalog.base_url = args.server;
    config.catalog.api_key = args.api_key;

    config.run.asset_type = args.type_filter.as_asset_type();
    config.run.ids = args.ids;
    config.run.force_delete = args.force_delete;
    if let Some(parallel) = args.parallel {
        config.run.parallelism = parallel;
    }
    if let Some(limit) = args.limit {
        config.run.limit = limit;
    }
    if let Some(percent) = args.diff_percent {
        config.run.diff_percent = percent;
    }
    if let Some(after) = args.after {
        config.run.cutoff = after;
    }

    config.image = ImageSettings {
        format: args.image_format,
        quality: args.image_quality,
    };
    config.video = VideoSettings {
        codec: args.video_codec,
        container: args.video_container,
        quality: args.video_quality,
    };

    config
}
