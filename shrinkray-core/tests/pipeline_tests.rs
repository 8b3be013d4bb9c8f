//! End-to-end pipeline runs against an in-memory catalog.
//!
//! The compressors here never touch an encoder; they produce sparse
//! temp files of a scripted size so the gate and replacement logic can
//! be exercised deterministically.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use shrinkray_core::catalog::{
    Asset, AssetType, CatalogApi, CatalogError, MetadataItem, SearchFilter, SearchPage, Tag,
    UploadRequest,
};
use shrinkray_core::compress::{CompressError, CompressedArtifact, Compressor};
use shrinkray_core::config::{RunConfig, ShrinkrayConfig};
use shrinkray_core::scheduler::Pipeline;
use shrinkray_core::ShrinkrayError;

const MIB: i64 = 1024 * 1024;

fn asset(id: Uuid, asset_type: AssetType, size: i64) -> Asset {
    Asset {
        id: id.to_string(),
        asset_type,
        original_file_name: format!("{id}.src"),
        original_path: format!("/library/{id}.src"),
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
        exif_info: Some(shrinkray_core::catalog::types::ExifInfo {
            file_size_in_byte: Some(size),
        }),
        tags: None,
    }
}

/// In-memory catalog serving scripted pages and recording mutations.
#[derive(Default)]
struct MockCatalog {
    pages: Mutex<VecDeque<SearchPage>>,
    tags: Mutex<Vec<Tag>>,
    uploads: Mutex<Vec<String>>,
    tag_applications: Mutex<Vec<(Vec<Uuid>, Vec<Uuid>)>>,
    deletions: Mutex<Vec<(Uuid, bool)>>,
}

impl MockCatalog {
    fn with_pages(pages: Vec<SearchPage>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        })
    }

    fn single_page(items: Vec<Asset>) -> Arc<Self> {
        Self::with_pages(vec![SearchPage {
            items,
            next_page: None,
        }])
    }

    fn deletions(&self) -> Vec<(Uuid, bool)> {
        self.deletions.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Ids of assets that received the run's marker tag.
    fn marked(&self) -> Vec<Uuid> {
        let tags = self.tags.lock().unwrap();
        let marker_ids: Vec<Uuid> = tags
            .iter()
            .filter(|tag| tag.name.ends_with('Z'))
            .filter_map(|tag| Uuid::parse_str(&tag.id).ok())
            .collect();
        self.tag_applications
            .lock()
            .unwrap()
            .iter()
            .filter(|(tag_ids, _)| tag_ids.iter().any(|id| marker_ids.contains(id)))
            .flat_map(|(_, asset_ids)| asset_ids.clone())
            .collect()
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn search_assets(
        &self,
        _filter: &SearchFilter,
        _page: Option<&str>,
    ) -> Result<SearchPage, CatalogError> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn download_asset(&self, _id: Uuid, dest: &Path) -> Result<u64, CatalogError> {
        tokio::fs::write(dest, b"source-bytes").await?;
        Ok(12)
    }

    async fn asset_metadata(&self, _id: Uuid) -> Result<Vec<MetadataItem>, CatalogError> {
        Ok(Vec::new())
    }

    async fn upload_asset(
        &self,
        request: &UploadRequest,
        _data: &Path,
    ) -> Result<Uuid, CatalogError> {
        self.uploads.lock().unwrap().push(request.file_name.clone());
        Ok(Uuid::new_v4())
    }

    async fn copy_relationships(&self, _source: Uuid, _target: Uuid) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn delete_assets(&self, ids: &[Uuid], force: bool) -> Result<(), CatalogError> {
        let mut deletions = self.deletions.lock().unwrap();
        for id in ids {
            deletions.push((*id, force));
        }
        Ok(())
    }

    async fn all_tags(&self) -> Result<Vec<Tag>, CatalogError> {
        Ok(self.tags.lock().unwrap().clone())
    }

    async fn create_tag(&self, name: &str, _parent: Option<Uuid>) -> Result<Tag, CatalogError> {
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            value: None,
        };
        self.tags.lock().unwrap().push(tag.clone());
        Ok(tag)
    }

    async fn tag_assets(&self, tag_ids: &[Uuid], asset_ids: &[Uuid]) -> Result<(), CatalogError> {
        self.tag_applications
            .lock()
            .unwrap()
            .push((tag_ids.to_vec(), asset_ids.to_vec()));
        Ok(())
    }
}

/// Compressor producing a sparse temp file of a fixed size, recording
/// the order assets were handed to it.
struct ScriptedCompressor {
    extension: &'static str,
    output_size: u64,
    order: Mutex<Vec<String>>,
}

impl ScriptedCompressor {
    fn sized(extension: &'static str, output_size: u64) -> Arc<Self> {
        Arc::new(Self {
            extension,
            output_size,
            order: Mutex::new(Vec::new()),
        })
    }

    fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compressor for ScriptedCompressor {
    fn target_extension(&self) -> &'static str {
        self.extension
    }

    async fn compress(
        &self,
        _catalog: &dyn CatalogApi,
        asset: &Asset,
    ) -> Result<CompressedArtifact, CompressError> {
        self.order.lock().unwrap().push(asset.id.clone());
        let file = tempfile::NamedTempFile::new()?;
        file.as_file().set_len(self.output_size)?;
        Ok(CompressedArtifact::measure(file)?)
    }
}

/// Compressor that fails every asset after recording how often it ran.
struct FailingCompressor {
    attempts: AtomicUsize,
}

#[async_trait]
impl Compressor for FailingCompressor {
    fn target_extension(&self) -> &'static str {
        "jxl"
    }

    async fn compress(
        &self,
        _catalog: &dyn CatalogApi,
        _asset: &Asset,
    ) -> Result<CompressedArtifact, CompressError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CompressError::EncoderFailed {
            reason: "scripted failure".to_string(),
        })
    }
}

fn run_config(parallelism: usize) -> RunConfig {
    let mut run = ShrinkrayConfig::default().run;
    run.parallelism = parallelism;
    run
}

fn pipeline(
    catalog: &Arc<MockCatalog>,
    run: RunConfig,
    compressor: &Arc<ScriptedCompressor>,
) -> Pipeline {
    Pipeline::with_compressors(
        Arc::clone(catalog) as Arc<dyn CatalogApi>,
        run,
        Arc::clone(compressor) as Arc<dyn Compressor>,
        Arc::clone(compressor) as Arc<dyn Compressor>,
    )
}

#[tokio::test]
async fn test_large_saving_replaces_original() {
    let original = Uuid::new_v4();
    let catalog = MockCatalog::single_page(vec![asset(original, AssetType::Image, 10 * MIB)]);
    let compressor = ScriptedCompressor::sized("jxl", 1024);

    let summary = pipeline(&catalog, run_config(1), &compressor)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.replaced, 1);
    assert_eq!(catalog.uploads(), vec![format!("{original}.jxl")]);
    // The original, not the replacement, is marked and deleted
    assert_eq!(catalog.marked(), vec![original]);
    assert_eq!(catalog.deletions(), vec![(original, false)]);
}

#[tokio::test]
async fn test_boundary_saving_is_skipped() {
    // Saving exactly 8% of 100 MiB does not clear the strict gate
    let original_size = 100 * MIB;
    let compressed_size = (original_size - original_size * 8 / 100) as u64;
    let catalog = MockCatalog::single_page(vec![asset(
        Uuid::new_v4(),
        AssetType::Video,
        original_size,
    )]);
    let compressor = ScriptedCompressor::sized("mkv", compressed_size);

    let summary = pipeline(&catalog, run_config(1), &compressor)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.replaced, 0);
    assert!(catalog.uploads().is_empty());
    assert!(catalog.deletions().is_empty());
}

#[tokio::test]
async fn test_zero_output_fails_the_run() {
    let catalog = MockCatalog::single_page(vec![asset(Uuid::new_v4(), AssetType::Image, MIB)]);
    let compressor = ScriptedCompressor::sized("jxl", 0);

    let result = pipeline(&catalog, run_config(1), &compressor)
        .run(CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(ShrinkrayError::Compress(CompressError::EmptyOutput { .. }))
    ));
    assert!(catalog.deletions().is_empty());
}

#[tokio::test]
async fn test_three_pages_process_in_enumeration_order() {
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let catalog = MockCatalog::with_pages(vec![
        SearchPage {
            items: vec![
                asset(ids[0], AssetType::Image, 10 * MIB),
                asset(ids[1], AssetType::Image, 10 * MIB),
            ],
            next_page: Some("2".to_string()),
        },
        SearchPage {
            items: vec![
                asset(ids[2], AssetType::Image, 10 * MIB),
                asset(ids[3], AssetType::Image, 10 * MIB),
            ],
            next_page: Some("3".to_string()),
        },
        SearchPage {
            items: Vec::new(),
            next_page: None,
        },
    ]);
    let compressor = ScriptedCompressor::sized("jxl", 1024);

    let summary = pipeline(&catalog, run_config(1), &compressor)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.replaced, 4);
    let expected: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    assert_eq!(compressor.order(), expected);
}

#[tokio::test]
async fn test_limit_counts_accepted_assets_only() {
    let mut items: Vec<Asset> = (0..5)
        .map(|_| asset(Uuid::new_v4(), AssetType::Image, 10 * MIB))
        .collect();
    for trashed in [0, 2, 3] {
        items[trashed].is_trashed = true;
    }
    let catalog = MockCatalog::single_page(items);
    let compressor = ScriptedCompressor::sized("jxl", 1024);

    let mut run = run_config(1);
    run.limit = 2;
    let summary = pipeline(&catalog, run, &compressor)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.replaced, 2);
}

#[tokio::test]
async fn test_marked_assets_are_not_reprocessed() {
    let marked_id = Uuid::new_v4();
    let mut marked = asset(marked_id, AssetType::Image, 10 * MIB);
    marked.tags = Some(vec![Tag {
        id: Uuid::new_v4().to_string(),
        name: "2024-01-01T00:00:00Z".to_string(),
        value: Some("__shrinkray__/2024-01-01T00:00:00Z".to_string()),
    }]);
    let fresh_id = Uuid::new_v4();
    let catalog =
        MockCatalog::single_page(vec![marked, asset(fresh_id, AssetType::Image, 10 * MIB)]);
    let compressor = ScriptedCompressor::sized("jxl", 1024);

    let summary = pipeline(&catalog, run_config(2), &compressor)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.replaced, 1);
    assert_eq!(compressor.order(), vec![fresh_id.to_string()]);
}

#[tokio::test]
async fn test_first_error_cancels_the_run() {
    let items: Vec<Asset> = (0..8)
        .map(|_| asset(Uuid::new_v4(), AssetType::Image, 10 * MIB))
        .collect();
    let catalog = MockCatalog::single_page(items);
    let compressor = Arc::new(FailingCompressor {
        attempts: AtomicUsize::new(0),
    });

    let pipeline = Pipeline::with_compressors(
        Arc::clone(&catalog) as Arc<dyn CatalogApi>,
        run_config(1),
        Arc::clone(&compressor) as Arc<dyn Compressor>,
        Arc::clone(&compressor) as Arc<dyn Compressor>,
    );
    let result = pipeline.run(CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ShrinkrayError::Compress(CompressError::EncoderFailed { .. }))
    ));
    // Dispatch stops once the failure cancels the run token
    assert!(compressor.attempts.load(Ordering::SeqCst) < 8);
    assert!(catalog.deletions().is_empty());
}

#[tokio::test]
async fn test_external_cancellation_surfaces_as_cancelled() {
    let catalog = MockCatalog::single_page(vec![asset(Uuid::new_v4(), AssetType::Image, 10 * MIB)]);
    let compressor = ScriptedCompressor::sized("jxl", 1024);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline(&catalog, run_config(1), &compressor).run(cancel).await;
    assert!(matches!(result, Err(ShrinkrayError::Cancelled)));
}

#[tokio::test]
async fn test_unsupported_type_fails_the_run() {
    let mut odd = asset(Uuid::new_v4(), AssetType::Image, 10 * MIB);
    odd.asset_type = AssetType::Other;
    let catalog = MockCatalog::single_page(vec![odd]);
    let compressor = ScriptedCompressor::sized("jxl", 1024);

    let result = pipeline(&catalog, run_config(1), &compressor)
        .run(CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(ShrinkrayError::UnsupportedAssetType { .. })
    ));
}
