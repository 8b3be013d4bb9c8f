//! Replacement Coordinator: commits an accepted artifact to the
//! catalog.
//!
//! The sequence is fixed and has no rollback: upload the replacement,
//! copy relationships and tags onto it, mark the original as processed,
//! delete the original. A failing step aborts and surfaces the error;
//! the partially replaced state is left for external reconciliation.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::Result;
use crate::catalog::{Asset, CatalogApi, CatalogError, MarkerTags, UploadRequest, tags};
use crate::compress::CompressedArtifact;

pub struct ReplacementCoordinator {
    catalog: Arc<dyn CatalogApi>,
    marker: MarkerTags,
    force_delete: bool,
}

impl ReplacementCoordinator {
    pub fn new(catalog: Arc<dyn CatalogApi>, marker: MarkerTags, force_delete: bool) -> Self {
        Self {
            catalog,
            marker,
            force_delete,
        }
    }

    /// Replaces `asset` with `artifact` in the catalog.
    ///
    /// The new entry carries the original's device ids, creation time,
    /// duration, favorite flag, visibility, live-photo link and custom
    /// metadata, so it is indistinguishable from the original in every
    /// surrounding system apart from its bytes and filename extension.
    ///
    /// # Errors
    /// - `ShrinkrayError::Catalog` - any remote step failed; earlier
    ///   steps are not undone
    pub async fn replace(
        &self,
        asset: &Asset,
        artifact: CompressedArtifact,
        target_extension: &str,
    ) -> Result<()> {
        let original_id = asset.parsed_id()?;

        let metadata = if asset.has_metadata {
            self.catalog.asset_metadata(original_id).await?
        } else {
            Vec::new()
        };

        let request = UploadRequest {
            device_asset_id: asset.device_asset_id.clone(),
            device_id: asset.device_id.clone(),
            duration: asset.duration.clone(),
            file_created_at: asset.file_created_at,
            file_modified_at: Utc::now(),
            file_name: replacement_file_name(&asset.original_file_name, target_extension),
            is_favorite: asset.is_favorite,
            visibility: asset.visibility.clone(),
            live_photo_video_id: asset.live_photo_video_id.clone(),
            metadata,
        };

        let new_id = self.catalog.upload_asset(&request, artifact.path()).await?;
        tracing::debug!(
            "Uploaded replacement {new_id} for {original_id} ({})",
            request.file_name
        );

        self.catalog.copy_relationships(original_id, new_id).await?;
        self.copy_tags(asset, new_id).await?;

        // Mark the original, then delete it. The marker never lands on
        // the replacement: a re-run that finds the upload without the
        // delete sees an unmarked asset and re-processes it, which is
        // safe; the reverse would silently orphan originals.
        self.catalog
            .tag_assets(&[self.marker.run_tag_id], &[original_id])
            .await?;
        self.catalog
            .delete_assets(&[original_id], self.force_delete)
            .await?;
        Ok(())
    }

    /// Copies the original's ordinary tags onto the replacement. The
    /// marker hierarchy is excluded; the replacement earns its own
    /// marker if it is ever processed again.
    async fn copy_tags(&self, asset: &Asset, new_id: Uuid) -> Result<()> {
        let Some(asset_tags) = asset.tags.as_ref() else {
            return Ok(());
        };

        let mut tag_ids = Vec::new();
        for tag in asset_tags.iter().filter(|tag| !tags::is_marker_tag(tag)) {
            let id =
                Uuid::parse_str(&tag.id).map_err(|e| CatalogError::invalid_id(&tag.id, e))?;
            tag_ids.push(id);
        }
        if tag_ids.is_empty() {
            return Ok(());
        }

        self.catalog.tag_assets(&tag_ids, &[new_id]).await?;
        Ok(())
    }
}

/// Original stem with the compressor's extension.
fn replacement_file_name(original: &str, extension: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(original);
    format!("{stem}.{extension}")
}
