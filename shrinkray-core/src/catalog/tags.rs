//! Processing-marker tags.
//!
//! A replaced (or evaluated) asset is marked by attaching a tag whose
//! fully qualified path is `__shrinkray__/<RFC 3339 timestamp>`. The
//! enumerator compares that timestamp against the run's cutoff to decide
//! whether an asset is still eligible, so format and parse must agree
//! exactly; both live here.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::CatalogError;
use super::api::CatalogApi;
use super::types::Tag;

/// Root tag grouping all processing markers.
pub const MARKER_ROOT_TAG: &str = "__shrinkray__";

/// Formats a marker timestamp the single way the pipeline ever writes it.
pub fn format_marker_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a marker timestamp written by [`format_marker_timestamp`].
pub fn parse_marker_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Extracts the processing timestamp from a tag, or None for ordinary tags.
///
/// A marker tag with an unparseable timestamp is logged and treated as
/// absent, which keeps the asset eligible rather than failing the run.
pub fn marker_timestamp(tag: &Tag) -> Option<DateTime<Utc>> {
    let value = tag.value.as_deref()?;
    let raw = value.strip_prefix(MARKER_ROOT_TAG)?.strip_prefix('/')?;
    match parse_marker_timestamp(raw) {
        Some(timestamp) => Some(timestamp),
        None => {
            tracing::warn!("Marker tag '{}' has unparseable timestamp '{raw}'", tag.id);
            None
        }
    }
}

/// Returns true when a tag is part of the marker hierarchy (the root tag
/// itself or any timestamp child). Marker tags are never copied onto a
/// replacement; the replacement re-derives its own marker when it is
/// itself processed.
pub fn is_marker_tag(tag: &Tag) -> bool {
    match tag.value.as_deref() {
        Some(value) => value == MARKER_ROOT_TAG || value.starts_with(&format!("{MARKER_ROOT_TAG}/")),
        None => tag.name == MARKER_ROOT_TAG,
    }
}

/// Marker tag ids for one run, resolved once at pipeline construction
/// and carried by value instead of looked up through ambient state.
#[derive(Debug, Clone)]
pub struct MarkerTags {
    pub root_id: Uuid,
    /// Tag attached to every asset this run marks as processed.
    pub run_tag_id: Uuid,
    pub run_timestamp: DateTime<Utc>,
}

impl MarkerTags {
    /// Finds or creates the marker root and this run's timestamp tag.
    ///
    /// # Errors
    /// - `CatalogError` - tag listing or creation failed
    pub async fn resolve(
        catalog: &dyn CatalogApi,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let root_id = find_or_create(catalog, MARKER_ROOT_TAG, MARKER_ROOT_TAG, None).await?;

        let name = format_marker_timestamp(now);
        let path = format!("{MARKER_ROOT_TAG}/{name}");
        let run_tag_id = find_or_create(catalog, &name, &path, Some(root_id)).await?;

        Ok(Self {
            root_id,
            run_tag_id,
            run_timestamp: now,
        })
    }
}

/// Looks a tag up by its fully qualified path, creating it when absent.
async fn find_or_create(
    catalog: &dyn CatalogApi,
    name: &str,
    path: &str,
    parent: Option<Uuid>,
) -> Result<Uuid, CatalogError> {
    let existing = catalog.all_tags().await?;
    let found = existing
        .iter()
        .find(|tag| tag.value.as_deref() == Some(path) || (tag.value.is_none() && tag.name == name));

    let tag = match found {
        Some(tag) => tag.clone(),
        None => catalog.create_tag(name, parent).await?,
    };

    Uuid::parse_str(&tag.id).map_err(|_| CatalogError::TagResolution {
        reason: format!("tag '{}' has malformed id '{}'", tag.name, tag.id),
    })
}
