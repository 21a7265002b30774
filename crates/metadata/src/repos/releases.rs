//! Release and artifact repository trait.

use crate::error::MetadataResult;
use crate::models::ReleaseRecord;
use async_trait::async_trait;
use courier_core::{DimensionKind, Version};
use time::OffsetDateTime;
use uuid::Uuid;

/// Validated parameters for one uploaded artifact.
///
/// Dimension fields hold the empty string when the corresponding dimension
/// has no records yet and was therefore optional at upload time.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub app_name: String,
    pub version: Version,
    pub channel: String,
    pub platform: String,
    pub arch: String,
    /// Package extension with its leading dot (".dmg").
    pub package: String,
    /// Absolute object-store URL of the uploaded blob.
    pub link: String,
    pub published: bool,
    pub critical: bool,
    pub changelog: String,
}

/// Mutable release fields for the update operation. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct ReleasePatch {
    pub published: Option<bool>,
    pub critical: Option<bool>,
    /// Replaces the changelog entry for the release's own version.
    pub changelog: Option<String>,
}

/// Repository for releases, their artifacts, and changelogs.
#[async_trait]
pub trait ReleaseRepo: Send + Sync {
    /// Insert-or-extend for one uploaded artifact.
    ///
    /// Looks up the release by `(app_name, version, channel)`: creates it
    /// with a single artifact when absent, otherwise appends the artifact
    /// after checking `(platform, arch, package)` uniqueness within the
    /// release. The changelog entry for the version is written iff none
    /// exists yet. Runs in one transaction; a duplicate artifact fails with
    /// `AlreadyExists` and leaves nothing behind.
    ///
    /// Returns the release ID.
    async fn upload_release(
        &self,
        upload: &UploadRecord,
        now: OffsetDateTime,
    ) -> MetadataResult<Uuid>;

    /// Get one release with artifacts and changelog.
    async fn get_release(&self, release_id: Uuid) -> MetadataResult<Option<ReleaseRecord>>;

    /// All releases of an app, ordered by version.
    async fn search_releases(&self, app_name: &str) -> MetadataResult<Vec<ReleaseRecord>>;

    /// Overwrite mutable release fields. Returns false when the release
    /// does not exist.
    async fn update_release(
        &self,
        release_id: Uuid,
        patch: &ReleasePatch,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Insert an artifact or replace the link of an existing one with the
    /// same `(platform, arch, package)` key.
    async fn replace_artifact(
        &self,
        release_id: Uuid,
        platform: &str,
        arch: &str,
        package: &str,
        link: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete a release with its artifacts and changelog. Returns the
    /// artifact links (for blob cleanup) alongside the deleted release
    /// count.
    async fn delete_release(&self, release_id: Uuid) -> MetadataResult<(Vec<String>, u64)>;

    /// The highest-version published release of `(app_name, channel)` that
    /// carries at least one artifact matching `(platform, arch)`.
    async fn get_latest_published(
        &self,
        app_name: &str,
        channel: &str,
        platform: &str,
        arch: &str,
    ) -> MetadataResult<Option<ReleaseRecord>>;

    /// Count releases (or artifacts, for platform/arch) referencing a
    /// dimension name. Drives the delete-while-referenced rejection.
    async fn count_references(&self, kind: DimensionKind, name: &str) -> MetadataResult<u64>;
}
