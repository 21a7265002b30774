//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Taxonomy dimensions
// =============================================================================

/// One taxonomy dimension record (app, channel, platform, or arch).
///
/// All four kinds share this shape; `kind` is the discriminator.
#[derive(Debug, Clone, FromRow)]
pub struct DimensionRow {
    pub dimension_id: Uuid,
    pub kind: String,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Releases and artifacts
// =============================================================================

/// Release record for one `(app_name, version, channel)` bundle.
///
/// The four numeric version columns are decomposed at insert time so the
/// "latest" query is a plain indexed `ORDER BY`. `channel` is the empty
/// string when the release predates any channel in the taxonomy.
#[derive(Debug, Clone, FromRow)]
pub struct ReleaseRow {
    pub release_id: Uuid,
    pub app_name: String,
    pub version: String,
    pub v_major: i64,
    pub v_minor: i64,
    pub v_patch: i64,
    pub v_build: i64,
    pub channel: String,
    pub published: bool,
    pub critical: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One downloadable artifact of a release, keyed by `(platform, arch, package)`.
///
/// `package` keeps its leading dot (".dmg"); `platform`/`arch` are empty
/// strings when the artifact predates those dimensions.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub release_id: Uuid,
    pub platform: String,
    pub arch: String,
    pub package: String,
    pub link: String,
}

/// Changelog entry for a release version. `date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, FromRow)]
pub struct ChangelogRow {
    pub release_id: Uuid,
    pub version: String,
    pub changes: String,
    pub date: String,
}

/// A release with its artifact set and changelog loaded.
#[derive(Debug, Clone)]
pub struct ReleaseRecord {
    pub release: ReleaseRow,
    pub artifacts: Vec<ArtifactRow>,
    pub changelog: Vec<ChangelogRow>,
}

// =============================================================================
// Users
// =============================================================================

/// Admin user record. `password_hash` is a bcrypt hash.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
