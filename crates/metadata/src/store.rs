//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{DimensionRepo, ReleaseRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: DimensionRepo + ReleaseRepo + UserRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; using a single connection avoids
            // persistent "database is locked" failures under test/axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::{ReleasePatch, UploadRecord};
    use courier_core::DimensionKind;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint"))
    }

    #[async_trait]
    impl DimensionRepo for SqliteStore {
        async fn create_dimension(&self, dimension: &DimensionRow) -> MetadataResult<()> {
            let kind = DimensionKind::from_str_opt(&dimension.kind).ok_or_else(|| {
                MetadataError::Internal(format!("unknown dimension kind: {}", dimension.kind))
            })?;
            if self
                .get_dimension_by_name(kind, &dimension.name)
                .await?
                .is_some()
            {
                return Err(MetadataError::AlreadyExists(format!(
                    "{} with this name already exists",
                    dimension.kind
                )));
            }

            sqlx::query(
                "INSERT INTO dimensions (dimension_id, kind, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(dimension.dimension_id)
            .bind(&dimension.kind)
            .bind(&dimension.name)
            .bind(dimension.created_at)
            .bind(dimension.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!(
                        "{} with this name already exists",
                        dimension.kind
                    ))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn list_dimensions(&self, kind: DimensionKind) -> MetadataResult<Vec<DimensionRow>> {
            let rows = sqlx::query_as::<_, DimensionRow>(
                "SELECT * FROM dimensions WHERE kind = ? ORDER BY created_at, name",
            )
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_dimension(
            &self,
            kind: DimensionKind,
            dimension_id: Uuid,
        ) -> MetadataResult<Option<DimensionRow>> {
            let row = sqlx::query_as::<_, DimensionRow>(
                "SELECT * FROM dimensions WHERE kind = ? AND dimension_id = ?",
            )
            .bind(kind.as_str())
            .bind(dimension_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_dimension_by_name(
            &self,
            kind: DimensionKind,
            name: &str,
        ) -> MetadataResult<Option<DimensionRow>> {
            let row = sqlx::query_as::<_, DimensionRow>(
                "SELECT * FROM dimensions WHERE kind = ? AND name = ?",
            )
            .bind(kind.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn count_dimensions(&self, kind: DimensionKind) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dimensions WHERE kind = ?")
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn rename_dimension(
            &self,
            kind: DimensionKind,
            dimension_id: Uuid,
            new_name: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let existing = sqlx::query_as::<_, DimensionRow>(
                "SELECT * FROM dimensions WHERE kind = ? AND dimension_id = ?",
            )
            .bind(kind.as_str())
            .bind(dimension_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(existing) = existing else {
                return Err(MetadataError::NotFound(format!(
                    "{kind} {dimension_id} not found"
                )));
            };

            if existing.name == new_name {
                return Ok(());
            }

            let taken: Option<(i32,)> =
                sqlx::query_as("SELECT 1 FROM dimensions WHERE kind = ? AND name = ?")
                    .bind(kind.as_str())
                    .bind(new_name)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "{kind} with this name already exists"
                )));
            }

            sqlx::query(
                "UPDATE dimensions SET name = ?, updated_at = ? WHERE kind = ? AND dimension_id = ?",
            )
            .bind(new_name)
            .bind(updated_at)
            .bind(kind.as_str())
            .bind(dimension_id)
            .execute(&mut *tx)
            .await?;

            // Cascade the rename by name-rewrite across every referencing
            // record. The transaction guarantees both writes land or neither.
            let cascade = match kind {
                DimensionKind::App => {
                    sqlx::query("UPDATE releases SET app_name = ?, updated_at = ? WHERE app_name = ?")
                        .bind(new_name)
                        .bind(updated_at)
                        .bind(&existing.name)
                        .execute(&mut *tx)
                        .await
                }
                DimensionKind::Channel => {
                    sqlx::query("UPDATE releases SET channel = ?, updated_at = ? WHERE channel = ?")
                        .bind(new_name)
                        .bind(updated_at)
                        .bind(&existing.name)
                        .execute(&mut *tx)
                        .await
                }
                DimensionKind::Platform => {
                    sqlx::query("UPDATE artifacts SET platform = ? WHERE platform = ?")
                        .bind(new_name)
                        .bind(&existing.name)
                        .execute(&mut *tx)
                        .await
                }
                DimensionKind::Arch => {
                    sqlx::query("UPDATE artifacts SET arch = ? WHERE arch = ?")
                        .bind(new_name)
                        .bind(&existing.name)
                        .execute(&mut *tx)
                        .await
                }
            };

            match cascade {
                Ok(result) => {
                    tracing::debug!(
                        kind = %kind,
                        old_name = %existing.name,
                        new_name = %new_name,
                        rewritten = result.rows_affected(),
                        "dimension rename cascaded"
                    );
                }
                Err(e) if is_unique_violation(&e) => {
                    return Err(MetadataError::Constraint(format!(
                        "renaming {kind} '{}' to '{new_name}' collides with an existing release",
                        existing.name
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit().await?;
            Ok(())
        }

        async fn delete_dimension(
            &self,
            kind: DimensionKind,
            dimension_id: Uuid,
        ) -> MetadataResult<u64> {
            let Some(existing) = self.get_dimension(kind, dimension_id).await? else {
                return Err(MetadataError::NotFound(format!(
                    "{kind} {dimension_id} not found"
                )));
            };

            let references = self.count_references(kind, &existing.name).await?;
            if references > 0 {
                return Err(MetadataError::Constraint(format!(
                    "{kind} '{}' is still referenced by existing releases",
                    existing.name
                )));
            }

            let result = sqlx::query("DELETE FROM dimensions WHERE kind = ? AND dimension_id = ?")
                .bind(kind.as_str())
                .bind(dimension_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    impl SqliteStore {
        /// Load artifacts and changelog for a release row.
        async fn hydrate_release(&self, release: ReleaseRow) -> MetadataResult<ReleaseRecord> {
            let artifacts = sqlx::query_as::<_, ArtifactRow>(
                "SELECT * FROM artifacts WHERE release_id = ? ORDER BY rowid",
            )
            .bind(release.release_id)
            .fetch_all(&self.pool)
            .await?;

            let changelog = sqlx::query_as::<_, ChangelogRow>(
                "SELECT * FROM changelogs WHERE release_id = ? ORDER BY rowid",
            )
            .bind(release.release_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(ReleaseRecord {
                release,
                artifacts,
                changelog,
            })
        }
    }

    #[async_trait]
    impl ReleaseRepo for SqliteStore {
        async fn upload_release(
            &self,
            upload: &UploadRecord,
            now: OffsetDateTime,
        ) -> MetadataResult<Uuid> {
            let version = upload.version.to_string();
            let [major, minor, patch, build] = upload.version.components();
            let mut tx = self.pool.begin().await?;

            let existing = sqlx::query_as::<_, ReleaseRow>(
                "SELECT * FROM releases WHERE app_name = ? AND version = ? AND channel = ?",
            )
            .bind(&upload.app_name)
            .bind(&version)
            .bind(&upload.channel)
            .fetch_optional(&mut *tx)
            .await?;

            let release_id = match existing {
                None => {
                    let release_id = Uuid::new_v4();
                    sqlx::query(
                        r#"
                        INSERT INTO releases (
                            release_id, app_name, version, v_major, v_minor, v_patch, v_build,
                            channel, published, critical, created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(release_id)
                    .bind(&upload.app_name)
                    .bind(&version)
                    .bind(major as i64)
                    .bind(minor as i64)
                    .bind(patch as i64)
                    .bind(build as i64)
                    .bind(&upload.channel)
                    .bind(upload.published)
                    .bind(upload.critical)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    release_id
                }
                Some(release) => {
                    // Re-upload with a different package extension extends
                    // the existing release instead of creating a second one.
                    let duplicate: Option<(i32,)> = sqlx::query_as(
                        "SELECT 1 FROM artifacts WHERE release_id = ? AND platform = ? AND arch = ? AND package = ?",
                    )
                    .bind(release.release_id)
                    .bind(&upload.platform)
                    .bind(&upload.arch)
                    .bind(&upload.package)
                    .fetch_optional(&mut *tx)
                    .await?;

                    if duplicate.is_some() {
                        return Err(MetadataError::AlreadyExists(
                            "app with this name, version, and extension already exists".to_string(),
                        ));
                    }

                    sqlx::query("UPDATE releases SET updated_at = ? WHERE release_id = ?")
                        .bind(now)
                        .bind(release.release_id)
                        .execute(&mut *tx)
                        .await?;
                    release.release_id
                }
            };

            let insert = sqlx::query(
                "INSERT INTO artifacts (release_id, platform, arch, package, link) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(release_id)
            .bind(&upload.platform)
            .bind(&upload.arch)
            .bind(&upload.package)
            .bind(&upload.link)
            .execute(&mut *tx)
            .await;

            // The compound unique index is the cross-process backstop: two
            // concurrent uploads of the same tuple produce exactly one success.
            if let Err(e) = insert {
                if is_unique_violation(&e) {
                    return Err(MetadataError::AlreadyExists(
                        "app with this name, version, and extension already exists".to_string(),
                    ));
                }
                return Err(e.into());
            }

            let date = now
                .format(courier_core::CHANGELOG_DATE_FORMAT)
                .map_err(|e| MetadataError::Internal(format!("failed to format date: {e}")))?;
            sqlx::query(
                "INSERT OR IGNORE INTO changelogs (release_id, version, changes, date) VALUES (?, ?, ?, ?)",
            )
            .bind(release_id)
            .bind(&version)
            .bind(&upload.changelog)
            .bind(&date)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(release_id)
        }

        async fn get_release(&self, release_id: Uuid) -> MetadataResult<Option<ReleaseRecord>> {
            let row =
                sqlx::query_as::<_, ReleaseRow>("SELECT * FROM releases WHERE release_id = ?")
                    .bind(release_id)
                    .fetch_optional(&self.pool)
                    .await?;
            match row {
                Some(release) => Ok(Some(self.hydrate_release(release).await?)),
                None => Ok(None),
            }
        }

        async fn search_releases(&self, app_name: &str) -> MetadataResult<Vec<ReleaseRecord>> {
            let rows = sqlx::query_as::<_, ReleaseRow>(
                "SELECT * FROM releases WHERE app_name = ? ORDER BY v_major, v_minor, v_patch, v_build, channel",
            )
            .bind(app_name)
            .fetch_all(&self.pool)
            .await?;

            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                records.push(self.hydrate_release(row).await?);
            }
            Ok(records)
        }

        async fn update_release(
            &self,
            release_id: Uuid,
            patch: &ReleasePatch,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let mut tx = self.pool.begin().await?;

            let existing =
                sqlx::query_as::<_, ReleaseRow>("SELECT * FROM releases WHERE release_id = ?")
                    .bind(release_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some(existing) = existing else {
                return Ok(false);
            };

            let published = patch.published.unwrap_or(existing.published);
            let critical = patch.critical.unwrap_or(existing.critical);
            sqlx::query(
                "UPDATE releases SET published = ?, critical = ?, updated_at = ? WHERE release_id = ?",
            )
            .bind(published)
            .bind(critical)
            .bind(updated_at)
            .bind(release_id)
            .execute(&mut *tx)
            .await?;

            if let Some(changes) = &patch.changelog {
                let date = updated_at
                    .format(courier_core::CHANGELOG_DATE_FORMAT)
                    .map_err(|e| MetadataError::Internal(format!("failed to format date: {e}")))?;
                sqlx::query(
                    r#"
                    INSERT INTO changelogs (release_id, version, changes, date) VALUES (?, ?, ?, ?)
                    ON CONFLICT(release_id, version) DO UPDATE SET changes = excluded.changes
                    "#,
                )
                .bind(release_id)
                .bind(&existing.version)
                .bind(changes)
                .bind(&date)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(true)
        }

        async fn replace_artifact(
            &self,
            release_id: Uuid,
            platform: &str,
            arch: &str,
            package: &str,
            link: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO artifacts (release_id, platform, arch, package, link) VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(release_id, platform, arch, package) DO UPDATE SET link = excluded.link
                "#,
            )
            .bind(release_id)
            .bind(platform)
            .bind(arch)
            .bind(package)
            .bind(link)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE releases SET updated_at = ? WHERE release_id = ?")
                .bind(updated_at)
                .bind(release_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn delete_release(&self, release_id: Uuid) -> MetadataResult<(Vec<String>, u64)> {
            let mut tx = self.pool.begin().await?;

            let links: Vec<(String,)> =
                sqlx::query_as("SELECT link FROM artifacts WHERE release_id = ?")
                    .bind(release_id)
                    .fetch_all(&mut *tx)
                    .await?;

            sqlx::query("DELETE FROM changelogs WHERE release_id = ?")
                .bind(release_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM artifacts WHERE release_id = ?")
                .bind(release_id)
                .execute(&mut *tx)
                .await?;
            let result = sqlx::query("DELETE FROM releases WHERE release_id = ?")
                .bind(release_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok((
                links.into_iter().map(|(link,)| link).collect(),
                result.rows_affected(),
            ))
        }

        async fn get_latest_published(
            &self,
            app_name: &str,
            channel: &str,
            platform: &str,
            arch: &str,
        ) -> MetadataResult<Option<ReleaseRecord>> {
            let row = sqlx::query_as::<_, ReleaseRow>(
                r#"
                SELECT * FROM releases
                WHERE app_name = ? AND channel = ? AND published = 1
                  AND EXISTS (
                    SELECT 1 FROM artifacts
                    WHERE artifacts.release_id = releases.release_id
                      AND artifacts.platform = ? AND artifacts.arch = ?
                  )
                ORDER BY v_major DESC, v_minor DESC, v_patch DESC, v_build DESC
                LIMIT 1
                "#,
            )
            .bind(app_name)
            .bind(channel)
            .bind(platform)
            .bind(arch)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(release) => Ok(Some(self.hydrate_release(release).await?)),
                None => Ok(None),
            }
        }

        async fn count_references(
            &self,
            kind: DimensionKind,
            name: &str,
        ) -> MetadataResult<u64> {
            let count: i64 = match kind {
                DimensionKind::App => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM releases WHERE app_name = ?")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?
                }
                DimensionKind::Channel => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM releases WHERE channel = ?")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?
                }
                DimensionKind::Platform => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE platform = ?")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?
                }
                DimensionKind::Arch => {
                    sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE arch = ?")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?
                }
            };
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO users (user_id, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user.user_id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists("user with this name already exists".to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_user_by_username(&self, username: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Taxonomy dimensions: apps, channels, platforms, archs share one shape
CREATE TABLE IF NOT EXISTS dimensions (
    dimension_id BLOB PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_dimensions_kind_name ON dimensions(kind, name);

-- Releases: one row per (app_name, version, channel) bundle.
-- Version components are decomposed so "latest" is an indexed ORDER BY.
-- channel is '' when the release predates any channel record.
CREATE TABLE IF NOT EXISTS releases (
    release_id BLOB PRIMARY KEY,
    app_name TEXT NOT NULL,
    version TEXT NOT NULL,
    v_major INTEGER NOT NULL,
    v_minor INTEGER NOT NULL,
    v_patch INTEGER NOT NULL,
    v_build INTEGER NOT NULL,
    channel TEXT NOT NULL DEFAULT '',
    published INTEGER NOT NULL DEFAULT 0,
    critical INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_releases_identity ON releases(app_name, version, channel);
CREATE INDEX IF NOT EXISTS idx_releases_resolver
    ON releases(app_name, channel, published, v_major, v_minor, v_patch, v_build);

-- Artifacts: one row per downloadable file, keyed within its release.
-- platform/arch are '' when those dimensions were optional at upload time.
CREATE TABLE IF NOT EXISTS artifacts (
    release_id BLOB NOT NULL REFERENCES releases(release_id),
    platform TEXT NOT NULL DEFAULT '',
    arch TEXT NOT NULL DEFAULT '',
    package TEXT NOT NULL,
    link TEXT NOT NULL,
    PRIMARY KEY (release_id, platform, arch, package)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_platform ON artifacts(platform);
CREATE INDEX IF NOT EXISTS idx_artifacts_arch ON artifacts(arch);

-- Changelog entries, one per release version
CREATE TABLE IF NOT EXISTS changelogs (
    release_id BLOB NOT NULL REFERENCES releases(release_id),
    version TEXT NOT NULL,
    changes TEXT NOT NULL DEFAULT '',
    date TEXT NOT NULL,
    PRIMARY KEY (release_id, version)
);

-- Admin users
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
