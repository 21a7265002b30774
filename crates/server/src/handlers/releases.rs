//! Release upload, update, delete, and search handlers.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{UploadedFile, parse_data, read_multipart};
use crate::notify::ReleaseNotification;
use crate::state::AppState;
use crate::validate::{UploadData, UploadParams, validate_upload};
use axum::Json;
use axum::extract::{Multipart, Query, State};
use courier_cache::ResponseCache;
use courier_metadata::models::ReleaseRecord;
use courier_metadata::repos::{ReleasePatch, ReleaseRepo, UploadRecord};
use courier_storage::ObjectStore;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Characters kept verbatim when percent-encoding object keys into links.
/// Everything else, including the `/` separators, is escaped.
const LINK_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Extract the package extension from an uploaded filename, from the first
/// dot onward ("app.tar.gz" yields ".tar.gz").
fn extension_of(filename: &str) -> ApiResult<String> {
    match filename.find('.') {
        Some(index) if index + 1 < filename.len() => Ok(filename[index..].to_string()),
        _ => Err(ApiError::BadRequest(format!(
            "file name has no extension: {filename}"
        ))),
    }
}

/// Object-store key for one artifact:
/// `<app>/<channel>/<platform>/<arch>/<app>-<version><ext>`, omitting
/// dimension segments that were optional at upload time.
fn artifact_key(params: &UploadParams, extension: &str) -> String {
    let mut segments = vec![params.app_name.as_str()];
    for dimension in [&params.channel, &params.platform, &params.arch] {
        if !dimension.is_empty() {
            segments.push(dimension);
        }
    }
    let filename = format!("{}-{}{}", params.app_name, params.version, extension);
    segments.push(&filename);
    segments.join("/")
}

/// Client-facing download link for an object key.
fn artifact_link(public_endpoint: &str, key: &str) -> String {
    format!(
        "{}/{}",
        public_endpoint.trim_end_matches('/'),
        utf8_percent_encode(key, LINK_SEGMENT)
    )
}

/// Recover the object key from a stored link.
fn key_from_link(public_endpoint: &str, link: &str) -> Option<String> {
    let escaped = link
        .strip_prefix(public_endpoint.trim_end_matches('/'))?
        .trim_start_matches('/');
    percent_decode_str(escaped)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

/// Invalidate cached update-check responses for `(app_name, channel)`.
/// Cache failures are logged, never surfaced; the publish still succeeds.
pub(crate) async fn invalidate_check_cache(state: &AppState, app_name: &str, channel: &str) {
    let Some(cache) = &state.cache else {
        return;
    };
    let pattern = format!("app_name={app_name}&version=*&channel={channel}&platform=*&arch=*");
    match cache.delete_matching(&pattern).await {
        Ok(deleted) => {
            tracing::debug!(pattern = %pattern, deleted, "check-version cache invalidated");
        }
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "cache invalidation failed");
        }
    }
}

/// Store one file and register it in the metadata store.
///
/// The blob goes out first; if the metadata insert then fails, the
/// just-uploaded blob is removed best-effort so it does not orphan.
async fn store_artifact(
    state: &AppState,
    params: &UploadParams,
    payload_file: &UploadedFile,
) -> ApiResult<(Uuid, String, String)> {
    let extension = extension_of(&payload_file.filename)?;
    let key = artifact_key(params, &extension);

    state.storage.put(&key, payload_file.bytes.clone()).await?;
    let link = artifact_link(state.public_endpoint(), &key);

    let record = UploadRecord {
        app_name: params.app_name.clone(),
        version: params.version,
        channel: params.channel.clone(),
        platform: params.platform.clone(),
        arch: params.arch.clone(),
        package: extension.clone(),
        link: link.clone(),
        published: params.publish,
        critical: params.critical,
        changelog: params.changelog.clone(),
    };

    match state
        .metadata
        .upload_release(&record, OffsetDateTime::now_utc())
        .await
    {
        Ok(release_id) => Ok((release_id, extension, link)),
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&key).await {
                tracing::warn!(key = %key, error = %cleanup, "failed to remove orphaned blob");
            }
            Err(e.into())
        }
    }
}

/// POST /upload - Publish release artifact(s).
///
/// Files are independent sub-transactions processed in order: a failure
/// aborts the request but leaves earlier files in place.
#[tracing::instrument(skip_all)]
pub async fn upload_release(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let payload = read_multipart(&mut multipart).await?;
    let data: UploadData = parse_data(&payload)?;
    let params = validate_upload(&state, &data).await?;

    if payload.files.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one file is required".to_string(),
        ));
    }

    let mut release_id = None;
    let mut artifacts = Vec::with_capacity(payload.files.len());
    for file in &payload.files {
        let (id, extension, link) = store_artifact(&state, &params, file).await?;
        release_id = Some(id);
        artifacts.push((extension, link));
    }
    let release_id = release_id
        .ok_or_else(|| ApiError::Internal("no results found. Please check your files.".to_string()))?;

    if params.publish {
        invalidate_check_cache(&state, &params.app_name, &params.channel).await;
    }

    state.notifier.notify(ReleaseNotification {
        app_name: params.app_name.clone(),
        channel: params.channel.clone(),
        version: params.version.to_string(),
        artifacts,
        changelog: params.changelog.clone(),
    });

    tracing::info!(
        app_name = %params.app_name,
        version = %params.version,
        channel = %params.channel,
        release_id = %release_id,
        "release uploaded"
    );
    Ok(Json(json!({ "uploadResult.Uploaded": release_id.to_string() })))
}

/// POST /apps/update - Modify an existing release.
#[tracing::instrument(skip_all)]
pub async fn update_release(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let payload = read_multipart(&mut multipart).await?;
    let data: UploadData = parse_data(&payload)?;
    let release_id = match data.id.as_deref() {
        Some(id) => Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => return Err(ApiError::BadRequest("id is required".to_string())),
    };
    let params = validate_upload(&state, &data).await?;

    let patch = ReleasePatch {
        published: data.publish,
        critical: data.critical,
        changelog: data.changelog.clone(),
    };
    let updated = state
        .metadata
        .update_release(release_id, &patch, OffsetDateTime::now_utc())
        .await?;
    if !updated {
        return Err(ApiError::NotFound("app not found".to_string()));
    }

    // Optional file parts add or replace artifacts on the release
    for file in &payload.files {
        let extension = extension_of(&file.filename)?;
        let key = artifact_key(&params, &extension);
        state.storage.put(&key, file.bytes.clone()).await?;
        let link = artifact_link(state.public_endpoint(), &key);
        state
            .metadata
            .replace_artifact(
                release_id,
                &params.platform,
                &params.arch,
                &extension,
                &link,
                OffsetDateTime::now_utc(),
            )
            .await?;
    }

    if params.publish {
        invalidate_check_cache(&state, &params.app_name, &params.channel).await;
    }

    tracing::info!(release_id = %release_id, "release updated");
    Ok(Json(json!({ "updatedResult.Updated": true })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    id: Option<String>,
}

/// DELETE /apps/delete - Remove a release and purge its blobs.
///
/// Blob deletion is at-least-once: the metadata record goes away even when
/// an object-store delete fails, which is logged for the reconciler.
#[tracing::instrument(skip_all)]
pub async fn delete_release(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    let release_id = match query.id.as_deref() {
        Some(id) => Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => return Err(ApiError::BadRequest("id is required".to_string())),
    };

    let (links, deleted) = state.metadata.delete_release(release_id).await?;
    for link in &links {
        let Some(key) = key_from_link(state.public_endpoint(), link) else {
            tracing::warn!(link = %link, "cannot derive object key from link, skipping blob delete");
            continue;
        };
        match state.storage.delete(&key).await {
            Ok(()) => {}
            Err(courier_storage::StorageError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to delete blob for removed release");
            }
        }
    }

    Ok(Json(json!({ "deleteSpecificAppResult.DeletedCount": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    app_name: Option<String>,
}

/// Artifact fields exposed by /search.
#[derive(Debug, Serialize)]
pub struct SearchArtifact {
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Arch")]
    pub arch: String,
    #[serde(rename = "Package")]
    pub package: String,
    #[serde(rename = "Link")]
    pub link: String,
}

/// Changelog fields exposed by /search.
#[derive(Debug, Serialize)]
pub struct SearchChangelog {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Changes")]
    pub changes: String,
    #[serde(rename = "Date")]
    pub date: String,
}

/// One release as exposed by /search.
#[derive(Debug, Serialize)]
pub struct SearchApp {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "AppName")]
    pub app_name: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "Published")]
    pub published: bool,
    #[serde(rename = "Critical")]
    pub critical: bool,
    #[serde(rename = "Artifacts")]
    pub artifacts: Vec<SearchArtifact>,
    #[serde(rename = "Changelog")]
    pub changelog: Vec<SearchChangelog>,
    #[serde(rename = "Updated_at")]
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub apps: Vec<SearchApp>,
}

fn record_to_search_app(record: ReleaseRecord) -> ApiResult<SearchApp> {
    let updated_at = record
        .release
        .updated_at
        .format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format updated_at: {e}")))?;

    Ok(SearchApp {
        id: record.release.release_id.to_string(),
        app_name: record.release.app_name,
        version: record.release.version,
        channel: record.release.channel,
        published: record.release.published,
        critical: record.release.critical,
        artifacts: record
            .artifacts
            .into_iter()
            .map(|artifact| SearchArtifact {
                platform: artifact.platform,
                arch: artifact.arch,
                package: artifact.package,
                link: artifact.link,
            })
            .collect(),
        changelog: record
            .changelog
            .into_iter()
            .map(|entry| SearchChangelog {
                version: entry.version,
                changes: entry.changes,
                date: entry.date,
            })
            .collect(),
        updated_at,
    })
}

/// GET /search - List every release of an app, published or not.
pub async fn search_releases(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let app_name = match query.app_name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::BadRequest("app_name is required".to_string())),
    };

    let records = state.metadata.search_releases(app_name).await?;
    let apps = records
        .into_iter()
        .map(record_to_search_app)
        .collect::<ApiResult<_>>()?;

    Ok(Json(SearchResponse { apps }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Version;

    fn params() -> UploadParams {
        UploadParams {
            app_name: "testapp".to_string(),
            version: Version::parse("0.0.2.137").unwrap(),
            channel: "nightly".to_string(),
            platform: "universalPlatform".to_string(),
            arch: "universalArch".to_string(),
            publish: true,
            critical: false,
            changelog: String::new(),
        }
    }

    #[test]
    fn extension_from_first_dot() {
        assert_eq!(extension_of("testapp.dmg").unwrap(), ".dmg");
        assert_eq!(extension_of("testapp.tar.gz").unwrap(), ".tar.gz");
        assert!(extension_of("noextension").is_err());
        assert!(extension_of("trailingdot.").is_err());
    }

    #[test]
    fn key_includes_only_set_dimensions() {
        let full = artifact_key(&params(), ".dmg");
        assert_eq!(
            full,
            "testapp/nightly/universalPlatform/universalArch/testapp-0.0.2.137.dmg"
        );

        let mut bare = params();
        bare.channel = String::new();
        bare.platform = String::new();
        bare.arch = String::new();
        assert_eq!(artifact_key(&bare, ".dmg"), "testapp/testapp-0.0.2.137.dmg");
    }

    #[test]
    fn link_escapes_separators_and_round_trips() {
        let key = artifact_key(&params(), ".dmg");
        let link = artifact_link("http://localhost:9000/download", &key);
        assert_eq!(
            link,
            "http://localhost:9000/download/testapp%2Fnightly%2FuniversalPlatform%2FuniversalArch%2Ftestapp-0.0.2.137.dmg"
        );
        assert_eq!(
            key_from_link("http://localhost:9000/download", &link).as_deref(),
            Some(key.as_str())
        );
    }

    #[test]
    fn key_from_foreign_link_is_none() {
        assert!(key_from_link("http://localhost:9000/download", "http://elsewhere/blob.dmg").is_none());
    }
}
