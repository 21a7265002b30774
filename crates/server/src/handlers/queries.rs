//! Update-resolution query handlers: `/apps/latest` and `/checkVersion`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validate::{QueryParams, ResolverQuery, validate_query};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use courier_cache::ResponseCache;
use courier_core::Version;
use courier_metadata::models::ReleaseRecord;
use courier_metadata::repos::ReleaseRepo;
use serde_json::{Map, Value, json};

/// Artifacts of the winning release that match the requested platform+arch,
/// as `(extension without dot, link)` pairs.
fn matching_artifacts<'a>(
    record: &'a ReleaseRecord,
    platform: &'a str,
    arch: &'a str,
) -> impl Iterator<Item = (String, &'a str)> + 'a {
    record
        .artifacts
        .iter()
        .filter(move |artifact| artifact.platform == platform && artifact.arch == arch)
        .map(|artifact| {
            (
                artifact.package.trim_start_matches('.').to_string(),
                artifact.link.as_str(),
            )
        })
}

/// GET /apps/latest - URL bundle of the latest published release.
///
/// Response nests `channel -> platform -> arch -> extension -> {url}`.
/// An empty candidate set yields an empty object with HTTP 200.
pub async fn latest_release(
    State(state): State<AppState>,
    Query(query): Query<ResolverQuery>,
) -> ApiResult<Json<Value>> {
    let params = validate_query(&state, &query, false).await?;

    let Some(record) = state
        .metadata
        .get_latest_published(&params.app_name, &params.channel, &params.platform, &params.arch)
        .await?
    else {
        return Ok(Json(json!({})));
    };

    let mut by_extension = Map::new();
    for (extension, link) in matching_artifacts(&record, &params.platform, &params.arch) {
        by_extension.insert(extension, json!({ "url": link }));
    }

    let mut by_arch = Map::new();
    by_arch.insert(params.arch.clone(), Value::Object(by_extension));
    let mut by_platform = Map::new();
    by_platform.insert(params.platform.clone(), Value::Object(by_arch));
    let mut by_channel = Map::new();
    by_channel.insert(params.channel.clone(), Value::Object(by_platform));

    Ok(Json(Value::Object(by_channel)))
}

/// Cache key for one check query. The invalidation pattern on publish is
/// `app_name=<a>&version=*&channel=<c>&platform=*&arch=*`.
fn check_cache_key(params: &QueryParams, raw_version: &str) -> String {
    format!(
        "app_name={}&version={}&channel={}&platform={}&arch={}",
        params.app_name, raw_version, params.channel, params.platform, params.arch
    )
}

/// Concatenate changelog entries strictly newer than the client's version,
/// newest first, one per line.
fn changelog_since(record: &ReleaseRecord, client_version: Version) -> String {
    let mut entries: Vec<(Version, &str)> = record
        .changelog
        .iter()
        .filter_map(|entry| {
            let version = Version::parse(&entry.version).ok()?;
            (version > client_version).then_some((version, entry.changes.as_str()))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    entries
        .into_iter()
        .map(|(_, changes)| format!("{changes}\n"))
        .collect()
}

/// GET /checkVersion - Update check against the client's current version.
pub async fn check_version(
    State(state): State<AppState>,
    Query(query): Query<ResolverQuery>,
) -> ApiResult<Response> {
    let params = validate_query(&state, &query, true).await?;
    let Some(client_version) = params.version else {
        return Err(ApiError::Internal("version missing after validation".to_string()));
    };
    let raw_version = params.raw_version.clone().unwrap_or_default();

    // A cache hit short-circuits the resolver entirely
    let cache_key = check_cache_key(&params, &raw_version);
    if let Some(cache) = &state.cache {
        match cache.get(&cache_key).await {
            Ok(Some(cached)) => {
                tracing::debug!(key = %cache_key, "check-version cache hit");
                return Ok((
                    [(header::CONTENT_TYPE, "application/json")],
                    cached,
                )
                    .into_response());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "cache lookup failed");
            }
        }
    }

    let latest = state
        .metadata
        .get_latest_published(&params.app_name, &params.channel, &params.platform, &params.arch)
        .await?;

    let Some(record) = latest else {
        let body = json!({ "update_available": false, "error": "Not found" });
        return Ok(Json(body).into_response());
    };

    let latest_version = Version::parse(&record.release.version)
        .map_err(|e| ApiError::Internal(format!("stored version is invalid: {e}")))?;

    if client_version > latest_version {
        return Err(ApiError::Internal(format!(
            "requested version {raw_version} is newer than the latest version available"
        )));
    }

    let mut body = Map::new();
    body.insert(
        "update_available".to_string(),
        json!(client_version < latest_version),
    );
    for (extension, link) in matching_artifacts(&record, &params.platform, &params.arch) {
        body.insert(format!("update_url_{extension}"), json!(link));
    }
    if client_version < latest_version {
        body.insert("critical".to_string(), json!(record.release.critical));
        body.insert(
            "changelog".to_string(),
            json!(changelog_since(&record, client_version)),
        );
    }
    let body = Value::Object(body);

    if let Some(cache) = &state.cache
        && let Err(e) = cache.set(&cache_key, &body.to_string()).await
    {
        tracing::warn!(key = %cache_key, error = %e, "failed to store check-version response");
    }

    Ok(Json(body).into_response())
}
