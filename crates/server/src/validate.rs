//! Request parameter validation against the taxonomy.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use courier_core::{DimensionKind, Version, is_valid_app_name, is_valid_version_input};
use courier_metadata::repos::DimensionRepo;
use serde::Deserialize;

/// Raw fields of the JSON `data` part of an upload/update request.
#[derive(Debug, Default, Deserialize)]
pub struct UploadData {
    pub id: Option<String>,
    pub app_name: Option<String>,
    pub version: Option<String>,
    pub channel: Option<String>,
    pub platform: Option<String>,
    pub arch: Option<String>,
    pub publish: Option<bool>,
    pub critical: Option<bool>,
    pub changelog: Option<String>,
}

/// Normalized upload parameters consumed by the coordinator and resolver.
///
/// Dimension fields are the empty string when the dimension has no records
/// and was therefore optional.
#[derive(Debug, Clone)]
pub struct UploadParams {
    pub app_name: String,
    pub version: Version,
    pub channel: String,
    pub platform: String,
    pub arch: String,
    pub publish: bool,
    pub critical: bool,
    pub changelog: String,
}

/// Validate the app name: present and alphanumeric.
fn validate_app_name(app_name: Option<&str>) -> ApiResult<String> {
    let app_name = match app_name {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::BadRequest("app_name is required".to_string())),
    };
    if !is_valid_app_name(app_name) {
        return Err(ApiError::BadRequest(
            "app_name contains invalid characters".to_string(),
        ));
    }
    Ok(app_name.to_string())
}

/// Validate the version string: surface grammar first, then the
/// four-component numeric form.
fn validate_version(version: Option<&str>) -> ApiResult<Version> {
    let version = match version {
        Some(version) if !version.is_empty() => version,
        _ => return Err(ApiError::BadRequest("version is required".to_string())),
    };
    if !is_valid_version_input(version) {
        return Err(ApiError::BadRequest(
            "version contains invalid characters".to_string(),
        ));
    }
    Ok(Version::parse(version)?)
}

/// Resolve one gated dimension value.
///
/// A dimension with zero records is optional (legacy compatibility) and
/// resolves to the empty string. Once any record exists the parameter is
/// mandatory, and a named value must exist in the taxonomy.
async fn resolve_dimension(
    state: &AppState,
    kind: DimensionKind,
    value: Option<&str>,
) -> ApiResult<String> {
    match value {
        Some(value) if !value.is_empty() => {
            if state
                .metadata
                .get_dimension_by_name(kind, value)
                .await?
                .is_none()
            {
                return Err(ApiError::BadRequest(format!(
                    "{kind} with this name does not exist"
                )));
            }
            Ok(value.to_string())
        }
        _ => {
            if state.metadata.count_dimensions(kind).await? > 0 {
                return Err(ApiError::BadRequest(format!(
                    "you have a created {kind}s, setting {kind} is required"
                )));
            }
            Ok(String::new())
        }
    }
}

/// Validate upload parameters: app existence, version grammar, and
/// dimension gating.
pub async fn validate_upload(state: &AppState, data: &UploadData) -> ApiResult<UploadParams> {
    let app_name = validate_app_name(data.app_name.as_deref())?;
    if state
        .metadata
        .get_dimension_by_name(DimensionKind::App, &app_name)
        .await?
        .is_none()
    {
        return Err(ApiError::BadRequest(
            "app with this name does not exist".to_string(),
        ));
    }

    let version = validate_version(data.version.as_deref())?;
    let channel = resolve_dimension(state, DimensionKind::Channel, data.channel.as_deref()).await?;
    let platform =
        resolve_dimension(state, DimensionKind::Platform, data.platform.as_deref()).await?;
    let arch = resolve_dimension(state, DimensionKind::Arch, data.arch.as_deref()).await?;

    Ok(UploadParams {
        app_name,
        version,
        channel,
        platform,
        arch,
        publish: data.publish.unwrap_or(false),
        critical: data.critical.unwrap_or(false),
        changelog: data.changelog.clone().unwrap_or_default(),
    })
}

/// Query parameters shared by the resolver endpoints.
#[derive(Debug, Deserialize)]
pub struct ResolverQuery {
    pub app_name: Option<String>,
    pub version: Option<String>,
    pub channel: Option<String>,
    pub platform: Option<String>,
    pub arch: Option<String>,
}

/// Validated resolver inputs. `version` is present for check queries only.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub app_name: String,
    pub version: Option<Version>,
    pub raw_version: Option<String>,
    pub channel: String,
    pub platform: String,
    pub arch: String,
}

/// Validate resolver query parameters. Unlike uploads, an unknown app is
/// not rejected here; it simply resolves to an empty candidate set.
pub async fn validate_query(
    state: &AppState,
    query: &ResolverQuery,
    version_required: bool,
) -> ApiResult<QueryParams> {
    let app_name = validate_app_name(query.app_name.as_deref())?;

    let (version, raw_version) = if version_required {
        let version = validate_version(query.version.as_deref())?;
        (Some(version), query.version.clone())
    } else {
        (None, None)
    };

    let channel =
        resolve_dimension(state, DimensionKind::Channel, query.channel.as_deref()).await?;
    let platform =
        resolve_dimension(state, DimensionKind::Platform, query.platform.as_deref()).await?;
    let arch = resolve_dimension(state, DimensionKind::Arch, query.arch.as_deref()).await?;

    Ok(QueryParams {
        app_name,
        version,
        raw_version,
        channel,
        platform,
        arch,
    })
}
