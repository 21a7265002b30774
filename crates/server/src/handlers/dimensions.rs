//! Taxonomy dimension CRUD handlers.
//!
//! The four kinds share one implementation; the per-route wrappers only fix
//! the kind so the router stays a flat list of paths.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{parse_data, read_multipart};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Query, State};
use courier_core::{DimensionKind, is_valid_app_name};
use courier_metadata::models::DimensionRow;
use courier_metadata::repos::DimensionRepo;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// JSON `data` field for create/update: the kind's own key carries the name.
#[derive(Debug, Deserialize)]
struct DimensionData {
    id: Option<String>,
    app: Option<String>,
    channel: Option<String>,
    platform: Option<String>,
    arch: Option<String>,
}

impl DimensionData {
    fn name_for(&self, kind: DimensionKind) -> Option<&str> {
        let value = match kind {
            DimensionKind::App => self.app.as_deref(),
            DimensionKind::Channel => self.channel.as_deref(),
            DimensionKind::Platform => self.platform.as_deref(),
            DimensionKind::Arch => self.arch.as_deref(),
        };
        value.filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

fn parse_id(id: Option<&str>) -> ApiResult<Uuid> {
    let Some(id) = id else {
        return Err(ApiError::BadRequest("id is required".to_string()));
    };
    Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn keyed_response(key: String, value: Value) -> Json<Value> {
    let mut map = Map::new();
    map.insert(key, value);
    Json(Value::Object(map))
}

async fn create_dimension(
    state: AppState,
    kind: DimensionKind,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let payload = read_multipart(&mut multipart).await?;
    let data: DimensionData = parse_data(&payload)?;
    let name = data
        .name_for(kind)
        .ok_or_else(|| ApiError::BadRequest(format!("{kind} name is required")))?;
    if kind == DimensionKind::App && !is_valid_app_name(name) {
        return Err(ApiError::BadRequest(
            "app_name contains invalid characters".to_string(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let row = DimensionRow {
        dimension_id: Uuid::new_v4(),
        kind: kind.as_str().to_string(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_dimension(&row).await?;

    tracing::info!(kind = %kind, name = %name, "dimension created");
    Ok(keyed_response(
        format!("create{}Result.Created", kind.title()),
        json!(row.dimension_id.to_string()),
    ))
}

async fn list_dimensions(state: AppState, kind: DimensionKind) -> ApiResult<Json<Value>> {
    let rows = state.metadata.list_dimensions(kind).await?;

    let items: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let updated_at = row
                .updated_at
                .format(&Rfc3339)
                .map_err(|e| ApiError::Internal(format!("failed to format updated_at: {e}")))?;
            let mut item = Map::new();
            item.insert("ID".to_string(), json!(row.dimension_id.to_string()));
            item.insert(format!("{}Name", kind.title()), json!(row.name));
            item.insert("Updated_at".to_string(), json!(updated_at));
            Ok(Value::Object(item))
        })
        .collect::<ApiResult<_>>()?;

    Ok(keyed_response(format!("{}s", kind.as_str()), json!(items)))
}

async fn update_dimension(
    state: AppState,
    kind: DimensionKind,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let payload = read_multipart(&mut multipart).await?;
    let data: DimensionData = parse_data(&payload)?;
    let dimension_id = parse_id(data.id.as_deref())?;
    let name = data
        .name_for(kind)
        .ok_or_else(|| ApiError::BadRequest(format!("{kind} name is required")))?;
    if kind == DimensionKind::App && !is_valid_app_name(name) {
        return Err(ApiError::BadRequest(
            "app_name contains invalid characters".to_string(),
        ));
    }

    state
        .metadata
        .rename_dimension(kind, dimension_id, name, OffsetDateTime::now_utc())
        .await?;

    tracing::info!(kind = %kind, id = %dimension_id, new_name = %name, "dimension renamed");
    Ok(keyed_response(
        format!("update{}Result.Updated", kind.title()),
        json!(true),
    ))
}

async fn delete_dimension(
    state: AppState,
    kind: DimensionKind,
    query: IdQuery,
) -> ApiResult<Json<Value>> {
    let dimension_id = parse_id(query.id.as_deref())?;
    let deleted = state.metadata.delete_dimension(kind, dimension_id).await?;

    Ok(keyed_response(
        format!("delete{}Result.DeletedCount", kind.title()),
        json!(deleted),
    ))
}

// Per-route wrappers

pub async fn create_app(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    create_dimension(state, DimensionKind::App, multipart).await
}

pub async fn create_channel(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    create_dimension(state, DimensionKind::Channel, multipart).await
}

pub async fn create_platform(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    create_dimension(state, DimensionKind::Platform, multipart).await
}

pub async fn create_arch(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    create_dimension(state, DimensionKind::Arch, multipart).await
}

pub async fn list_apps(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    list_dimensions(state, DimensionKind::App).await
}

pub async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    list_dimensions(state, DimensionKind::Channel).await
}

pub async fn list_platforms(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    list_dimensions(state, DimensionKind::Platform).await
}

pub async fn list_archs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    list_dimensions(state, DimensionKind::Arch).await
}

pub async fn update_app(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    update_dimension(state, DimensionKind::App, multipart).await
}

pub async fn update_channel(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    update_dimension(state, DimensionKind::Channel, multipart).await
}

pub async fn update_platform(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    update_dimension(state, DimensionKind::Platform, multipart).await
}

pub async fn update_arch(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    update_dimension(state, DimensionKind::Arch, multipart).await
}

pub async fn delete_app(State(state): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Value>> {
    delete_dimension(state, DimensionKind::App, query).await
}

pub async fn delete_channel(State(state): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Value>> {
    delete_dimension(state, DimensionKind::Channel, query).await
}

pub async fn delete_platform(State(state): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Value>> {
    delete_dimension(state, DimensionKind::Platform, query).await
}

pub async fn delete_arch(State(state): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Value>> {
    delete_dimension(state, DimensionKind::Arch, query).await
}
