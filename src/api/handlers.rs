use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::TimelineError;
use crate::logic::{
    BatchTagOutcome, BranchResult, CodeLevelDiff, TimelineService, VersionDiff, VersionExportData,
    VersionSearchParams, VersionStatistics,
};
use crate::model::{Id, TimelineEntry, Version, VersionType};
use crate::store::traits::Store;

pub type AppState<S> = Arc<TimelineService<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: TimelineError) -> ApiError {
    let status = match &err {
        TimelineError::VersionNotFound(_) | TimelineError::TaskNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        TimelineError::InvalidVersionType(_) | TimelineError::EmptyPayload(_) => {
            StatusCode::BAD_REQUEST
        }
        TimelineError::StorageRead { .. } => StatusCode::BAD_GATEWAY,
        TimelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(&err.to_string())))
}

#[derive(Debug, Deserialize)]
pub struct TagQuery {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct BranchQuery {
    pub branch_name: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionPairQuery {
    pub version1: Id,
    pub version2: Id,
}

/// Search criteria as query parameters; list-valued criteria arrive as
/// comma-separated strings.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub types: Option<String>,
    pub statuses: Option<String>,
    pub tags: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_version: Option<i32>,
    pub max_version: Option<i32>,
}

fn split_csv(raw: &Option<String>) -> Option<Vec<String>> {
    raw.as_ref().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
}

impl SearchQuery {
    fn into_params(self) -> Result<VersionSearchParams, ApiError> {
        let version_types = match split_csv(&self.types) {
            Some(labels) => Some(
                labels
                    .iter()
                    .map(|label| label.parse::<VersionType>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(error_response)?,
            ),
            None => None,
        };

        Ok(VersionSearchParams {
            version_types,
            statuses: split_csv(&self.statuses),
            tags: split_csv(&self.tags),
            start_time: self.start_time,
            end_time: self.end_time,
            min_version: self.min_version,
            max_version: self.max_version,
        })
    }
}

// ==================== Timeline basics ====================

pub async fn get_timeline<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
) -> Result<Json<ListResponse<TimelineEntry>>, ApiError> {
    let timeline = service
        .get_timeline(&task_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(timeline)))
}

pub async fn compare_versions<S: Store>(
    State(service): State<AppState<S>>,
    Query(query): Query<VersionPairQuery>,
) -> Result<Json<VersionDiff>, ApiError> {
    let diff = service
        .compare_versions(&query.version1, &query.version2)
        .await
        .map_err(error_response)?;
    Ok(Json(diff))
}

pub async fn rollback_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
) -> Result<Json<Version>, ApiError> {
    let rollback = service
        .rollback_to_version(&version_id)
        .await
        .map_err(error_response)?;
    Ok(Json(rollback))
}

pub async fn get_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
) -> Result<Json<Version>, ApiError> {
    let version = service
        .get_version(&version_id)
        .await
        .map_err(error_response)?;
    Ok(Json(version))
}

pub async fn delete_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
) -> Result<StatusCode, ApiError> {
    service
        .delete_version(&version_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Tags ====================

pub async fn add_tag<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
    Query(query): Query<TagQuery>,
) -> Result<Json<Version>, ApiError> {
    let version = service
        .add_tag(&version_id, &query.tag)
        .await
        .map_err(error_response)?;
    Ok(Json(version))
}

pub async fn remove_tag<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
    Query(query): Query<TagQuery>,
) -> Result<Json<Version>, ApiError> {
    let version = service
        .remove_tag(&version_id, &query.tag)
        .await
        .map_err(error_response)?;
    Ok(Json(version))
}

pub async fn get_versions_by_tag<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
    Query(query): Query<TagQuery>,
) -> Result<Json<ListResponse<Version>>, ApiError> {
    let versions = service
        .versions_by_tag(&task_id, &query.tag)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(versions)))
}

pub async fn batch_add_tag<S: Store>(
    State(service): State<AppState<S>>,
    Query(query): Query<TagQuery>,
    Json(version_ids): Json<Vec<Id>>,
) -> Json<BatchTagOutcome> {
    Json(service.batch_add_tag(&version_ids, &query.tag).await)
}

// ==================== Branching & diffing ====================

pub async fn create_branch<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<BranchResult>, ApiError> {
    let result = service
        .create_branch(&version_id, &query.branch_name)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

pub async fn get_code_level_diff<S: Store>(
    State(service): State<AppState<S>>,
    Query(query): Query<VersionPairQuery>,
) -> Result<Json<CodeLevelDiff>, ApiError> {
    let diff = service
        .code_level_diff(&query.version1, &query.version2)
        .await
        .map_err(error_response)?;
    Ok(Json(diff))
}

// ==================== Search, bulk ops, statistics ====================

pub async fn search_versions<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListResponse<TimelineEntry>>, ApiError> {
    let params = query.into_params()?;
    let entries = service
        .search_versions(&task_id, &params)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::new(entries)))
}

pub async fn delete_versions_after<S: Store>(
    State(service): State<AppState<S>>,
    Path((task_id, after_number)): Path<(Id, i32)>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    let deleted = service
        .delete_versions_after(&task_id, after_number)
        .await
        .map_err(error_response)?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

pub async fn get_statistics<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
) -> Result<Json<VersionStatistics>, ApiError> {
    let stats = service
        .get_statistics(&task_id)
        .await
        .map_err(error_response)?;
    Ok(Json(stats))
}

// ==================== Export / import / download ====================

pub async fn export_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
) -> Result<Json<VersionExportData>, ApiError> {
    let record = service
        .export_version(&version_id)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

pub async fn import_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
    Json(record): Json<VersionExportData>,
) -> Result<Json<Version>, ApiError> {
    let version = service
        .import_version(&task_id, &record)
        .await
        .map_err(error_response)?;
    Ok(Json(version))
}

fn zip_response(version_id: &Id, bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"codegen-app-{}.zip\"", version_id),
            ),
        ],
        bytes,
    )
}

pub async fn download_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(version_id): Path<Id>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = service
        .export_as_zip(&version_id)
        .await
        .map_err(error_response)?;
    Ok(zip_response(&version_id, bytes))
}

pub async fn download_latest_version<S: Store>(
    State(service): State<AppState<S>>,
    Path(task_id): Path<Id>,
) -> Result<impl IntoResponse, ApiError> {
    let latest = service
        .latest_version_for_task(&task_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(&format!(
                    "No versions found for task {}",
                    task_id
                ))),
            )
        })?;

    let bytes = service
        .export_as_zip(&latest.id)
        .await
        .map_err(error_response)?;
    Ok(zip_response(&latest.id, bytes))
}
