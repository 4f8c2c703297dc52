use axum::extract::{Json, Path, Query, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use common::gateway::{BucketInfo, DeletedObject};

use super::error::{error_code, ApiError};
use crate::state::AppState;

/// Keys returned per page when the client does not ask for a size
pub const DEFAULT_MAX_KEYS: usize = 1000;

fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListQuery {
    /// `2` selects the continuation token flavour
    #[serde(default)]
    pub list_type: Option<u8>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub marker: String,
    #[serde(default)]
    pub delimiter: String,
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    #[serde(default)]
    pub continuation_token: String,
    #[serde(default)]
    pub start_after: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteBucketQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteObjectsRequest {
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteObjectsResponse {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteObjectsFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteObjectsFailure {
    pub object_name: String,
    pub code: &'static str,
    pub message: String,
}

pub async fn list_buckets(State(state): State<AppState>) -> Result<Json<Vec<BucketInfo>>, ApiError> {
    let buckets = state.gateway().list_buckets().await?;
    Ok(Json(buckets))
}

pub async fn create(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("creating bucket {}", bucket);
    state.gateway().make_bucket(&bucket).await?;
    Ok(StatusCode::OK)
}

pub async fn list(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let gateway = state.gateway();
    if query.list_type == Some(2) {
        let page = gateway
            .list_objects_v2(
                &bucket,
                &query.prefix,
                &query.continuation_token,
                &query.delimiter,
                query.max_keys,
                &query.start_after,
            )
            .await?;
        return Ok(Json(page).into_response());
    }

    let page = gateway
        .list_objects(
            &bucket,
            &query.prefix,
            &query.marker,
            &query.delimiter,
            query.max_keys,
        )
        .await?;
    Ok(Json(page).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<DeleteBucketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.gateway().delete_bucket(&bucket, query.force).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Batch delete; always answers 200 with a per-object report
pub async fn delete_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Json(req): Json<DeleteObjectsRequest>,
) -> Json<DeleteObjectsResponse> {
    let result = state.gateway().delete_objects(&bucket, &req.objects).await;
    tracing::info!(
        "batch delete in {}: {} deleted, {} failed",
        bucket,
        result.deleted.len(),
        result.errors.len()
    );

    let errors = result
        .errors
        .into_iter()
        .map(|failure| DeleteObjectsFailure {
            object_name: failure.object_name,
            code: error_code(&failure.error).1,
            message: failure.error.to_string(),
        })
        .collect();
    Json(DeleteObjectsResponse {
        deleted: result.deleted,
        errors,
    })
}
