use std::io;

use axum::body::Body;
use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use http::header::{
    HeaderMap, HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED, RANGE,
};
use http::StatusCode;
use tokio_util::io::{ReaderStream, StreamReader};

use common::gateway::{GatewayError, ObjectInfo, RangeSpec};

use super::error::ApiError;
use crate::state::AppState;

/// Header naming the `/<bucket>/<key>` to copy from on PUT
pub const COPY_SOURCE_HEADER: &str = "x-amz-copy-source";

fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl http::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Object metadata as response headers
fn object_headers(info: &ObjectInfo) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let content_type = info
        .content_type
        .as_deref()
        .unwrap_or(common::allocation::DEFAULT_CONTENT_TYPE);
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Some(etag) = &info.etag {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(ETAG, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&http_date(info.mod_time)) {
        headers.insert(LAST_MODIFIED, value);
    }
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers
}

/// Split an `x-amz-copy-source` value into bucket and key
fn parse_copy_source(source: &str) -> Result<(&str, &str), ApiError> {
    source
        .trim_start_matches('/')
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid copy source: {}", source)))
}

pub async fn get(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = match header_str(&headers, RANGE) {
        Some(value) => Some(
            value
                .parse::<RangeSpec>()
                .map_err(GatewayError::from)?,
        ),
        None => None,
    };
    let ranged = range.is_some();

    let object = state.gateway().get_object(&bucket, &key, range).await?;
    tracing::debug!(
        "serving {}/{} bytes {}+{}",
        bucket,
        key,
        object.offset,
        object.length
    );

    let mut response_headers = object_headers(&object.info);
    response_headers.insert(CONTENT_LENGTH, HeaderValue::from(object.length));
    let status = if ranged {
        let last = (object.offset + object.length).saturating_sub(1);
        let content_range = format!("bytes {}-{}/{}", object.offset, last, object.info.size);
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            response_headers.insert(CONTENT_RANGE, value);
        }
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    // the staged file is released once the stream is dropped
    let body = Body::from_stream(ReaderStream::new(object.reader));
    Ok((status, response_headers, body).into_response())
}

pub async fn head(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let info = state.gateway().get_object_info(&bucket, &key).await?;
    let mut headers = object_headers(&info);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(info.size));
    Ok((StatusCode::OK, headers).into_response())
}

/// Upload the request body, or copy another object when the copy source
/// header is present
pub async fn put(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<ObjectInfo>, ApiError> {
    let gateway = state.gateway();

    if let Some(source) = header_str(&headers, COPY_SOURCE_HEADER) {
        let (src_bucket, src_key) = parse_copy_source(source)?;
        tracing::info!("copying {}/{} to {}/{}", src_bucket, src_key, bucket, key);
        let info = gateway
            .copy_object(src_bucket, src_key, &bucket, &key)
            .await?;
        return Ok(Json(info));
    }

    let content_type = header_str(&headers, CONTENT_TYPE);
    let size = match header_str(&headers, CONTENT_LENGTH) {
        Some(value) => Some(
            value
                .parse::<u64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid content length: {}", value)))?,
        ),
        None => None,
    };

    let stream = body
        .into_data_stream()
        .map_err(io::Error::other);
    let mut reader = StreamReader::new(stream);

    let info = gateway
        .put_object(&bucket, &key, content_type, &mut reader, size)
        .await?;
    tracing::info!("stored {}/{} ({} bytes)", bucket, key, info.size);
    Ok(Json(info))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.gateway().delete_object(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
