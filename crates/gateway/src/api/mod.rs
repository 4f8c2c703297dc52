//! HTTP API of the gateway.
//!
//! Routes follow the S3 path layout, answering in JSON:
//!
//! - `GET /` lists buckets
//! - `PUT`, `GET`, `DELETE /:bucket` create, list and remove a bucket
//! - `POST /:bucket` deletes a batch of objects
//! - `GET`, `HEAD`, `PUT`, `DELETE /:bucket/*key` act on one object

use axum::routing::get;
use axum::Router;
use http::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod buckets;
mod error;
mod objects;

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(vec![
            CONTENT_TYPE,
            CONTENT_LENGTH,
            RANGE,
            HeaderName::from_static(objects::COPY_SOURCE_HEADER),
        ])
        .expose_headers(vec![CONTENT_RANGE, ETAG, LAST_MODIFIED])
        .allow_origin(Any)
        .allow_credentials(false);

    let trace_layer = TraceLayer::new_for_http();

    Router::new()
        .route("/", get(buckets::list_buckets))
        .route(
            "/:bucket",
            get(buckets::list)
                .put(buckets::create)
                .post(buckets::delete_objects)
                .delete(buckets::delete),
        )
        .route(
            "/:bucket/*key",
            get(objects::get)
                .head(objects::head)
                .put(objects::put)
                .delete(objects::delete),
        )
        .with_state(state)
        .layer(cors_layer)
        .layer(trace_layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    fn test_router() -> (Router, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.gateway.staging_dir = Some(temp.path().to_path_buf());
        let state = AppState::from_config(&config).unwrap();
        (router(state), temp)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn put_object(uri: &str, data: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(CONTENT_TYPE, "text/plain")
            .header(CONTENT_LENGTH, data.len())
            .body(Body::from(data))
            .unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (router, _temp) = test_router();

        let (status, _) = send(&router, put_object("/docs/hello.txt", "hello world")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&router, request(Method::GET, "/docs/hello.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"hello world");

        let ranged = Request::builder()
            .uri("/docs/hello.txt")
            .header(RANGE, "bytes=6-")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(ranged).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(CONTENT_RANGE).unwrap(),
            "bytes 6-10/11"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"world");
    }

    #[tokio::test]
    async fn test_list_buckets_and_objects() {
        let (router, _temp) = test_router();
        send(&router, put_object("/docs/a.txt", "a")).await;
        send(&router, put_object("/docs/sub/b.txt", "b")).await;

        let (status, body) = send(&router, request(Method::GET, "/")).await;
        assert_eq!(status, StatusCode::OK);
        let buckets: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(buckets[0]["name"], "root");
        assert_eq!(buckets[1]["name"], "docs");

        let (status, body) = send(&router, request(Method::GET, "/docs?delimiter=/")).await;
        assert_eq!(status, StatusCode::OK);
        let page: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(page["objects"][0]["name"], "a.txt");
        assert_eq!(page["prefixes"][0], "sub/");

        let (_, body) = send(
            &router,
            request(Method::GET, "/docs?list-type=2&max-keys=1"),
        )
        .await;
        let page: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(page["is_truncated"], true);
        assert_eq!(page["next_continuation_token"], "a.txt");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (router, _temp) = test_router();

        let (status, body) = send(&router, request(Method::GET, "/docs/missing.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], "NoSuchKey");

        let (status, _) = send(&router, request(Method::DELETE, "/root")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        send(&router, put_object("/docs/a.txt", "a")).await;
        let (status, _) = send(&router, request(Method::DELETE, "/docs")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&router, request(Method::DELETE, "/docs?force=true")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_copy_and_batch_delete() {
        let (router, _temp) = test_router();
        send(&router, put_object("/docs/a.txt", "copy me")).await;

        let copy = Request::builder()
            .method(Method::PUT)
            .uri("/docs/b.txt")
            .header(objects::COPY_SOURCE_HEADER, "/docs/a.txt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, copy).await;
        assert_eq!(status, StatusCode::OK);
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["size"], 7);

        let batch = Request::builder()
            .method(Method::POST)
            .uri("/docs")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"objects":["a.txt","b.txt","c.txt"]}"#))
            .unwrap();
        let (status, body) = send(&router, batch).await;
        assert_eq!(status, StatusCode::OK);
        let result: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(result["deleted"].as_array().unwrap().len(), 2);
        assert_eq!(result["errors"][0]["object_name"], "c.txt");
        assert_eq!(result["errors"][0]["code"], "NoSuchKey");
    }
}
