use axum::{middleware, routing::any, Router};

pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod server;
pub mod shutdown;

pub use server::EchoServer;

#[derive(Debug, Clone)]
pub struct AppState {
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(config::DEFAULT_MAX_BODY_BYTES)
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", any(http::handlers::root))
        .route("/echo", any(http::handlers::echo))
        .fallback(http::handlers::not_found)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::http::handlers::STATUS_MESSAGE;

    fn app() -> Router {
        build_app(AppState::default())
    }

    async fn send(app: Router, method: &str, uri: &str, body: Body) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .method(method)
                .body(body)
                .expect("request build"),
        )
        .await
        .expect("request execution")
    }

    async fn body_bytes(response: axum::response::Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    #[tokio::test]
    async fn root_returns_status_message() {
        let response = send(app(), "GET", "/", Body::empty()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, STATUS_MESSAGE);
    }

    #[tokio::test]
    async fn root_ignores_method_query_and_body() {
        for method in ["POST", "PUT", "DELETE", "PATCH"] {
            let response = send(app(), method, "/?verbose=1", Body::from("ignored")).await;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_bytes(response).await, STATUS_MESSAGE);
        }
    }

    #[tokio::test]
    async fn echo_returns_request_body() {
        let response = send(app(), "POST", "/echo", Body::from("hello, inspector")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"text/plain"[..])
        );
        assert_eq!(body_bytes(response).await, "hello, inspector");
    }

    #[tokio::test]
    async fn echo_with_empty_body_returns_empty_body() {
        let response = send(app(), "GET", "/echo", Body::empty()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn echo_preserves_non_utf8_bytes() {
        let payload = vec![0x00, 0xc3, 0x28, 0xff, b'\r', b'\n'];
        let response = send(app(), "PUT", "/echo", Body::from(payload.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn echo_rejects_body_over_limit() {
        let response = send(
            build_app(AppState::new(8)),
            "POST",
            "/echo",
            Body::from("nine bytes"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body_json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).expect("valid json response");
        assert_eq!(body_json["code"], "payload_too_large");
    }

    #[tokio::test]
    async fn echo_accepts_body_at_limit() {
        let response = send(
            build_app(AppState::new(8)),
            "POST",
            "/echo",
            Body::from("12345678"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "12345678");
    }

    #[tokio::test]
    async fn echo_body_read_failure_is_bad_request() {
        let chunks: Vec<Result<axum::body::Bytes, std::io::Error>> = vec![
            Ok(axum::body::Bytes::from_static(b"par")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));

        let response = send(app(), "POST", "/echo", body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).expect("valid json response");
        assert_eq!(body_json["code"], "body_read_failed");
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found() {
        let response = send(app(), "GET", "/status", Body::empty()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body_json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).expect("valid json response");
        assert_eq!(body_json["code"], "not_found");
        assert_eq!(body_json["message"], "no route for /status");
    }

    #[tokio::test]
    async fn echo_subpath_is_not_found() {
        let response = send(app(), "POST", "/echo/extra", Body::from("x")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
