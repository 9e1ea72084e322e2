//! HTTP API.
//!
//! | Method | Path          | Body        | Reply                        |
//! |--------|---------------|-------------|------------------------------|
//! | POST   | `/api/load`   | `{text}`    | [`LoadResponse`]             |
//! | POST   | `/api/query`  | `{query}`   | [`QueryResponse`]            |
//! | GET    | `/api/stats`  |             | [`SessionStats`]             |
//! | POST   | `/api/reset`  |             | `{success, message}`         |
//! | GET    | `/`           |             | name, version, endpoints     |
//!
//! Errors are returned as `{"detail": "..."}`.
//!
//! [`LoadResponse`]: crate::service::LoadResponse
//! [`QueryResponse`]: crate::service::QueryResponse
//! [`SessionStats`]: crate::session::SessionStats

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::service::{LoadResponse, QueryResponse, QueryService};
use crate::session::SessionStats;

const API_NAME: &str = "NDA Guardian API";

const ENDPOINTS: [&str; 4] = [
    "POST /api/load",
    "POST /api/query",
    "GET  /api/stats",
    "POST /api/reset",
];

/// Body of `POST /api/load`.
#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    /// Full agreement text.
    pub text: String,
}

/// Body of `POST /api/query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The question.
    pub query: String,
}

/// A failed request rendered as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// The service rejected or failed the request.
    Service(Error),
    /// The body was not the JSON the endpoint expects.
    Body(JsonRejection),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Service(err) if err.is_model_error() => StatusCode::BAD_GATEWAY,
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Service(err) => err.to_string(),
            Self::Body(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            error!(error = %detail, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %detail, status = status.as_u16(), "Rejected request");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the API router around `service`.
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/load", post(load))
        .route("/api/query", post(query))
        .route("/api/stats", get(stats))
        .route("/api/reset", post(reset))
        .with_state(service)
}

/// Serve the API on `bind` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(service: Arc<QueryService>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": API_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

async fn load(
    State(service): State<Arc<QueryService>>,
    body: std::result::Result<Json<LoadRequest>, JsonRejection>,
) -> ApiResult<LoadResponse> {
    let Json(req) = body?;
    Ok(Json(service.load(&req.text).await?))
}

async fn query(
    State(service): State<Arc<QueryService>>,
    body: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<QueryResponse> {
    let Json(req) = body?;
    Ok(Json(service.query(&req.query).await?))
}

async fn stats(State(service): State<Arc<QueryService>>) -> Json<SessionStats> {
    Json(service.stats().await)
}

async fn reset(State(service): State<Arc<QueryService>>) -> Json<Value> {
    service.reset().await;
    Json(json!({ "success": true, "message": "Session reset." }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::document::SAMPLE_NDA;
    use crate::privacy::Anonymizer;
    use crate::routing::testing::{generation, FixedLocal, RecordingCloud};
    use crate::routing::{CloudModel, FunctionCall, HybridRouter};
    use crate::session::Session;

    fn app_with(calls: Vec<FunctionCall>, cloud: Option<RecordingCloud>) -> Router {
        let router = HybridRouter::new(
            Arc::new(FixedLocal(generation(calls, 0.9))),
            cloud.map(|c| Arc::new(c) as Arc<dyn CloudModel>),
        );
        router_for(router)
    }

    fn router_for(router: HybridRouter) -> Router {
        let service = QueryService::new(router, Anonymizer::default(), Session::default());
        super::router(Arc::new(service))
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let resp = app_with(vec![], None).oneshot(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["name"], "NDA Guardian API");
        assert_eq!(body["endpoints"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_load_empty_is_400() {
        let resp = app_with(vec![], None)
            .oneshot(post_json("/api/load", &json!({ "text": "   " })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["detail"],
            "Document text cannot be empty."
        );
    }

    #[tokio::test]
    async fn test_query_without_document_is_400() {
        let resp = app_with(vec![], None)
            .oneshot(post_json("/api/query", &json!({ "query": "Who?" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["detail"],
            "No document loaded. POST /api/load first."
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_detail() {
        let resp = app_with(vec![], None)
            .oneshot(post_json("/api/query", &json!({ "nope": 1 })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = body_json(resp).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("missing field `query`"), "{detail}");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_json_detail() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/load")
            .body(Body::from("plain text"))
            .unwrap();
        let resp = app_with(vec![], None).oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body_json(resp).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_load_then_query() {
        let app = app_with(vec![FunctionCall::new("extract_parties")], None);

        let resp = app
            .clone()
            .oneshot(post_json("/api/load", &json!({ "text": SAMPLE_NDA })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert!(body["clauses_found"]
            .as_array()
            .unwrap()
            .contains(&json!("non_compete")));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/query",
                &json!({ "query": "Who are the parties?" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["tool_called"], "extract_parties");
        assert_eq!(body["source"], "on-device");
        assert_eq!(body["words_sent_to_cloud"], 0);
        assert!(body["answer"].as_str().unwrap().contains("Northwind"));

        let resp = app.oneshot(get("/api/stats")).await.unwrap();
        let stats = body_json(resp).await;
        assert_eq!(stats["query_count"], 1);
        assert_eq!(stats["local_pct"], 100);
    }

    #[tokio::test]
    async fn test_cloud_failure_is_502() {
        let call = FunctionCall::new("benchmark_clause").with_arg("clause_type", "ip_assignment");
        let cloud = RecordingCloud {
            fail: true,
            ..Default::default()
        };
        let app = app_with(vec![call], Some(cloud));

        app.clone()
            .oneshot(post_json("/api/load", &json!({ "text": SAMPLE_NDA })))
            .await
            .unwrap();
        let resp = app
            .oneshot(post_json(
                "/api/query",
                &json!({ "query": "Is the IP clause unusually broad?" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(resp).await["detail"]
            .as_str()
            .unwrap()
            .contains("cloud model error"));
    }

    #[tokio::test]
    async fn test_reset() {
        let app = app_with(vec![], None);
        app.clone()
            .oneshot(post_json("/api/load", &json!({ "text": SAMPLE_NDA })))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(post_json("/api/reset", &json!({})))
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Session reset.");

        let resp = app
            .oneshot(post_json("/api/query", &json!({ "query": "Who?" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(Error::NoDocument).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::cloud_model("down")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(Error::internal("bug")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
