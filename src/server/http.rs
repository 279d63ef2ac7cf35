//! HTTP transport
//!
//! `POST /api/{group}/{version}/{method}` with the wire request as JSON body.
//! Every reply is an [`ApiResponse`] envelope; the status code follows the
//! error class. Handlers run on the blocking pool because group servers
//! block on host commands.

use super::dispatch::Dispatcher;
use super::ApiGroup;
use crate::error::ProxyError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Reply envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Error class, see [`ProxyError::kind`]
    pub kind: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn error(message: String, kind: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            kind: Some(kind),
        }
    }
}

/// HTTP status for an error class
pub fn status_for(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
        ProxyError::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ProxyError::NotFound(_) | ProxyError::UnknownMethod { .. } => StatusCode::NOT_FOUND,
        ProxyError::Disk(_) => StatusCode::CONFLICT,
        ProxyError::Discovery(_) | ProxyError::Connect(_) | ProxyError::Disconnect(_) => {
            StatusCode::BAD_GATEWAY
        }
        ProxyError::HostExecution { .. } | ProxyError::Registration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// One served (group, version) and its methods
#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub group: ApiGroup,
    pub version: String,
    pub methods: Vec<String>,
}

pub fn router(dispatcher: Arc<Dispatcher>, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/api/versions", get(list_versions))
        .route("/api/{group}/{version}/{method}", post(call))
        .layer(RequestBodyLimitLayer::new(max_request_bytes))
        .with_state(dispatcher)
}

type Reply = (StatusCode, Json<ApiResponse<Value>>);

/// Route one call to the dispatcher
pub async fn call(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path((group, version, method)): Path<(String, String, String)>,
    body: Bytes,
) -> Reply {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Rejected {}/{}/{}: body is not JSON: {}", group, version, method, e);
                let err = ProxyError::Validation(format!("request body is not JSON: {}", e));
                return failure(err);
            }
        }
    };

    let result =
        tokio::task::spawn_blocking(move || {
            dispatcher.dispatch_path(&group, &version, &method, payload)
        })
        .await;

    match result {
        Ok(Ok(data)) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Ok(Err(err)) => failure(err),
        Err(e) => {
            log::error!("Handler panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("handler panicked".to_string(), "internal")),
            )
        }
    }
}

fn failure(err: ProxyError) -> Reply {
    (status_for(&err), Json(ApiResponse::error(err.to_string(), err.kind())))
}

/// Active groups, versions and methods
pub async fn list_versions(
    State(dispatcher): State<Arc<Dispatcher>>,
) -> Json<ApiResponse<Vec<VersionInfo>>> {
    let mut info = Vec::new();
    for group in dispatcher.groups() {
        for version in dispatcher.versions(group) {
            info.push(VersionInfo {
                group,
                methods: dispatcher
                    .methods(group, &version)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                version: version.to_string(),
            });
        }
    }
    Json(ApiResponse::success(info))
}
