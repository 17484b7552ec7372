//! HTTP surface of the nimbus gateway.

pub mod config;

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use nimbus_common::GatewayError;
use nimbus_gateway::{Dispatcher, InvokeRequest};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/functions", post(create_function_handler))
        .route("/invoke/:name", any(invoke_handler))
        .route("/invoke/:name/*path", any(invoke_path_handler))
        .route("/health/ready", get(health_handler))
        .route("/health/live", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateFunctionRequest {
    name: String,
    #[serde(rename = "imageReference")]
    image: String,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// Map a terminal invocation error to its caller-visible status and body.
fn error_response(err: GatewayError) -> Response {
    match err {
        GatewayError::NotFound(_) => {
            message(StatusCode::NOT_FOUND, "Could not find the requested resource")
        }
        GatewayError::SchedulingFailure(_) => message(
            StatusCode::INTERNAL_SERVER_ERROR,
            "We couldn't create an instance for your function right now, please try again later",
        ),
        GatewayError::AdmissionTimeout(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "OUT_OF_SERVICE",
                "message": "One or more instances of the function can't be marked as ready",
            })),
        )
            .into_response(),
        GatewayError::Upstream(_) => {
            message(StatusCode::INTERNAL_SERVER_ERROR, "We cannot serve right now")
        }
        GatewayError::Transcode(_) => message(
            StatusCode::INTERNAL_SERVER_ERROR,
            "The function returned an invalid response",
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "message": "OK" }))
}

async fn create_function_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateFunctionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "could not parse create function body");
            return message(
                StatusCode::BAD_REQUEST,
                "Invalid request body, please check the documentation",
            );
        }
    };

    if request.name.trim().is_empty() || request.image.trim().is_empty() {
        return message(
            StatusCode::BAD_REQUEST,
            "Fields 'name' and 'imageReference' must be non-empty",
        );
    }

    match state
        .dispatcher
        .create_function(&request.name, &request.image)
        .await
    {
        Ok(function) => (StatusCode::OK, Json(function)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn invoke_handler(
    State(state): State<AppState>,
    method: Method,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(state, method, name, "/".to_string(), query, headers, body).await
}

async fn invoke_path_handler(
    State(state): State<AppState>,
    method: Method,
    Path((name, rest)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = format!("/{rest}");
    dispatch(state, method, name, path, query, headers, body).await
}

async fn dispatch(
    state: AppState,
    method: Method,
    function: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = InvokeRequest {
        method,
        function,
        path,
        query,
        headers,
        body: body.to_vec(),
    };

    match state.dispatcher.invoke(request).await {
        Ok(reply) => {
            let mut response = Response::new(Body::from(reply.body));
            *response.status_mut() = reply.status;
            *response.headers_mut() = reply.headers;
            response
        }
        Err(e) => error_response(e),
    }
}
