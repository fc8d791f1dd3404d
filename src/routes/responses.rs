//! Responses API handler
//!
//! `POST /v1/responses` (and `/responses`): one normalized surface for every
//! configured upstream.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::StreamExt;
use tracing::info;

use crate::{
    error::AppError,
    gateway::GatewayReply,
    middleware::auth::Authenticated,
    native::{request::ResponsesRequest, streaming::format_sse_event},
    AppState,
};

/// Handler for POST /v1/responses
pub async fn responses_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Authenticated>,
    payload: Result<Json<ResponsesRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    info!(
        model = %request.model,
        stream = request.stream,
        tools = request.tools.len(),
        "Processing Responses API request"
    );

    match state.gateway.execute(&caller, request).await? {
        GatewayReply::Complete(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        GatewayReply::Stream(events) => Ok(sse_response(events.map(|event| {
            Ok::<_, std::convert::Infallible>(format_sse_event(&event))
        }))),
    }
}

fn sse_response<S>(frames: S) -> Response
where
    S: futures::Stream<Item = Result<bytes::Bytes, std::convert::Infallible>> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Keeps nginx-style proxies from buffering the stream
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
