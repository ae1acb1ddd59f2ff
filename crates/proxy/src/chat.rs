//! Chat completions handler.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt as _;
use relaygate_provider::{GatewayResponse, Reply};
use relaygate_types::{ChatCompletionRequest, GatewayError};
use std::convert::Infallible;
use std::sync::Arc;

use crate::{AppState, error::ApiError};

/// Reports whether the primary or the fallback backend served the response.
pub const BACKEND_HEADER: HeaderName = HeaderName::from_static("x-relaygate-backend");

/// Handles `POST /chat/completions`.
///
/// The body is parsed here rather than through the `Json` extractor so that
/// malformed JSON gets an OpenAI-shaped 400.
///
/// # Errors
///
/// Returns [`ApiError`] for invalid requests and when no backend could serve
/// the request.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ChatCompletionRequest =
        serde_json::from_slice(&body).map_err(|e| GatewayError::InvalidRequest {
            message: format!("Invalid JSON body: {e}"),
            code: Some("invalid_json"),
        })?;
    let config = state.config.load_full();
    let requested = request
        .model
        .clone()
        .unwrap_or_else(|| config.default_model.clone());

    tracing::info!(
        model = %requested,
        stream = request.is_stream(),
        messages = request.messages.as_ref().map_or(0, Vec::len),
        "chat completion request"
    );

    match state.gateway.handle(&config, &request).await {
        Ok(resp) => Ok(respond(&state, resp)),
        Err(e) => {
            state.usage.record_failure(&requested);
            Err(ApiError::from(e))
        }
    }
}

fn respond(state: &AppState, resp: GatewayResponse) -> Response {
    let GatewayResponse {
        reply,
        served_by,
        model,
        backend,
    } = resp;
    tracing::info!(
        model = %model,
        backend = %backend,
        served_by = %served_by,
        "chat completion served"
    );

    match reply {
        Reply::Completion(completion) => {
            let (input, output) = completion
                .usage
                .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
            state.usage.record_success(&model, served_by, input, output);
            ([(BACKEND_HEADER, served_by.as_str())], Json(completion)).into_response()
        }
        Reply::Stream(frames) => {
            state.usage.record_success(&model, served_by, 0, 0);
            let body = Body::from_stream(frames.map(Ok::<_, Infallible>));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::CACHE_CONTROL, "no-cache"),
                    (header::CONNECTION, "keep-alive"),
                    (BACKEND_HEADER, served_by.as_str()),
                ],
                body,
            )
                .into_response()
        }
    }
}
