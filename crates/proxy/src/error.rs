//! API error type that maps [`GatewayError`] variants to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relaygate_translate::ErrorBody;
use relaygate_types::GatewayError;

/// Message shown when both backends failed. Details are only logged.
const ALL_BACKENDS_FAILED: &str = "The request could not be completed by any backend.";

/// Wrapper around [`GatewayError`] that implements [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// Returns `(status, error_type, error_code)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match &self.0 {
            GatewayError::InvalidRequest { code, .. } => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", *code)
            }
            e if e.is_credential_error() => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("credential_unavailable"),
            ),
            GatewayError::Upstream { status, .. } => classify_upstream(*status),
            GatewayError::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "server_error",
                Some("upstream_error"),
            ),
            GatewayError::BackendUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                Some("backend_unavailable"),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("internal_error"),
            ),
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            GatewayError::FallbackFailed { .. } => ALL_BACKENDS_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

fn classify_upstream(status: u16) -> (StatusCode, &'static str, Option<&'static str>) {
    match status {
        429 => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_error",
            Some("rate_limit_exceeded"),
        ),
        401 => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            Some("invalid_api_key"),
        ),
        403 => (
            StatusCode::FORBIDDEN,
            "permission_error",
            Some("insufficient_quota"),
        ),
        _ => (StatusCode::BAD_GATEWAY, "server_error", Some("upstream_error")),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, error_code) = self.classify();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        }
        let body = ErrorBody::new(self.message(), error_type, error_code);
        (status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt as _;
    use relaygate_types::ProviderId;

    async fn extract_error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_invalid_request_error() {
        let (status, body) = extract_error_body(ApiError(GatewayError::InvalidRequest {
            message: "n > 1 is not supported.".into(),
            code: Some("unsupported_parameter"),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["code"], "unsupported_parameter");
        assert_eq!(body["error"]["message"], "n > 1 is not supported.");
        assert!(body["error"]["param"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_request_without_code() {
        let (status, body) =
            extract_error_body(ApiError(GatewayError::invalid_request("messages is required")))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["code"].is_null());
    }

    #[tokio::test]
    async fn test_missing_credential_is_5xx_with_hint() {
        let (status, body) = extract_error_body(ApiError(GatewayError::MissingCredential {
            provider: ProviderId::ClaudeMax,
            hint: "set CLAUDE_MAX_REFRESH_TOKEN".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "credential_unavailable");
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("CLAUDE_MAX_REFRESH_TOKEN")
        );
    }

    #[tokio::test]
    async fn test_refresh_and_claim_failures_are_credential_errors() {
        for err in [
            GatewayError::RefreshFailed {
                provider: ProviderId::OpenAICodex,
                status: 400,
                body: "invalid_grant".into(),
            },
            GatewayError::ClaimExtractionFailed {
                provider: ProviderId::OpenAICodex,
                claim: "chatgpt_account_id".into(),
            },
        ] {
            let (status, body) = extract_error_body(ApiError(err)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"]["code"], "credential_unavailable");
        }
    }

    #[tokio::test]
    async fn test_fallback_failed_is_generic_500() {
        let (status, body) = extract_error_body(ApiError(GatewayError::FallbackFailed {
            primary: "secret upstream detail".into(),
            fallback: "other detail".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "server_error");
        assert_eq!(body["error"]["message"], ALL_BACKENDS_FAILED);
    }

    #[tokio::test]
    async fn test_upstream_429_error() {
        let (status, body) = extract_error_body(ApiError(GatewayError::Upstream {
            status: 429,
            body: "rate limited".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["type"], "rate_limit_error");
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
    }

    #[tokio::test]
    async fn test_upstream_403_error() {
        let (status, body) = extract_error_body(ApiError(GatewayError::Upstream {
            status: 403,
            body: "forbidden".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "insufficient_quota");
    }

    #[tokio::test]
    async fn test_upstream_500_error() {
        let (status, body) = extract_error_body(ApiError(GatewayError::Upstream {
            status: 500,
            body: "server error".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "upstream_error");
    }

    #[tokio::test]
    async fn test_backend_unavailable() {
        let (status, _) = extract_error_body(ApiError(GatewayError::BackendUnavailable(
            "no API key configured for groq".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_internal_error() {
        let (status, body) =
            extract_error_body(ApiError(GatewayError::Config("bad config".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal_error");
    }
}
