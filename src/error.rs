use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures of the data endpoint. All map to a 500 with an offline marker.
#[derive(Debug, thiserror::Error)]
pub enum DataBridgeError {
    #[error("APPS_SCRIPT_URL not configured")]
    NotConfigured,
    #[error("Failed to fetch from backend")]
    Upstream(String),
}

impl DataBridgeError {
    pub fn upstream(err: anyhow::Error) -> Self {
        DataBridgeError::Upstream(format!("{:#}", err))
    }

    fn details(&self) -> String {
        match self {
            DataBridgeError::NotConfigured => {
                "Set APPS_SCRIPT_URL or backend.urls to one or more backend URLs".to_string()
            }
            DataBridgeError::Upstream(details) => details.clone(),
        }
    }
}

impl IntoResponse for DataBridgeError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.to_string(),
            "details": self.details(),
            "bridge": { "status": "offline" },
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_upstream_error_body() {
        let err = DataBridgeError::upstream(anyhow::anyhow!("connection refused"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Failed to fetch from backend");
        assert_eq!(body["details"], "connection refused");
        assert_eq!(body["bridge"]["status"], "offline");
    }
}
