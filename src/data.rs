use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::DataBridgeError;
use crate::server::AppState;

/// Caller parameters relayed to the backend with an action.
const FORWARDED_PARAMS: [&str; 2] = ["username", "password"];

/// `GET /api/data`: action passthrough, or the dashboard JSON plus bridge info.
///
/// The query is taken as a plain map so no parameter shape is ever rejected
/// with a non-JSON 400; a repeated key keeps its last value.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, DataBridgeError> {
    let backend = state.backend().ok_or_else(|| {
        error!("Data request rejected: no backend configured");
        DataBridgeError::NotConfigured
    })?;

    if let Some(action) = query.get("action").map(String::as_str).filter(|a| !a.is_empty()) {
        let mut params = vec![("action", action)];
        for name in FORWARDED_PARAMS {
            if let Some(value) = query.get(name) {
                params.push((name, value.as_str()));
            }
        }

        let reply = backend.fetch_text(&params).await.map_err(|e| {
            error!("Action {} failed: {:#}", action, e);
            DataBridgeError::upstream(e)
        })?;
        info!("Relayed action {} ({} bytes)", action, reply.body.len());

        let content_type = reply
            .content_type
            .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());
        return Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], reply.body).into_response());
    }

    let mut data = backend
        .fetch_json(&[("format", "json")])
        .await
        .map_err(|e| {
            error!("Dashboard fetch failed: {:#}", e);
            DataBridgeError::upstream(e)
        })?;

    let Value::Object(fields) = &mut data else {
        return Err(DataBridgeError::Upstream(
            "Backend returned JSON that is not an object".to_string(),
        ));
    };

    let target = backend.target();
    let mut bridge = json!({
        "status": "online",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if target.is_pooled() {
        bridge["backend_index"] = json!(target.ordinal());
        bridge["backend_pool_size"] = json!(target.pool_size);
    }
    fields.insert("bridge".to_string(), bridge);

    Ok(Json(data).into_response())
}
