use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bot::{spawn_activity_log, Interaction};
use crate::config::WebhookMode;
use crate::platform::Update;
use crate::server::AppState;

/// Browsers hitting the webhook land on the dashboard instead.
pub async fn redirect_to_dashboard() -> Redirect {
    Redirect::temporary("/dashboard")
}

fn ack() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// `POST /api/webhook`: one Telegram update.
pub async fn receive_update(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let mode = state.config.webhook.mode;
    let span = info_span!("webhook", request_id = %Uuid::new_v4(), %mode);
    async move {
        let Some(update) = Update::parse(&body) else {
            debug!("Ignoring body without message or callback_query");
            return ack();
        };

        match mode {
            WebhookMode::Relay => relay(&state, body).await,
            WebhookMode::Forward => {
                forward_in_background(&state, body);
                ack()
            }
            WebhookMode::Interactive => {
                let Some(backend) = state.backend() else {
                    error!("No backend configured; update dropped");
                    return ack();
                };
                spawn_activity_log(&backend, &update);

                let Some(telegram) = state.telegram() else {
                    error!("Bot token missing; update not processed");
                    return ack();
                };
                let interaction = Interaction::new(&state.config, backend, telegram);
                if let Err(e) = interaction.handle(update, body).await {
                    // Telegram retries non-2xx deliveries; always acknowledge.
                    error!("Update handling failed: {:#}", e);
                }
                ack()
            }
        }
    }
    .instrument(span)
    .await
}

/// Synchronous relay: the backend's reply becomes ours.
async fn relay(state: &AppState, body: Bytes) -> Response {
    let Some(backend) = state.backend() else {
        error!("No backend configured; cannot relay update");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Bridge Error").into_response();
    };

    match backend.forward_update(body).await {
        Ok(text) if text.is_empty() => ack(),
        Ok(text) => {
            info!("Relayed update, backend replied {} bytes", text.len());
            (StatusCode::OK, text).into_response()
        }
        Err(e) => {
            error!("Relay failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Bridge Error").into_response()
        }
    }
}

/// Fire-and-forget: the caller is answered before the backend sees the update.
fn forward_in_background(state: &AppState, body: Bytes) {
    let Some(backend) = state.backend() else {
        error!("No backend configured; update dropped");
        return;
    };
    tokio::spawn(
        async move {
            match backend.forward_update(body).await {
                Ok(_) => debug!("Background forward complete"),
                Err(e) => warn!("Background forward failed: {:#}", e),
            }
        }
        .in_current_span(),
    );
}
