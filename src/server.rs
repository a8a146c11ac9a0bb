use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use teloxide::Bot;
use tracing::info;
use url::Url;

use crate::backend::{Backend, BackendPool};
use crate::config::Config;
use crate::platform::telegram::create_bot;
use crate::{data, webhook};

/// Immutable per-process state shared by every request.
pub struct AppState {
    pub config: Config,
    pool: Option<BackendPool>,
    http: reqwest::Client,
    api_url: Url,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let pool = config.backend_pool()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let api_url = Url::parse(&config.telegram.api_url)
            .with_context(|| format!("Invalid Bot API URL: {}", config.telegram.api_url))?;
        Ok(Self {
            config,
            pool,
            http,
            api_url,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool.as_ref().map_or(0, BackendPool::len)
    }

    /// Draw a backend for this request. `None` when no URL is configured.
    pub fn backend(&self) -> Option<Backend> {
        let pool = self.pool.as_ref()?;
        Some(Backend::new(
            self.http.clone(),
            pool.pick(),
            self.config.backend.secret.clone(),
            self.config.backend.secret_transport,
        ))
    }

    /// Bot API client. `None` when no token is configured.
    pub fn telegram(&self) -> Option<Bot> {
        let token = self.config.bot_token()?;
        Some(create_bot(self.http.clone(), token, &self.api_url))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/data", get(data::handle))
        .route(
            "/api/webhook",
            get(webhook::redirect_to_dashboard).post(webhook::receive_update),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.listen.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Bridge listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{SecretTransport, WebhookMode};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use tower::ServiceExt;
    use wiremock::MockServer;

    /// State pointing both the backend and the Bot API at mock servers.
    pub fn state(
        backend: Option<&MockServer>,
        telegram: Option<&MockServer>,
        mode: WebhookMode,
    ) -> Arc<AppState> {
        let mut config = Config::default();
        if let Some(server) = backend {
            config.backend.urls = format!("{}/exec", server.uri());
        }
        config.backend.secret = Some("s3cret".to_string());
        config.backend.secret_transport = SecretTransport::Query;
        if let Some(server) = telegram {
            config.telegram.bot_token = Some("TOKEN".to_string());
            config.telegram.api_url = server.uri();
        }
        config.telegram.admin_id = Some(1000);
        config.webhook.mode = mode;
        Arc::new(AppState::new(config).unwrap())
    }

    pub async fn send(state: Arc<AppState>, request: Request<Body>) -> (Response<Body>, String) {
        let response = router(state).oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        (Response::from_parts(parts, Body::empty()), text)
    }

    /// Wait for background tasks to deliver `count` requests to the server.
    pub async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
        for _ in 0..100 {
            let requests = server.received_requests().await.unwrap();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        server.received_requests().await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookMode;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[test]
    fn test_state_without_backend_or_token() {
        let state = AppState::new(Config::default()).unwrap();
        assert_eq!(state.pool_size(), 0);
        assert!(state.backend().is_none());
        assert!(state.telegram().is_none());
    }

    #[test]
    fn test_invalid_backend_url_fails_startup() {
        let mut config = Config::default();
        config.backend.urls = "::not a url::".to_string();
        assert!(AppState::new(config).is_err());
    }

    #[test]
    fn test_invalid_bot_api_url_fails_startup() {
        let mut config = Config::default();
        config.telegram.api_url = "not a url".to_string();
        assert!(AppState::new(config).is_err());
    }

    #[test]
    fn test_bot_uses_configured_api_url() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123:abc".to_string());
        config.telegram.api_url = "http://127.0.0.1:8081".to_string();
        let state = AppState::new(config).unwrap();
        let bot = state.telegram().unwrap();
        assert_eq!(bot.token(), "123:abc");
        assert_eq!(bot.api_url().as_str(), "http://127.0.0.1:8081/");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let state = test_support::state(None, None, WebhookMode::Interactive);
        let (response, _) = test_support::send(
            state,
            Request::get("/api/unknown").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
