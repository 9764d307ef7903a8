//! HTTP API server for the avatar gateway

pub mod chat;
pub mod health;
pub mod rate_limit;
pub mod session;
pub mod token;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::avatar::{StartAvatarRequest, TokenIssuer};
use crate::gate::GateStatus;
use crate::llm::TextGenerator;
use crate::session::SessionLifecycle;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<SessionLifecycle>,
    /// Request used by `POST /api/session/start`
    pub avatar_request: StartAvatarRequest,
    pub token_issuer: Arc<dyn TokenIssuer>,
    /// Backs `POST /api/chat`; `None` when no model key is configured
    pub chat: Option<Arc<dyn TextGenerator>>,
    pub gate: watch::Receiver<GateStatus>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    session: Arc<SessionLifecycle>,
    token_issuer: Arc<dyn TokenIssuer>,
    port: u16,
    avatar_request: StartAvatarRequest,
    chat: Option<Arc<dyn TextGenerator>>,
    gate: Option<watch::Receiver<GateStatus>>,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(session: Arc<SessionLifecycle>, token_issuer: Arc<dyn TokenIssuer>, port: u16) -> Self {
        Self {
            session,
            token_issuer,
            port,
            avatar_request: StartAvatarRequest::default(),
            chat: None,
            gate: None,
            rate_limit_per_minute: None,
        }
    }

    /// Set the session request used by the start endpoint
    #[must_use]
    pub fn avatar_request(mut self, request: StartAvatarRequest) -> Self {
        self.avatar_request = request;
        self
    }

    /// Serve `POST /api/chat` with this generator
    #[must_use]
    pub fn chat(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.chat = Some(generator);
        self
    }

    /// Report gate state from this channel
    #[must_use]
    pub fn gate(mut self, gate: watch::Receiver<GateStatus>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Limit `/api/*` to this many requests per minute
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let gate = self.gate.unwrap_or_else(|| {
            let (_, rx) = watch::channel(GateStatus::Disabled);
            rx
        });

        let state = Arc::new(ApiState {
            session: self.session,
            avatar_request: self.avatar_request,
            token_issuer: self.token_issuer,
            chat: self.chat,
            gate,
            rate_limiter: self.rate_limit_per_minute.map(rate_limit::create_limiter),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(token::router(self.state.clone()))
            .merge(chat::router(self.state.clone()))
            .merge(session::router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ));

        // CORS layer for cross-origin requests from the browser bridge
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .nest("/api", api)
            .merge(health::router())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.rate_limiter.is_some() {
            tracing::info!("rate limiting active on /api");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
