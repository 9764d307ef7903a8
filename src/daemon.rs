//! Daemon - the main gateway service
//!
//! Wires the camera gate to session auto-start and runs the HTTP API until
//! interrupted.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiServerBuilder;
use crate::avatar::{HeyGenClient, HttpTokenIssuer, StartAvatarRequest, TokenIssuer};
use crate::config::GateConfig;
use crate::gate::{self, GateStatus, GateWatcher, SnapshotFileSource};
use crate::llm::{self, TextGenerator};
use crate::session::SessionLifecycle;
use crate::{Config, Error, Result};

/// The avatar gateway daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the text generator cannot be built or the API server
    /// fails
    pub async fn run(self) -> Result<()> {
        let Config {
            avatar: avatar_request,
            service,
            llm: llm_config,
            gate: gate_config,
            server,
        } = self.config;

        tracing::info!(
            port = server.port,
            avatar = %avatar_request.avatar_name,
            gate = gate_config.enabled,
            "daemon running"
        );

        let heygen = Arc::new(HeyGenClient::new(service.base_url, service.api_key));
        let tokens: Arc<dyn TokenIssuer> = match service.token_url {
            Some(url) => {
                tracing::info!(url = %url, "using external token endpoint");
                Arc::new(HttpTokenIssuer::new(url))
            }
            None => Arc::clone(&heygen) as Arc<dyn TokenIssuer>,
        };

        let generator = llm::build_generator(&llm_config)?;
        tracing::info!(
            generator = generator.name(),
            forward_history = llm_config.forward_history,
            "text generator ready"
        );

        // The chat endpoint always talks to the model directly
        let chat: Option<Arc<dyn TextGenerator>> = match llm::build_direct(&llm_config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "chat endpoint disabled");
                None
            }
        };

        let lifecycle = Arc::new(SessionLifecycle::new(
            Arc::clone(&tokens),
            heygen,
            generator,
            llm_config.forward_history,
        ));

        let initial = if gate_config.enabled {
            GateStatus::Waiting
        } else {
            GateStatus::Disabled
        };
        let (gate_tx, gate_rx) = watch::channel(initial);

        let mut api_builder = ApiServerBuilder::new(Arc::clone(&lifecycle), tokens, server.port)
            .avatar_request(avatar_request.clone())
            .gate(gate_rx)
            .rate_limit(server.rate_limit_per_minute);
        if let Some(chat) = chat {
            api_builder = api_builder.chat(chat);
        }
        let mut api_handle = api_builder.build().spawn();
        tracing::info!(port = server.port, "API server started");

        let cancel = CancellationToken::new();
        let starter = tokio::spawn(auto_start(
            gate_config,
            gate_tx,
            Arc::clone(&lifecycle),
            avatar_request,
            cancel.clone(),
        ));

        let outcome = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
                Ok(())
            }
            joined = &mut api_handle => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
        };

        shutdown(&cancel, &lifecycle, starter).await;
        api_handle.abort();

        tracing::info!("daemon stopped");
        outcome
    }
}

/// Stop the gate, any session start in flight, and the live session
async fn shutdown(
    cancel: &CancellationToken,
    lifecycle: &SessionLifecycle,
    starter: JoinHandle<()>,
) {
    cancel.cancel();
    // Cancels a start in flight; its remote session is closed by `start`
    lifecycle.stop().await;
    if let Err(e) = starter.await {
        tracing::warn!(error = %e, "auto-start task failed");
    }
    // A start that began after the first stop
    lifecycle.stop().await;
}

/// Start the session once the gate admits it, unless shut down first
async fn auto_start(
    gate_config: GateConfig,
    gate_status: watch::Sender<GateStatus>,
    lifecycle: Arc<SessionLifecycle>,
    request: StartAvatarRequest,
    cancel: CancellationToken,
) {
    if !wait_for_gate(&gate_config, &gate_status, cancel.child_token()).await
        || cancel.is_cancelled()
    {
        return;
    }
    if let Err(e) = lifecycle.start(&request).await {
        tracing::warn!(error = %e, "automatic session start failed");
    }
}

/// Wait until the gate admits a session
///
/// Returns true immediately when the gate is disabled, false if the gate
/// cannot run or is cancelled.
async fn wait_for_gate(
    config: &GateConfig,
    status: &watch::Sender<GateStatus>,
    cancel: CancellationToken,
) -> bool {
    if !config.enabled {
        return true;
    }

    let references = match gate::load_references(&config.reference_images) {
        Ok(references) => references,
        Err(e) => {
            tracing::error!(error = %e, "gate cannot run, session will not auto-start");
            return false;
        }
    };

    let source = match SnapshotFileSource::acquire(&config.frame_path) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "camera unavailable, session will not auto-start");
            return false;
        }
    };

    match GateWatcher::new(source, references).spawn(cancel).await {
        Ok(opened) => {
            status.send_replace(GateStatus::from(&opened));
            true
        }
        Err(_) => false,
    }
}
