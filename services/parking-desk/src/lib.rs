//! Parking Desk - operator client for a parking-lot backend
//!
//! Keeps a reconciled view of parking records and spaces in sync with the
//! backend's push channel, polls a camera for plate recognition, and exposes
//! entry/exit/delete/fee actions through a CLI and a local dashboard.

pub mod actions;
pub mod api;
pub mod capture;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod io;
pub mod messages;
pub mod poller;
pub mod recognition;
pub mod socketio;
pub mod state;
pub mod sync;
pub mod table;
pub mod transport;
pub mod types;
pub mod view;

pub use config::{load_config, Config};
pub use error::{DeskError, Result};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actions::Dispatcher;
use crate::api::BackendApi;
use crate::capture::{build_frame_source, FrameSource};
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::poller::Poller;
use crate::recognition::{HttpRecognizer, Recognizer};
use crate::state::StateHandle;
use crate::sync::SyncClient;
use crate::transport::{ConnectionFactory, WebSocketConnectionFactory};

/// Builder for a [`Desk`].
///
/// Production transports are used unless replaced with the `with_*` methods.
pub struct DeskBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    connection_factory: Option<Arc<dyn ConnectionFactory>>,
    frame_source: Option<Arc<dyn FrameSource>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    cancel: Option<CancellationToken>,
}

impl DeskBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            connection_factory: None,
            frame_source: None,
            recognizer: None,
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connection_factory = Some(factory);
        self
    }

    pub fn with_frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<Desk> {
        let config = self.config;
        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(
                config.backend.request_timeout_seconds,
            ))?),
        };

        let state = state::new_state_handle(config.dashboard.notice_history_size);
        let api = Arc::new(BackendApi::new(&config.backend, Arc::clone(&http)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&api), Arc::clone(&state)));

        let sync = if config.sync.enabled {
            let base = config
                .sync
                .channel_url
                .clone()
                .unwrap_or_else(|| config.backend.base().to_string());
            let factory: Arc<dyn ConnectionFactory> = match self.connection_factory {
                Some(factory) => factory,
                None => Arc::new(WebSocketConnectionFactory::new()),
            };
            Some(Arc::new(SyncClient::new(
                socketio::endpoint_url(&base),
                config.sync.clone(),
                factory,
                Arc::clone(&state),
            )))
        } else {
            None
        };

        let poller = if config.recognition.enabled {
            let source = match (self.frame_source, &config.recognition.capture) {
                (Some(source), _) => Some(source),
                (None, Some(capture)) => Some(build_frame_source(capture, Arc::clone(&http))),
                (None, None) => None,
            };
            match source {
                Some(source) => {
                    let recognizer: Arc<dyn Recognizer> = match self.recognizer {
                        Some(recognizer) => recognizer,
                        None => {
                            let endpoint = &config.recognition.endpoint;
                            let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                                endpoint.clone()
                            } else {
                                api.url(endpoint)
                            };
                            Arc::new(HttpRecognizer::new(url, config.recognition.upload, Arc::clone(&http)))
                        }
                    };
                    Some(Arc::new(Poller::new(
                        source,
                        recognizer,
                        Arc::clone(&state),
                        Duration::from_millis(config.recognition.interval_ms),
                    )))
                }
                None => {
                    tracing::warn!("Recognition enabled but no capture source configured");
                    None
                }
            }
        } else {
            None
        };

        Ok(Desk {
            config,
            state,
            dispatcher,
            sync,
            poller,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// A configured desk: shared state plus the background tasks that feed it
pub struct Desk {
    config: Config,
    state: StateHandle,
    dispatcher: Arc<Dispatcher>,
    sync: Option<Arc<SyncClient>>,
    poller: Option<Arc<Poller>>,
    cancel: CancellationToken,
}

impl Desk {
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn sync_client(&self) -> Option<Arc<SyncClient>> {
        self.sync.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load the initial tables, start the background tasks and run until cancelled
    pub async fn start(self) -> Result<()> {
        self.dispatcher.reload_records().await;
        self.dispatcher.reload_spaces().await;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        if let Some(sync) = &self.sync {
            let sync = Arc::clone(sync);
            let cancel = self.cancel.clone();
            tracing::info!("Push channel at {}", sync.url());
            tasks.push(tokio::spawn(async move {
                if let Err(e) = sync.run(cancel).await {
                    tracing::warn!("Push channel stopped: {}", e);
                }
            }));
        }

        if let Some(poller) = &self.poller {
            let poller = Arc::clone(poller);
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                // open failures are already logged by the poller
                let _ = poller.run(cancel).await;
            }));
        }

        if self.config.dashboard.enabled {
            let dashboard_port = self.config.dashboard.port;
            let router = dashboard::build_router(Arc::clone(&self.dispatcher));
            let cancel_for_dashboard = self.cancel.clone();

            tasks.push(tokio::spawn(async move {
                let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(
                            "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                            dashboard_port,
                            e
                        );
                        return;
                    }
                };
                tracing::info!("Dashboard listening on http://{}", addr);

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        cancel_for_dashboard.cancelled().await;
                    })
                    .await
                    .ok();

                tracing::debug!("Dashboard stopped");
            }));
        }

        tracing::info!("Parking desk started");
        self.cancel.cancelled().await;

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background task ended abnormally: {}", e);
            }
        }
        tracing::info!("Parking desk stopped");

        Ok(())
    }
}
