//! HTTP Bridge Server
//!
//! Loopback listener that turns `POST /` bodies into [`BpmReading`]s.
//! `start`/`stop` are serialized by one lock and are both idempotent.

use crate::domain::error::BridgeError;
use crate::domain::models::{BpmReading, WebServerState};
use crate::domain::settings::Settings;
use crate::infrastructure::http::routes::{self, Ingest};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the BPM event stream before slow listeners start lagging.
const BPM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct HttpBridgeConfig {
    /// Loopback port; 0 picks a free one.
    pub port: u16,
    pub start_timeout: Duration,
    pub grace_period: Duration,
    pub stop_timeout: Duration,
}

impl Default for HttpBridgeConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for HttpBridgeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            port: settings.http_port,
            start_timeout: Duration::from_millis(settings.http_start_timeout_ms),
            grace_period: Duration::from_millis(settings.http_grace_period_ms),
            stop_timeout: Duration::from_millis(settings.http_stop_timeout_ms),
        }
    }
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct HttpBridgeServer {
    config: HttpBridgeConfig,
    state: watch::Sender<WebServerState>,
    bpm_tx: broadcast::Sender<BpmReading>,
    sequence: Arc<AtomicU64>,
    lifecycle: Mutex<Option<RunningServer>>,
}

impl HttpBridgeServer {
    pub fn new(config: HttpBridgeConfig) -> Self {
        let (bpm_tx, _) = broadcast::channel(BPM_CHANNEL_CAPACITY);
        Self {
            config,
            state: watch::channel(WebServerState::default()).0,
            bpm_tx,
            sequence: Arc::new(AtomicU64::new(0)),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> watch::Receiver<WebServerState> {
        self.state.subscribe()
    }

    pub fn bpm_stream(&self) -> broadcast::Receiver<BpmReading> {
        self.bpm_tx.subscribe()
    }

    /// Address actually bound, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// URL of the ingestion endpoint, while running.
    pub async fn endpoint(&self) -> Option<String> {
        self.local_addr()
            .await
            .map(|addr| format!("http://{}/", addr))
    }

    fn publish(&self, next: WebServerState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!("Web server state: {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    /// Bind and serve. No-op when already running; failures land in
    /// [`WebServerState::error`].
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!("Web server already running");
            return;
        }

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        info!("Starting web server on {}", addr);

        let listener =
            match tokio::time::timeout(self.config.start_timeout, TcpListener::bind(addr)).await {
                Ok(Ok(listener)) => listener,
                Ok(Err(e)) => {
                    error!("Failed to bind {}: {}", addr, e);
                    self.publish(WebServerState::failed(BridgeError::WebServerBindFailure(
                        e.to_string(),
                    )));
                    return;
                }
                Err(_) => {
                    error!(
                        "Web server did not start within {:?}",
                        self.config.start_timeout
                    );
                    self.publish(WebServerState::failed(BridgeError::WebServerBindFailure(
                        format!("start timed out after {:?}", self.config.start_timeout),
                    )));
                    return;
                }
            };

        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                error!("Bound listener has no address: {}", e);
                self.publish(WebServerState::failed(BridgeError::WebServerBindFailure(
                    e.to_string(),
                )));
                return;
            }
        };

        let app = routes::router(Ingest::new(self.bpm_tx.clone(), self.sequence.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("Web server failed: {}", e);
            }
            debug!("Web server task finished");
        });

        *lifecycle = Some(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        });
        info!("Web server listening on {}", local_addr);
        self.publish(WebServerState::ready());
    }

    /// Graceful shutdown bounded by the grace period, then a hard stop at the
    /// stop timeout. `is_ready` only drops once the listener is gone.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            debug!("Web server not running");
            // Clears a failed start.
            self.publish(WebServerState::default());
            return;
        };

        info!("Stopping web server on {}", running.local_addr);
        let _ = running.shutdown.send(());
        let mut task = running.task;

        if tokio::time::timeout(self.config.grace_period, &mut task)
            .await
            .is_err()
        {
            warn!(
                "Web server still draining after {:?}",
                self.config.grace_period
            );
            let remaining = self.config.stop_timeout.saturating_sub(self.config.grace_period);
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                warn!("Web server did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }

        self.publish(WebServerState::default());
        info!("Web server stopped");
    }
}

impl Drop for HttpBridgeServer {
    fn drop(&mut self) {
        if let Some(running) = self.lifecycle.get_mut().take() {
            running.task.abort();
        }
    }
}
