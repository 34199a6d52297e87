//! LearningProxyServer struct and lifecycle state machine.
//!
//! The server moves through `Stopped -> Starting -> Running -> Stopping ->
//! Stopped`; `restart` is a stop followed by a start. Lifecycle events are
//! published on the injected bus: `server-started` only once the listening
//! socket is bound, `server-stopped` only once it has closed.

use super::client::{create_http_client, HttpClient};
use super::handler::{handle_request, ProxyContext};
use crate::config::Config;
use crate::events::{EventBus, ServerEvent, ServerStartedEvent, ServerStoppedEvent};
use crate::recording::RecordingService;
use chrono::Utc;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Lifecycle state of the proxy server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Default)]
struct Lifecycle {
    state: Option<ServerState>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

/// The learning-mode reverse proxy: forwards all traffic to the target host
/// and records every completed exchange.
pub struct LearningProxyServer {
    project: String,
    bind_address: String,
    port: u16,
    ctx: Arc<ProxyContext>,
    events: Arc<EventBus>,
    lifecycle: Mutex<Lifecycle>,
}

impl LearningProxyServer {
    /// Wire a proxy server from configuration and its collaborators.
    pub fn new(
        config: &Config,
        recorder: Arc<RecordingService>,
        events: Arc<EventBus>,
    ) -> Result<Self, anyhow::Error> {
        let target_uri: hyper::Uri = config.target.url.parse()?;
        let authority = target_uri
            .authority()
            .ok_or_else(|| anyhow::anyhow!("target url '{}' has no host", config.target.url))?;
        let scheme = target_uri.scheme_str().unwrap_or("http");
        let target_origin = format!("{scheme}://{authority}");
        let target_host = authority.to_string();

        let http_client: HttpClient = create_http_client(&config.connection_pool);

        let ctx = Arc::new(ProxyContext {
            http_client,
            target_origin,
            target_host,
            project: config.project.clone(),
            recorder,
            events: Arc::clone(&events),
        });

        Ok(Self {
            project: config.project.clone(),
            bind_address: config.listen.bind_address.clone(),
            port: config.listen.port,
            ctx,
            events,
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServerState {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle.state.unwrap_or(ServerState::Stopped)
    }

    /// Address the listening socket is bound to, when running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.local_addr
    }

    /// Bind the listening socket, enter the accept loop, and publish
    /// `server-started`. Returns the bound address (relevant when the
    /// configured port is 0).
    pub async fn start(&self) -> Result<SocketAddr, anyhow::Error> {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(
            lifecycle.state,
            Some(ServerState::Starting) | Some(ServerState::Running)
        ) {
            anyhow::bail!("proxy server for project '{}' is already running", self.project);
        }
        lifecycle.state = Some(ServerState::Starting);

        let listener = match TcpListener::bind((self.bind_address.as_str(), self.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                lifecycle.state = Some(ServerState::Stopped);
                return Err(anyhow::anyhow!(
                    "failed to bind {}:{}: {e}",
                    self.bind_address,
                    self.port
                ));
            }
        };
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let ctx = Arc::clone(&self.ctx);
        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, remote_addr)) => {
                                let ctx = Arc::clone(&ctx);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let ctx = Arc::clone(&ctx);
                                        async move { handle_request(ctx, req).await }
                                    });
                                    if let Err(err) =
                                        http1::Builder::new().serve_connection(io, service).await
                                    {
                                        debug!(
                                            "Error serving connection from {}: {}",
                                            remote_addr, err
                                        );
                                    }
                                });
                            }
                            Err(e) => error!("Accept error: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        // Dropping the listener closes the socket; in-flight
                        // connections already accepted keep running.
                        break;
                    }
                }
            }
        });

        lifecycle.shutdown_tx = Some(shutdown_tx);
        lifecycle.accept_task = Some(accept_task);
        lifecycle.local_addr = Some(addr);
        lifecycle.state = Some(ServerState::Running);

        info!(
            project = %self.project,
            "Learning proxy listening on http://{} -> {}",
            addr,
            self.ctx.target_origin
        );
        self.events.publish(&ServerEvent::Started(ServerStartedEvent {
            timestamp: Utc::now(),
            port: addr.port(),
            bind_address: self.bind_address.clone(),
            project: self.project.clone(),
        }));

        Ok(addr)
    }

    /// Close the listening socket and publish `server-stopped`. Calling stop
    /// on a server that is not running is a no-op.
    pub async fn stop(&self) -> Result<(), anyhow::Error> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(lifecycle.state, Some(ServerState::Running)) {
            return Ok(());
        }
        lifecycle.state = Some(ServerState::Stopping);

        if let Some(shutdown_tx) = lifecycle.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(accept_task) = lifecycle.accept_task.take() {
            // Resolves once the accept loop exits and the socket is closed.
            if let Err(e) = accept_task.await {
                error!("Accept loop terminated abnormally: {}", e);
            }
        }

        lifecycle.local_addr = None;
        lifecycle.state = Some(ServerState::Stopped);

        info!(project = %self.project, "Learning proxy stopped");
        self.events.publish(&ServerEvent::Stopped(ServerStoppedEvent {
            timestamp: Utc::now(),
            project: self.project.clone(),
        }));

        Ok(())
    }

    /// Stop, then start again; the new `server-started` event carries a later
    /// timestamp than the previous one.
    pub async fn restart(&self) -> Result<SocketAddr, anyhow::Error> {
        self.stop().await?;
        self.start().await
    }
}
