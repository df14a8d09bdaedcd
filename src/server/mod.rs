//! Embedded HTTP upload server.
//!
//! A minimal single-purpose HTTP/1.1 server built directly on a TCP
//! listener: it serves one static upload page, accepts streamed
//! `multipart/form-data` POSTs, publishes live per-upload progress through
//! the [`TransferHub`], and persists completed files via the [`FileStore`].
//! No HTTP framework sits underneath; framing and multipart splitting are
//! done by hand in the submodules.

mod connection;
mod error;
pub mod multipart;
pub mod pages;
pub mod request;
pub mod response;
pub mod scan;

pub use error::Error;

use crate::config::ServerConfig;
use crate::net;
use crate::state::TransferHub;
use crate::storage::FileStore;
use connection::ServerContext;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The WiFi transfer server: owns the listener lifecycle.
///
/// At most one listener is live at a time; [`start`](Self::start) tears down
/// any previous one first. Bind failures are logged and leave the server
/// stopped; the app keeps running and a later retry may succeed.
pub struct TransferServer {
    host: String,
    port: u16,
    idle_timeout_secs: u64,
    hub: Arc<TransferHub>,
    store: Arc<FileStore>,
    running: Arc<AtomicBool>,
    bound: Arc<RwLock<Option<SocketAddr>>>,
    /// Listener generation; a superseded listener task must not touch the
    /// shared flags once a newer one exists.
    epoch: Arc<AtomicU64>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    listener_task: Option<JoinHandle<()>>,
}

impl TransferServer {
    pub fn new(config: &ServerConfig, hub: Arc<TransferHub>, store: Arc<FileStore>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            idle_timeout_secs: config.idle_timeout_secs,
            hub,
            store,
            running: Arc::new(AtomicBool::new(false)),
            bound: Arc::new(RwLock::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
            shutdown_tx: None,
            listener_task: None,
        }
    }

    /// Start listening on `port`. Any previously running listener is
    /// stopped first, and its task is awaited so the old socket is closed
    /// before the new bind; restarting on the same port does not race the
    /// old accept loop for the address.
    ///
    /// Binding happens on a spawned task, so `is_running` turns true
    /// asynchronously; observe it (or [`wait_until_running`](Self::wait_until_running))
    /// rather than assuming it flipped.
    pub async fn start(&mut self, port: u16) {
        self.stop();
        if let Some(task) = self.listener_task.take() {
            let _ = task.await;
        }
        self.port = port;

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let idle_timeout = match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let token = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.listener_task = Some(tokio::spawn(run_listener(
            format!("{}:{}", self.host, port),
            idle_timeout,
            Arc::clone(&self.hub),
            Arc::clone(&self.store),
            Lifecycle {
                running: Arc::clone(&self.running),
                bound: Arc::clone(&self.bound),
                epoch: Arc::clone(&self.epoch),
                token,
            },
            shutdown_rx,
        )));
    }

    /// Stop the listener. Safe to call when already stopped. Connections
    /// already accepted are not torn down; they complete or fail on their
    /// own.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
            tracing::info!("Transfer server stop requested");
        }
        self.running.store(false, Ordering::SeqCst);
        *self.bound.write() = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Actual bound address once the listener is ready (relevant when the
    /// configured port is 0).
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound.read()
    }

    /// The URL a browser on the LAN should open, composed from the device's
    /// own IPv4 address. Falls back to a `0.0.0.0` host when no interface
    /// yields an address.
    pub fn local_url(&self) -> String {
        let port = self.bound_addr().map(|a| a.port()).unwrap_or(self.port);
        format!("http://{}:{}", advertised_host(), port)
    }

    pub fn hub(&self) -> &Arc<TransferHub> {
        &self.hub
    }

    /// Poll until the listener reports ready, up to `timeout`.
    pub async fn wait_until_running(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_running() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.is_running()
    }
}

impl Drop for TransferServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn advertised_host() -> String {
    net::primary_ipv4()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string())
}

/// Bind with local-address reuse so a quick stop/start cycle does not trip
/// over sockets in TIME_WAIT.
fn bind_reuse(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Shared lifecycle flags plus the generation token that fences a listener
/// task off from flags that a newer listener already owns.
struct Lifecycle {
    running: Arc<AtomicBool>,
    bound: Arc<RwLock<Option<SocketAddr>>>,
    epoch: Arc<AtomicU64>,
    token: u64,
}

impl Lifecycle {
    fn is_current(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) == self.token
    }

    fn mark_ready(&self, addr: SocketAddr) -> bool {
        if !self.is_current() {
            return false;
        }
        *self.bound.write() = Some(addr);
        self.running.store(true, Ordering::SeqCst);
        true
    }

    fn mark_stopped(&self) {
        if self.is_current() {
            self.running.store(false, Ordering::SeqCst);
            *self.bound.write() = None;
        }
    }
}

async fn run_listener(
    addr: String,
    idle_timeout: Option<Duration>,
    hub: Arc<TransferHub>,
    store: Arc<FileStore>,
    lifecycle: Lifecycle,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let parsed: SocketAddr = match addr.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid listen address {addr}: {e}");
            return;
        }
    };

    // Bind failures are non-fatal to the app: log and stay stopped.
    let listener = match bind_reuse(parsed) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind transfer server on {addr}: {e}");
            return;
        }
    };
    let local = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Failed to read bound address: {e}");
            return;
        }
    };

    if !lifecycle.mark_ready(local) {
        // A newer listener superseded this one before it came up.
        return;
    }
    tracing::info!("Transfer server listening on {local}");

    let ctx = Arc::new(ServerContext {
        hub,
        store,
        advertised_addr: format!("{}:{}", advertised_host(), local.port()),
        idle_timeout,
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Transfer server stopped");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "Accepted connection");
                    tokio::spawn(connection::handle(stream, peer, Arc::clone(&ctx)));
                }
                Err(e) => tracing::warn!("Accept failed: {e}"),
            }
        }
    }

    lifecycle.mark_stopped();
}
