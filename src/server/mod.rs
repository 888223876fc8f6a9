//! Listening, the accept loop and graceful shutdown.
//!
//! [`Server::run`] binds, spawns the accept loop and hands back a
//! [`ServerHandle`]. Every accepted socket gets its own task.
//! [`ServerHandle::stop`] refuses new connections, waits until every in-flight
//! connection has finished and only then returns.

pub mod listener;
mod shutdown;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::sync::MutexGuard;
use tracing::info;

use crate::config::Config;
use crate::http::connection::{DEFAULT_SCRATCH_SIZE, Handler};
use crate::http::request::RequestLimits;
use crate::stats::Counters;
use listener::ConnectionSettings;
use shutdown::Shutdown;

/// A server that has not started listening yet.
pub struct Server<H> {
    handler: Arc<H>,
    counters: Arc<Counters>,
    settings: ConnectionSettings,
}

impl<H: Handler> Server<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            counters: Arc::new(Counters::new()),
            settings: ConnectionSettings {
                limits: RequestLimits::default(),
                scratch_size: DEFAULT_SCRATCH_SIZE,
            },
        }
    }

    /// Applies the limits section of `cfg`.
    pub fn from_config(handler: H, cfg: &Config) -> Self {
        Self::new(handler)
            .with_limits(cfg.limits.request_limits())
            .with_scratch_size(cfg.limits.scratch_size)
    }

    /// Shares `counters` with this server instead of a private set.
    pub fn with_counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.settings.limits = limits;
        self
    }

    pub fn with_scratch_size(mut self, scratch_size: usize) -> Self {
        self.settings.scratch_size = scratch_size;
        self
    }

    /// Binds `addr` (e.g. `127.0.0.1:8080`) and starts accepting.
    pub async fn run(self, addr: &str) -> anyhow::Result<ServerHandle> {
        let listener = listener::bind(addr).await?;
        self.start(listener)
    }

    /// Binds `port` on all IPv4 interfaces and starts accepting.
    pub async fn run_all_interfaces(self, port: u16) -> anyhow::Result<ServerHandle> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = listener::bind_addr(addr)?;
        self.start(listener)
    }

    fn start(self, listener: tokio::net::TcpListener) -> anyhow::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let shutdown = Arc::new(Shutdown::new());
        tokio::spawn(listener::accept_loop(
            listener,
            Arc::clone(&shutdown),
            self.handler,
            Arc::clone(&self.counters),
            self.settings,
        ));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            counters: self.counters,
        })
    }
}

/// Control over a running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<Shutdown>,
    counters: Arc<Counters>,
}

impl ServerHandle {
    /// The bound address, with the actual port when port 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn active_connections(&self) -> usize {
        self.shutdown.active_connections()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_stopped()
    }

    /// Takes the server-wide mutex the accept loop admits connections under.
    /// The server cannot be stopped while the guard is held.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.shutdown.lock().await
    }

    /// Stops accepting and waits for every in-flight connection to finish.
    ///
    /// No connection is accepted once this is called. Calling it again, or
    /// after the accept loop failed on its own, just waits for the stop.
    pub async fn stop(&self) {
        info!(active = self.active_connections(), "stopping server");
        self.shutdown.request_stop().await;
        self.shutdown.wait_stopped().await;
    }

    /// Waits until the server has stopped, without requesting it.
    pub async fn wait_stopped(&self) {
        self.shutdown.wait_stopped().await;
    }
}

/// Starts serving `handler` on `addr` with default limits.
pub async fn serve<H: Handler>(addr: &str, handler: H) -> anyhow::Result<ServerHandle> {
    Server::new(handler).run(addr).await
}
