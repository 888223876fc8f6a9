use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info, warn};

use crate::http::connection::{Connection, Handler};
use crate::http::request::RequestLimits;
use crate::server::shutdown::Shutdown;
use crate::stats::Counters;

const BACKLOG: u32 = 1024;

/// Resolves `addr` and binds a listening socket with `SO_REUSEADDR` set.
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let resolved = tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("cannot resolve listen address {addr}"))?
        .next()
        .with_context(|| format!("listen address {addr} resolved to nothing"))?;
    bind_addr(resolved).with_context(|| format!("cannot listen on {addr}"))
}

pub fn bind_addr(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}

/// Settings every accepted connection is created with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionSettings {
    pub(crate) limits: RequestLimits,
    pub(crate) scratch_size: usize,
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
    )
}

/// Accepts connections until stop is requested or accepting fails for good,
/// then drops the listener, waits for in-flight connections to finish and
/// marks the server stopped.
pub(crate) async fn accept_loop<H: Handler>(
    listener: TcpListener,
    shutdown: Arc<Shutdown>,
    handler: Arc<H>,
    counters: Arc<Counters>,
    settings: ConnectionSettings,
) {
    let mut stop = shutdown.stop_signal();

    loop {
        if *stop.borrow_and_update() {
            break;
        }

        let accepted = tokio::select! {
            _ = stop.changed() => continue,
            res = listener.accept() => res,
        };

        let (socket, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) if is_transient(&e) => {
                warn!(error = %e, "accept failed, retrying");
                continue;
            }
            Err(e) => {
                error!(error = %e, "accept failed, shutting down");
                shutdown.request_stop().await;
                break;
            }
        };

        let Some(guard) = shutdown.admit().await else {
            debug!(%peer, "stop issued, dropping connection");
            break;
        };

        counters.connection_opened();
        info!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        let counters = Arc::clone(&counters);
        tokio::spawn(async move {
            // declared first so it drops after `conn` has settled the counters
            let _guard = guard;
            let mut conn = Connection::new(
                socket,
                peer,
                handler,
                counters,
                settings.limits,
                settings.scratch_size,
            );
            if let Err(e) = conn.run().await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }

    drop(listener);
    debug!("listener closed, draining connections");
    shutdown.wait_drained().await;
    shutdown.mark_stopped();
    info!("server stopped");
}
