use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::buffer::GrowableBuffer;
use crate::http::request::{Request, RequestLimits};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::stats::Counters;

/// Size of the per-connection receive and file-streaming buffer.
pub const DEFAULT_SCRATCH_SIZE: usize = 16 * 1024;

/// Application callback invoked once per fully parsed request.
///
/// Returning `None` means the handler used [`Client::stream_mut`] to answer
/// on its own; the server then only closes the connection.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        request: &Request,
        client: &mut Client,
    ) -> impl Future<Output = Option<Response>> + Send;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
{
    fn handle(
        &self,
        request: &Request,
        _client: &mut Client,
    ) -> impl Future<Output = Option<Response>> + Send {
        std::future::ready(self(request))
    }
}

/// The accepted socket plus what is known about the peer.
#[derive(Debug)]
pub struct Client {
    stream: TcpStream,
    peer: SocketAddr,
    bytes_sent: u64,
    bytes_received: u64,
}

impl Client {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn remote_host(&self) -> String {
        self.peer.ip().to_string()
    }

    pub fn remote_port(&self) -> u16 {
        self.peer.port()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Raw socket access for handlers that write their own response.
    /// Bytes written here are not counted.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Describes the connection and `request` in a human-readable block.
    pub fn debug_report(&self, request: &Request) -> GrowableBuffer {
        let mut report = GrowableBuffer::new();
        report.append_fmt(format_args!(
            "Connection {} (host {} port {})\n",
            self.peer,
            self.remote_host(),
            self.remote_port()
        ));
        report.append_fmt(format_args!(
            "  bytes sent {} received {}\n",
            self.bytes_sent, self.bytes_received
        ));
        report.append_fmt(format_args!(
            "  method '{}' path '{}' decoded '{}' version '{}'\n",
            request.method(),
            request.path(),
            request.path_decoded(),
            request.version()
        ));
        report.append_fmt(format_args!(
            "  state {:?}, header arena {} of {} bytes\n",
            request.state(),
            request.header_arena_used(),
            request.limits().header_arena_size
        ));
        report.append_fmt(format_args!("  {} headers\n", request.header_count()));
        for (name, value) in request.headers() {
            report.append_fmt(format_args!("    '{name}' = '{value}'\n"));
        }
        report.append_fmt(format_args!(
            "  body ({} bytes): '{}'\n",
            request.body().len(),
            String::from_utf8_lossy(request.body())
        ));

        let w = request.warnings();
        report.append_fmt(format_args!(
            "  warnings: arena exhausted {}, too many headers {}, method truncated {}, \
             path truncated {}, version truncated {}, body truncated {}\n",
            w.header_arena_exhausted,
            w.too_many_headers,
            w.method_truncated,
            w.path_truncated,
            w.version_truncated,
            w.body_truncated
        ));
        report
    }
}

pub enum ConnectionState {
    Receiving,
    Processing,
    Dispatching(Response),
    Closed,
}

/// Drives one accepted socket through a single request and response.
pub struct Connection<H> {
    client: Client,
    request: Request,
    scratch: BytesMut,
    state: ConnectionState,
    handler: Arc<H>,
    counters: Arc<Counters>,
}

impl<H: Handler> Connection<H> {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        handler: Arc<H>,
        counters: Arc<Counters>,
        limits: RequestLimits,
        scratch_size: usize,
    ) -> Self {
        let mut request = Request::new(limits);
        request.set_body_observer(counters.clone());
        Self {
            client: Client::new(stream, peer),
            request,
            scratch: BytesMut::with_capacity(scratch_size.max(1)),
            state: ConnectionState::Receiving,
            handler,
            counters,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;
        let _ = self.client.stream.shutdown().await;
        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Receiving => {
                    self.scratch.clear();
                    let n = self.client.stream.read_buf(&mut self.scratch).await?;
                    if n == 0 {
                        debug!(peer = %self.client.peer, state = ?self.request.state(), "peer closed before request was complete");
                        continue;
                    }

                    self.client.bytes_received += n as u64;
                    self.request.parse(&self.scratch[..n]);
                    self.state = if self.request.is_done() {
                        ConnectionState::Processing
                    } else {
                        ConnectionState::Receiving
                    };
                }

                ConnectionState::Processing => {
                    let warnings = self.request.warnings();
                    if warnings.any() {
                        warn!(peer = %self.client.peer, path = %self.request.path(), ?warnings, "request exceeded a limit");
                    }
                    debug!(
                        peer = %self.client.peer,
                        method = %self.request.method(),
                        path = %self.request.path(),
                        "request parsed"
                    );

                    match self.handler.handle(&self.request, &mut self.client).await {
                        Some(response) => self.state = ConnectionState::Dispatching(response),
                        None => debug!(peer = %self.client.peer, "handler took over the connection"),
                    }
                }

                ConnectionState::Dispatching(response) => {
                    let path = self.request.path_decoded().into_owned();
                    let mut writer = ResponseWriter::new(&mut self.client.stream, &mut self.scratch);
                    let result = writer.send(&response, &path).await;
                    self.client.bytes_sent += writer.written();
                    result.with_context(|| format!("sending response for {path}"))?;
                }

                ConnectionState::Closed => break,
            }
        }

        Ok(())
    }
}

// Runs on unwind too, so a panicking handler still releases its active slot.
impl<H> Drop for Connection<H> {
    fn drop(&mut self) {
        self.counters
            .connection_closed(self.client.bytes_sent, self.client.bytes_received);
    }
}
