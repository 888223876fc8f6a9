use std::fmt;
use std::io::{self, SeekFrom};
use std::path::Path;

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

use crate::http::mime::{self, SNIFF_LENGTH};
use crate::http::response::{Payload, Response};

const HTTP_VERSION: &str = "HTTP/1.0";

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = concat!("sentinel/", env!("CARGO_PKG_VERSION"));

/// Why a response could not be delivered. Every variant ends the connection.
#[derive(Debug)]
pub enum DispatchError {
    /// The response had neither a body nor a file.
    EmptyResponse,
    HeaderWrite(io::Error),
    BodyWrite(io::Error),
    /// Reading the file failed after its header was already sent.
    StreamAborted(io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::EmptyResponse => write!(f, "response has neither a body nor a file"),
            DispatchError::HeaderWrite(e) => write!(f, "failed to send response header: {e}"),
            DispatchError::BodyWrite(e) => write!(f, "failed to send response body: {e}"),
            DispatchError::StreamAborted(e) => write!(f, "file stream aborted: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::EmptyResponse => None,
            DispatchError::HeaderWrite(e)
            | DispatchError::BodyWrite(e)
            | DispatchError::StreamAborted(e) => Some(e),
        }
    }
}

/// Renders the status line and header block, blank line included.
pub fn serialize_header(response: &Response, content_type: &str, content_length: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);

    let status_line = format!("{} {} {}\r\n", HTTP_VERSION, response.code, response.status);
    buf.extend_from_slice(status_line.as_bytes());

    let fixed = format!(
        "Content-Type: {content_type}\r\nContent-Length: {content_length}\r\n"
    );
    buf.extend_from_slice(fixed.as_bytes());

    for (k, v) in &response.headers {
        push_header_text(&mut buf, k);
        buf.extend_from_slice(b": ");
        push_header_text(&mut buf, v);
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"Server: ");
    buf.extend_from_slice(SERVER_NAME.as_bytes());
    buf.extend_from_slice(b"\r\n\r\n");

    buf
}

/// Copies handler-supplied header text without its CR and LF bytes.
fn push_header_text(buf: &mut Vec<u8>, text: &str) {
    buf.extend(text.bytes().filter(|b| !matches!(b, b'\r' | b'\n')));
}

/// Sends one response over a stream, reusing a scratch buffer for files.
pub struct ResponseWriter<'a, W> {
    stream: &'a mut W,
    scratch: &'a mut BytesMut,
    written: u64,
}

impl<'a, W> ResponseWriter<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(stream: &'a mut W, scratch: &'a mut BytesMut) -> Self {
        Self {
            stream,
            scratch,
            written: 0,
        }
    }

    /// Bytes delivered so far, including those sent before a failure.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sends `response`. `request_path` names the resource in a substituted
    /// 404 page when a file response cannot be opened.
    pub async fn send(&mut self, response: &Response, request_path: &str) -> Result<(), DispatchError> {
        match &response.payload {
            Payload::Body(body) if !body.is_empty() => {
                let content_type = response.content_type.as_deref().unwrap_or("text/plain");
                self.send_body(response, content_type, body.as_bytes()).await
            }
            Payload::File(path) => self.send_file(response, path, request_path).await,
            Payload::Body(_) => {
                error!(code = response.code, "response has neither a body nor a file");
                Err(DispatchError::EmptyResponse)
            }
        }
    }

    async fn send_body(&mut self, response: &Response, content_type: &str, body: &[u8]) -> Result<(), DispatchError> {
        let header = serialize_header(response, content_type, body.len() as u64);
        self.write(&header).await.map_err(DispatchError::HeaderWrite)?;
        self.write(body).await.map_err(DispatchError::BodyWrite)?;
        debug!(status = response.code, bytes = self.written, "response sent");
        Ok(())
    }

    async fn send_substitute(&mut self, substitute: Response) -> Result<(), DispatchError> {
        let content_type = substitute.content_type.as_deref().unwrap_or("text/plain");
        let body = substitute.body().map(|b| b.as_bytes()).unwrap_or_default();
        self.send_body(&substitute, content_type, body).await
    }

    async fn send_file(&mut self, response: &Response, path: &Path, request_path: &str) -> Result<(), DispatchError> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open file, sending 404");
                return self.send_substitute(Response::not_found_html(Some(request_path))).await;
            }
        };

        let (content_type, length) = match Self::inspect(&mut file, response, path).await {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read file, sending 500");
                return self
                    .send_substitute(Response::internal_error_html(Some("The file could not be read.")))
                    .await;
            }
        };

        let header = serialize_header(response, &content_type, length);
        self.write(&header).await.map_err(DispatchError::HeaderWrite)?;

        loop {
            self.scratch.clear();
            let n = file
                .read_buf(&mut *self.scratch)
                .await
                .map_err(DispatchError::StreamAborted)?;
            if n == 0 {
                break;
            }
            self.stream
                .write_all(&self.scratch[..n])
                .await
                .map_err(DispatchError::BodyWrite)?;
            self.written += n as u64;
        }

        debug!(status = response.code, path = %path.display(), bytes = self.written, "file sent");
        Ok(())
    }

    /// Works out the content type from the first bytes and the length by
    /// seeking to the end, leaving the file rewound.
    async fn inspect(file: &mut File, response: &Response, path: &Path) -> io::Result<(String, u64)> {
        let mut head = [0u8; SNIFF_LENGTH];
        let mut filled = 0;
        while filled < head.len() {
            let n = file.read(&mut head[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let content_type = match &response.content_type {
            Some(explicit) => explicit.clone(),
            None => {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                mime::from_file(&name, &head[..filled]).to_string()
            }
        };

        let length = file.seek(SeekFrom::End(0)).await?;
        file.seek(SeekFrom::Start(0)).await?;
        Ok((content_type, length))
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}
