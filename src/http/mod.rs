//! HTTP protocol implementation.
//!
//! This module implements a small HTTP/1.x server core: one request per
//! connection, parsed incrementally under fixed memory bounds.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The per-socket state machine and the [`Handler`](connection::Handler) callback
//! - **`parser`**: Byte-at-a-time request parser that resumes across socket reads
//! - **`arena`**: Fixed-capacity storage for header names and values
//! - **`request`**: HTTP request representation, limits and parameter decoding
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Sends a buffered body or streams a file to the client
//! - **`mime`**: Content type detection from magic bytes and file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │  Receiving  │ ← Feed each read into the parser
//!        └──────┬──────┘
//!               │ Request complete
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Call the handler
//!        └──────┬───────────┘
//!               │ Some(response)      None → Closed
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← Send body or stream file
//!        └──────┬───────────┘
//!               ▼
//!            Closed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sentinel::http::response::Response;
//! use sentinel::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::new(|_req: &sentinel::http::request::Request| {
//!         Some(Response::text("Hello from Sentinel\n"))
//!     });
//!     let handle = server.run("127.0.0.1:8080").await?;
//!     handle.wait_stopped().await;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
