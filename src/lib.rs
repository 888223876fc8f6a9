//! Sentinel - Embeddable Web Server
//!
//! Core library for serving HTTP requests from inside a host application:
//! incremental request parsing under fixed memory bounds, buffered or
//! file-streamed responses, static files and a drain-before-stop shutdown.

pub mod buffer;
pub mod config;
pub mod http;
pub mod server;
pub mod static_files;
pub mod stats;
