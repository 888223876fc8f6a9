//! Serving files from a document root.

mod guard;
mod serve;

use std::path::PathBuf;

use crate::config::StaticFilesConfig;
use crate::http::connection::{Client, Handler};
use crate::http::request::Request;
use crate::http::response::Response;

pub use crate::http::response::escape_html;
pub use guard::escapes_root;
pub use serve::serve_from_request_path;

/// A [`Handler`] answering every request from a document root.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    list_directories: bool,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, list_directories: bool) -> Self {
        Self {
            root: root.into(),
            list_directories,
        }
    }

    pub fn from_config(cfg: &StaticFilesConfig) -> Self {
        Self::new(cfg.root.clone(), cfg.list_directories)
    }
}

impl Handler for StaticFiles {
    async fn handle(&self, request: &Request, _client: &mut Client) -> Option<Response> {
        let response = serve_from_request_path(
            &request.path(),
            &request.path_decoded(),
            &self.root,
            self.list_directories,
        )
        .await;
        Some(response)
    }
}
