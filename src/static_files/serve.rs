use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::buffer::GrowableBuffer;
use crate::http::response::{Response, escape_html};
use crate::static_files::guard::escapes_root;

/// Maps a request onto a file below `root`.
///
/// `decoded_path` is checked for traversal before anything touches the
/// filesystem (403). A missing path gives 404 and any other lookup failure
/// 500. A directory serves its `index.html` when present, otherwise a
/// generated listing, or 403 when `list_directories` is off.
pub async fn serve_from_request_path(
    request_path: &str,
    decoded_path: &str,
    root: &Path,
    list_directories: bool,
) -> Response {
    if escapes_root(decoded_path) {
        warn!(path = %decoded_path, "request path escapes the document root");
        return Response::forbidden_html();
    }

    let file_path = resolve(root, decoded_path);
    let metadata = match tokio::fs::metadata(&file_path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %file_path.display(), "not found");
            return Response::not_found_html(Some(decoded_path));
        }
        Err(e) => {
            warn!(path = %file_path.display(), error = %e, "cannot stat path");
            return Response::internal_error_html(Some(
                "Information about the path could not be determined for your request",
            ));
        }
    };

    if !metadata.is_dir() {
        return Response::file(file_path);
    }

    if !list_directories {
        debug!(path = %file_path.display(), "directory listing disabled");
        return Response::forbidden_html();
    }

    let index = file_path.join("index.html");
    match tokio::fs::metadata(&index).await {
        Ok(metadata) if !metadata.is_dir() => return Response::file(index),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %index.display(), error = %e, "cannot stat index file");
            return Response::internal_error_html(Some(
                "Information about the path could not be determined for your request",
            ));
        }
    }

    match directory_listing(&file_path, request_path).await {
        Ok(body) => Response::html(body),
        Err(e) => {
            warn!(path = %file_path.display(), error = %e, "cannot read directory");
            Response::internal_error_html(Some("We could not open the directory for iterating"))
        }
    }
}

fn resolve(root: &Path, decoded_path: &str) -> PathBuf {
    let relative = decoded_path
        .trim_start_matches(['/', '\\'])
        .trim_end_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

async fn directory_listing(dir: &Path, request_path: &str) -> io::Result<GrowableBuffer> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let slash = if request_path.ends_with('/') { "" } else { "/" };
    let base = escape_html(request_path);

    let mut body = GrowableBuffer::from("<html><head><title>Directory Reading</title></head><body>\n");
    for name in &names {
        let href: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        body.append_fmt(format_args!(
            "<a href=\"{base}{slash}{href}\">{}</a><br>\n",
            escape_html(name)
        ));
    }
    body.append_str("</body></html>");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_stays_below_root() {
        let root = Path::new("/srv/www");
        assert_eq!(resolve(root, "/"), PathBuf::from("/srv/www"));
        assert_eq!(resolve(root, "/docs/"), PathBuf::from("/srv/www/docs"));
        assert_eq!(resolve(root, "//a.txt"), PathBuf::from("/srv/www/a.txt"));
    }
}
