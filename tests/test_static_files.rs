use std::path::{Path, PathBuf};

use sentinel::http::response::Payload;
use sentinel::static_files::serve_from_request_path;

fn document_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("sentinel-static-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("docs")).unwrap();
    std::fs::create_dir_all(root.join("site")).unwrap();
    std::fs::write(root.join("hello.txt"), "hello").unwrap();
    std::fs::write(root.join("docs").join("a b.txt"), "spaced").unwrap();
    std::fs::write(root.join("docs").join("<tag>.txt"), "tagged").unwrap();
    std::fs::write(root.join("site").join("index.html"), "<h1>home</h1>").unwrap();
    root
}

fn body_text(response: &sentinel::http::response::Response) -> String {
    response.body().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_regular_file() {
    let root = document_root("regular");
    let response = serve_from_request_path("/hello.txt", "/hello.txt", &root, true).await;

    assert_eq!(response.code, 200);
    assert_eq!(response.file_path(), Some(root.join("hello.txt").as_path()));
}

#[tokio::test]
async fn test_traversal_is_forbidden() {
    let root = document_root("traversal");
    let response = serve_from_request_path("/../", "/../", &root, true).await;

    assert_eq!(response.code, 403);
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let root = document_root("missing");
    let response = serve_from_request_path("/nothing.txt", "/nothing.txt", &root, true).await;

    assert_eq!(response.code, 404);
    assert!(body_text(&response).contains("/nothing.txt"));
}

#[tokio::test]
async fn test_directory_serves_index() {
    let root = document_root("index");
    let response = serve_from_request_path("/site/", "/site/", &root, true).await;

    assert_eq!(response.code, 200);
    assert_eq!(
        response.file_path(),
        Some(root.join("site").join("index.html").as_path())
    );
}

#[tokio::test]
async fn test_directory_listing() {
    let root = document_root("listing");
    let response = serve_from_request_path("/docs", "/docs", &root, true).await;

    assert_eq!(response.code, 200);
    assert_eq!(response.content_type.as_deref(), Some("text/html; charset=UTF-8"));
    let html = body_text(&response);
    assert!(html.contains("<a href=\"/docs/a+b.txt\">a&nbsp;b.txt</a><br>"));
    assert!(html.contains("<a href=\"/docs/%3Ctag%3E.txt\">&lt;tag&gt;.txt</a><br>"));
}

#[tokio::test]
async fn test_listing_link_keeps_trailing_slash() {
    let root = document_root("slash");
    let response = serve_from_request_path("/docs/", "/docs/", &root, true).await;

    assert!(body_text(&response).contains("href=\"/docs/a+b.txt\""));
}

#[tokio::test]
async fn test_directory_listing_disabled() {
    let root = document_root("disabled");
    let response = serve_from_request_path("/docs", "/docs", &root, false).await;

    assert_eq!(response.code, 403);
    // the index is not consulted either
    let response = serve_from_request_path("/site", "/site", &root, false).await;
    assert_eq!(response.code, 403);
}

#[tokio::test]
async fn test_root_directory() {
    let root = document_root("root");
    let response = serve_from_request_path("/", "/", &root, true).await;

    let html = body_text(&response);
    assert!(html.contains("hello.txt"));
    assert!(html.contains("docs"));
    assert!(matches!(response.payload, Payload::Body(_)));
}

#[tokio::test]
async fn test_decoded_path_is_used_for_lookup() {
    let root = document_root("decoded");
    let response = serve_from_request_path("/docs/a%20b.txt", "/docs/a b.txt", &root, true).await;

    assert_eq!(response.code, 200);
    assert_eq!(
        response.file_path(),
        Some(Path::new(&root.join("docs").join("a b.txt")))
    );
}
