//! Content type detection for streamed files.
//!
//! Magic bytes win over the file extension, the extension wins over the
//! plain-text heuristic, and anything else is served as binary.

/// How many leading bytes of a file are inspected.
pub const SNIFF_LENGTH: usize = 100;

const PNG_MAGIC: &[u8] = &[137, 80, 78, 71, 13, 10, 26, 10];
const GIF_MAGIC: &[u8] = b"GIF";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];

const EXTENSIONS: &[(&str, &str)] = &[
    ("html", "text/html; charset=UTF-8"),
    ("htm", "text/html; charset=UTF-8"),
    ("css", "text/css"),
    ("gz", "application/x-gzip"),
    ("js", "application/javascript"),
];

/// Guesses the content type of `filename` from its first bytes.
pub fn from_file(filename: &str, contents: &[u8]) -> &'static str {
    if contents.starts_with(PNG_MAGIC) {
        return "image/png";
    }
    if contents.starts_with(GIF_MAGIC) {
        return "image/gif";
    }
    if contents.starts_with(JPEG_MAGIC) {
        return "image/jpeg";
    }

    if let Some((_, mime)) = EXTENSIONS.iter().find(|(ext, _)| filename.ends_with(ext)) {
        return *mime;
    }

    let head = &contents[..contents.len().min(SNIFF_LENGTH)];
    if head.is_ascii() {
        return "text/plain";
    }

    "application/binary"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_beat_extension() {
        let png = [137, 80, 78, 71, 13, 10, 26, 10, 0, 0];
        assert_eq!(from_file("logo.html", &png), "image/png");
        assert_eq!(from_file("anim.txt", b"GIF89a"), "image/gif");
        assert_eq!(from_file("photo", &[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
    }

    #[test]
    fn extension_beats_plaintext() {
        assert_eq!(from_file("index.html", b"<html>"), "text/html; charset=UTF-8");
        assert_eq!(from_file("site.css", b"body {}"), "text/css");
        assert_eq!(from_file("app.js", b"let x;"), "application/javascript");
        assert_eq!(from_file("a.tar.gz", &[0x1f, 0x8b]), "application/x-gzip");
    }

    #[test]
    fn fallbacks() {
        assert_eq!(from_file("README", b"hello world\n"), "text/plain");
        assert_eq!(from_file("blob.bin", &[0x00, 0xC3, 0x28]), "application/binary");
        assert_eq!(from_file("empty", b""), "text/plain");
    }
}
