//! Incremental HTTP request parser.
//!
//! [`parse_request`] consumes whatever a single socket read returned and may be
//! called again with the next fragment; a token split across any number of
//! fragments ends up exactly as if it had arrived in one piece. The parser
//! never rejects input. Every fixed bound (method, path and version length,
//! header count, header arena, body size) truncates and sets a flag in
//! [`Warnings`](crate::http::request::Warnings) instead.
//!
//! ```text
//! Method -> Path -> Version -> CR -> CRLF -> CRLFCR -> [Body] -> Done
//!                              ^      |
//!                              |      v
//!                              +-- HeaderName -> HeaderValue
//!                              +--------------------+
//! ```

use crate::http::request::{
    Header, METHOD_MAX_LENGTH, PATH_MAX_LENGTH, Request, VERSION_MAX_LENGTH,
};

/// Parser position.
///
/// Header lines cycle through `HeaderName`, `HeaderValue`, `CR` and `CRLF`.
/// When a line-ending state sees a byte it does not expect, that byte is the
/// start of the next header name and is replayed in `HeaderName` rather than
/// consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseState {
    Method,
    Path,
    Version,
    HeaderName,
    HeaderValue,
    CR,
    CRLF,
    CRLFCR,
    Body,
    Done,
}

/// Feeds one fragment of the byte stream into `request`.
pub fn parse_request(request: &mut Request, fragment: &[u8]) {
    let mut i = 0;
    while i < fragment.len() {
        let c = fragment[i];
        match request.state {
            ParseState::Method => {
                if c == b' ' {
                    request.state = ParseState::Path;
                } else if request.method.len() < METHOD_MAX_LENGTH {
                    request.method.push(c);
                } else {
                    request.warnings.method_truncated = true;
                }
            }
            ParseState::Path => {
                if c == b' ' {
                    request.path_decoded = decode_path(&request.path);
                    request.state = ParseState::Version;
                } else if request.path.len() < PATH_MAX_LENGTH {
                    request.path.push(c);
                } else {
                    request.warnings.path_truncated = true;
                }
            }
            ParseState::Version => {
                if c == b'\r' {
                    request.state = ParseState::CR;
                } else if request.version.len() < VERSION_MAX_LENGTH {
                    request.version.push(c);
                } else {
                    request.warnings.version_truncated = true;
                }
            }
            ParseState::HeaderName => match c {
                b':' => {
                    request.state = ParseState::HeaderValue;
                    request.pending.skip_space = true;
                }
                b'\r' => {
                    // a header line without a value is dropped
                    request.pending = Default::default();
                    request.state = ParseState::CR;
                }
                _ => push_header_byte(request, HeaderPart::Name, c),
            },
            ParseState::HeaderValue => {
                let skip = std::mem::take(&mut request.pending.skip_space);
                if c == b'\r' {
                    commit_header(request);
                    request.state = ParseState::CR;
                } else if !(skip && c == b' ') {
                    push_header_byte(request, HeaderPart::Value, c);
                }
            }
            ParseState::CR => {
                if c == b'\n' {
                    request.state = ParseState::CRLF;
                } else {
                    // line ended with a bare CR; this byte starts the next header
                    request.state = ParseState::HeaderName;
                    continue;
                }
            }
            ParseState::CRLF => {
                if c == b'\r' {
                    request.state = ParseState::CRLFCR;
                } else {
                    // first byte of a header name; replay it in that state
                    request.state = ParseState::HeaderName;
                    continue;
                }
            }
            ParseState::CRLFCR => {
                if c == b'\n' {
                    finish_headers(request);
                } else {
                    request.state = ParseState::HeaderName;
                    continue;
                }
            }
            ParseState::Body => {
                let wanted = request.body_expected - request.body.len();
                let available = &fragment[i..];
                let take = wanted.min(available.len());
                request.body.append(&available[..take]);
                i += take;
                if request.body.len() == request.body_expected {
                    if request.body_clamped {
                        request.warnings.body_truncated = true;
                    }
                    request.state = ParseState::Done;
                }
                continue;
            }
            ParseState::Done => {
                request.warnings.body_truncated = true;
                return;
            }
        }
        i += 1;
    }
}

#[derive(Clone, Copy)]
enum HeaderPart {
    Name,
    Value,
}

fn push_header_byte(request: &mut Request, part: HeaderPart, c: u8) {
    if request.headers.len() >= request.limits.max_headers {
        request.warnings.too_many_headers = true;
        return;
    }

    let slot = match part {
        HeaderPart::Name => &mut request.pending.name,
        HeaderPart::Value => &mut request.pending.value,
    };
    if slot.is_none() {
        *slot = request.arena.start();
    }
    let pushed = match slot.as_mut() {
        Some(s) => request.arena.push(s, c),
        None => false,
    };
    if !pushed {
        request.warnings.header_arena_exhausted = true;
    }
}

fn commit_header(request: &mut Request) {
    let pending = std::mem::take(&mut request.pending);
    if request.headers.len() >= request.limits.max_headers {
        return;
    }
    if let (Some(name), Some(value)) = (pending.name, pending.value) {
        if !value.is_empty() {
            request.headers.push(Header { name, value });
        }
    }
}

fn finish_headers(request: &mut Request) {
    let announced = request
        .header_bytes("Content-Length")
        .and_then(parse_content_length);

    let Some(announced) = announced else {
        request.state = ParseState::Done;
        return;
    };

    let max = request.limits.max_body_length;
    let length = clamp_content_length(announced, max);
    if length == 0 {
        request.state = ParseState::Done;
        return;
    }

    request.body_expected = length;
    request.body_clamped = usize::try_from(announced).map_or(true, |len| len > max);
    request.body.reserve_exact(length);
    request.state = ParseState::Body;
}

/// Parses a `Content-Length` value leniently: optional leading whitespace and
/// sign, then digits up to the first non-digit.
///
/// Returns `None` when no digits are present. Values too large for `i64`
/// saturate.
pub fn parse_content_length(value: &[u8]) -> Option<i64> {
    let mut rest = value.trim_ascii_start();
    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let magnitude = rest[..digits].iter().fold(0i64, |acc, &d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Clamps a parsed `Content-Length` into `0..=max`.
pub fn clamp_content_length(length: i64, max: usize) -> usize {
    if length <= 0 {
        return 0;
    }
    usize::try_from(length).map_or(max, |len| len.min(max))
}

/// Decodes a raw request target: `+` becomes a space and `%XX` the escaped
/// byte. Malformed escapes are dropped. Output is bounded like the raw path.
pub fn decode_path(raw: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(raw.len().min(PATH_MAX_LENGTH));
    let mut i = 0;
    while i < raw.len() && decoded.len() < PATH_MAX_LENGTH {
        match raw[i] {
            b'+' => decoded.push(b' '),
            b'%' => {
                let hi = raw.get(i + 1).copied().and_then(hex_value);
                let lo = raw.get(i + 2).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    decoded.push((hi << 4) | lo);
                }
                i += 3;
                continue;
            }
            c => decoded.push(c),
        }
        i += 1;
    }
    decoded
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_parses_leniently() {
        assert_eq!(parse_content_length(b"42"), Some(42));
        assert_eq!(parse_content_length(b"  7"), Some(7));
        assert_eq!(parse_content_length(b"-5"), Some(-5));
        assert_eq!(parse_content_length(b"12abc"), Some(12));
        assert_eq!(parse_content_length(b"abc"), None);
        assert_eq!(parse_content_length(b""), None);
        assert_eq!(
            parse_content_length(b"99999999999999999999999"),
            Some(i64::MAX)
        );
    }

    #[test]
    fn content_length_is_clamped() {
        assert_eq!(clamp_content_length(-5, 100), 0);
        assert_eq!(clamp_content_length(50, 100), 50);
        assert_eq!(clamp_content_length(999_999_999_999, 100), 100);
    }

    #[test]
    fn path_decoding() {
        assert_eq!(decode_path(b"/a%20b+c"), b"/a b c");
        assert_eq!(decode_path(b"/%2e%2E/x"), b"/../x");
        assert_eq!(decode_path(b"/bad%zzescape"), b"/badescape");
        assert_eq!(decode_path(b"/trailing%2"), b"/trailing");
    }
}
