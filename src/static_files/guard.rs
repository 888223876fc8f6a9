//! Directory-traversal check run on a decoded request path before it is
//! mapped onto the filesystem.

#[derive(Clone, Copy, PartialEq, Eq)]
enum Segment {
    Normal,
    Separator,
    Dot,
}

fn is_separator(c: u8) -> bool {
    c == b'/' || c == b'\\'
}

/// Returns true when `path` climbs above the directory it is resolved in.
///
/// Every normal segment counts one level down and every `..` one level up;
/// `.` segments and repeated separators count nothing. Only the depth at the
/// end of the path is checked, so `a/../../b` is not reported even though it
/// passes above the root half way through.
///
/// ```
/// # use sentinel::static_files::escapes_root;
/// assert!(escapes_root("/../"));
/// assert!(!escapes_root("/docs/../index.html"));
/// ```
pub fn escapes_root(path: impl AsRef<[u8]>) -> bool {
    let mut depth: i64 = 0;
    let mut state = Segment::Normal;
    let mut first = true;

    for &c in path.as_ref() {
        match state {
            Segment::Normal => {
                if is_separator(c) {
                    state = Segment::Separator;
                } else if first && c == b'.' {
                    state = Segment::Dot;
                } else if first {
                    depth += 1;
                }
                first = false;
            }
            Segment::Separator => {
                if c == b'.' {
                    state = Segment::Dot;
                } else if !is_separator(c) {
                    depth += 1;
                    state = Segment::Normal;
                }
            }
            Segment::Dot => {
                if c == b'/' {
                    state = Segment::Separator;
                } else if c == b'.' {
                    depth -= 1;
                    state = Segment::Normal;
                } else {
                    state = Segment::Normal;
                }
            }
        }
    }

    depth < 0
}
