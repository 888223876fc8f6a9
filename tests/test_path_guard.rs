use sentinel::static_files::escapes_root;

#[test]
fn test_traversal_is_detected() {
    for path in ["../", "/..", "/../", "./..", "dir1/dir2/../../../"] {
        assert!(escapes_root(path), "{path} should escape");
    }
}

#[test]
fn test_paths_inside_root_are_allowed() {
    for path in ["dir1", "dir1/dir2", "dir1/dir2/.", "dir1/dir2/../.", "dir1/dir2/../../."] {
        assert!(!escapes_root(path), "{path} should not escape");
    }
}

#[test]
fn test_request_paths() {
    assert!(!escapes_root("/index.html"));
    assert!(!escapes_root("/css/../index.html"));
    assert!(!escapes_root("/.hidden"));
    assert!(escapes_root("/css/../../"));
}

#[test]
fn test_only_final_depth_is_checked() {
    // climbs above the root half way, then comes back down
    assert!(!escapes_root("a/../../b"));
    assert!(escapes_root("a/../.."));
}

#[test]
fn test_accepts_bytes() {
    assert!(escapes_root(b"/..".as_slice()));
    assert!(!escapes_root(b"/ok".as_slice()));
}
