//! Static file resolution
//!
//! Maps a request path onto a file under the static root. Every failure
//! (missing root, broken symlink, permission error) is a plain `None`: a
//! filesystem problem must never hide the wrapped application.

use std::path::{Path, PathBuf};

/// Resolve `request_path` to a regular file strictly inside `root`.
///
/// The path is lexically normalized, its leading `/` dropped and the result
/// joined onto `root`. Both sides are then canonicalized, so `..` segments
/// and symlinks pointing outside the root are rejected.
pub fn resolve(request_path: &str, root: &Path) -> Option<PathBuf> {
    let request_path = if request_path.is_empty() {
        "/"
    } else {
        request_path
    };

    let relative = normalize_lexically(request_path);
    let candidate = root.join(relative.trim_start_matches('/'));

    let root_canonical = root.canonicalize().ok()?;
    let candidate_canonical = candidate.canonicalize().ok()?;

    if !is_within(&candidate_canonical, &root_canonical) {
        crate::logger::log_debug(&format!(
            "Static lookup escaped root: {} -> {}",
            request_path,
            candidate_canonical.display()
        ));
        return None;
    }

    let metadata = std::fs::metadata(&candidate_canonical).ok()?;
    metadata.is_file().then_some(candidate_canonical)
}

/// Containment on whole path components: `/srv/public2` is not inside
/// `/srv/public`.
fn is_within(candidate: &Path, root: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}

/// Collapse `.` and `..` segments and repeated separators without touching
/// the filesystem.
///
/// Absolute paths cannot climb above `/`; relative paths keep their leading
/// `..` segments so the containment check sees them.
pub fn normalize_lexically(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn root_with_files() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
        dir
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically("/a/./b/../c"), "/a/c");
        assert_eq!(normalize_lexically("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_lexically("../../etc/passwd"), "../../etc/passwd");
        assert_eq!(normalize_lexically("a/../.."), "..");
        assert_eq!(normalize_lexically("//a//b/"), "/a/b");
        assert_eq!(normalize_lexically("/"), "/");
        assert_eq!(normalize_lexically("."), ".");
    }

    #[test]
    fn test_resolves_file_in_root() {
        let root = root_with_files();
        let found = resolve("/style.css", root.path()).unwrap();
        assert!(found.ends_with("style.css"));

        let nested = resolve("/assets/app.js", root.path()).unwrap();
        assert!(nested.ends_with("assets/app.js"));
    }

    #[test]
    fn test_rejects_traversal() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("public");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "nope").unwrap();

        assert!(resolve("../secret.txt", &root).is_none());
        assert!(resolve("/../secret.txt", &root).is_none());
        assert!(resolve("../../etc/passwd", &root).is_none());
        assert!(resolve("/assets/../../secret.txt", &root).is_none());
    }

    #[test]
    fn test_rejects_directories_and_missing() {
        let root = root_with_files();
        assert!(resolve("/", root.path()).is_none());
        assert!(resolve("", root.path()).is_none());
        assert!(resolve("/assets", root.path()).is_none());
        assert!(resolve("/missing.png", root.path()).is_none());
    }

    #[test]
    fn test_missing_root_is_no_match() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve("/style.css", &dir.path().join("absent")).is_none());
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_outside() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("public");
        let sibling = outer.path().join("public2");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&sibling).unwrap();
        fs::write(sibling.join("x.txt"), "x").unwrap();

        assert!(resolve("../public2/x.txt", &root).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("public");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "nope").unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();

        assert!(resolve("/link.txt", &root).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_accepts_symlink_inside_root() {
        let root = root_with_files();
        std::os::unix::fs::symlink(
            root.path().join("style.css"),
            root.path().join("alias.css"),
        )
        .unwrap();

        assert!(resolve("/alias.css", root.path()).is_some());
    }
}
