//! Route prefix normalization and stripping
//!
//! A service mounted under `/svc` sees its requests as if it owned the whole
//! namespace: `/svc/items` becomes `/items` and `/svc` is appended to the
//! routing root (`SCRIPT_NAME` / `root_path`) reported to the application.

/// Normalized route prefix. Empty means stripping is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePrefix(String);

/// Result of stripping the prefix from one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub path: String,
    /// The prefix that was removed, empty when the path did not match
    pub matched: String,
}

impl Stripped {
    pub fn is_match(&self) -> bool {
        !self.matched.is_empty()
    }
}

impl RoutePrefix {
    /// Build the process-wide prefix from configuration.
    ///
    /// Returns a disabled prefix unless `enabled` is set.
    pub fn from_config(raw: Option<&str>, enabled: bool) -> Self {
        if enabled {
            Self(normalize(raw.unwrap_or_default()))
        } else {
            Self::default()
        }
    }

    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_enabled(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn strip(&self, path: &str) -> Stripped {
        strip(path, &self.0)
    }
}

/// Canonicalize a configured prefix: leading `/`, no trailing `/`, and `""`
/// for blank input or a bare `/`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let prefixed = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if prefixed == "/" {
        return String::new();
    }
    prefixed.trim_end_matches('/').to_string()
}

/// Strip `prefix` from `path`.
///
/// The path is coerced to start with `/` first. A match is either the exact
/// prefix or the prefix followed by `/`; `/apiv2` never matches `/api`.
pub fn strip(path: &str, prefix: &str) -> Stripped {
    let path = if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    match remainder(path.as_bytes(), prefix.as_bytes()) {
        // The split point is an ASCII '/', so the remainder is valid UTF-8
        Some(rest) => Stripped {
            path: String::from_utf8_lossy(rest).into_owned(),
            matched: prefix.to_string(),
        },
        None => Stripped {
            path,
            matched: String::new(),
        },
    }
}

/// Byte-level counterpart of [`strip`] for the undecoded request path.
///
/// Bytes outside the prefix are kept exactly as received, including invalid
/// UTF-8 and percent escapes.
pub fn strip_raw(raw: &[u8], prefix: &str) -> Vec<u8> {
    let raw = if raw.is_empty() {
        b"/".to_vec()
    } else if raw.starts_with(b"/") {
        raw.to_vec()
    } else {
        [b"/".as_slice(), raw].concat()
    };

    match remainder(&raw, prefix.as_bytes()) {
        Some(rest) => rest.to_vec(),
        None => raw,
    }
}

/// Remainder of `path` after `prefix`, or `None` when it does not match
fn remainder<'a>(path: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if prefix.is_empty() {
        return None;
    }
    if path == prefix {
        return Some(b"/");
    }
    match path.strip_prefix(prefix) {
        Some(rest) if rest.starts_with(b"/") => Some(rest),
        _ => None,
    }
}

/// Append a matched prefix to an upstream routing root.
///
/// A root of `""` or `/` counts as empty; a trailing `/` is dropped before
/// appending so `/base/` + `/svc` gives `/base/svc`.
pub fn extend_root(existing: &str, matched: &str) -> String {
    let base = if existing.is_empty() || existing == "/" {
        ""
    } else {
        existing.trim_end_matches('/')
    };
    format!("{base}{matched}")
}
