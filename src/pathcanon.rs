//! Path canonicalizer: resolves a local path to an absolute form unless
//! the caller asked to keep it as given (`--keep-path`), and recognizes the
//! non-path tokens (`"-"` for stdin, a URL) that should never be touched.

use std::path::{Path, PathBuf};

/// Canonicalize `input` to an absolute path, unless:
/// - it is the literal stdin token `"-"`,
/// - it looks like a URL (`scheme://`),
/// - `keep_path` was requested,
/// - or canonicalization fails (the path may not exist yet, or may be on a
///   filesystem that does not support it) — in which case the original
///   string is kept.
pub fn canonicalize(input: &str, keep_path: bool) -> String {
    if input == "-" || looks_like_url(input) || keep_path {
        return input.to_string();
    }
    match std::fs::canonicalize(Path::new(input)) {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => input.to_string(),
    }
}

fn looks_like_url(input: &str) -> bool {
    input
        .split_once("://")
        .map(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// Split a possibly-versioned path (`<base>#<n>`) apart, returning
/// `(base, Some(n))` or `(path, None)`.
pub fn split_version_suffix(path: &str) -> (&str, Option<&str>) {
    match path.rfind('#') {
        Some(pos) => {
            let suffix = &path[pos + 1..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                (&path[..pos], Some(suffix))
            } else {
                (path, None)
            }
        }
        None => (path, None),
    }
}

#[allow(dead_code)]
pub(crate) fn as_path_buf(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_token_untouched() {
        assert_eq!(canonicalize("-", false), "-");
    }

    #[test]
    fn url_untouched() {
        assert_eq!(canonicalize("https://example.org/a.mseed", false), "https://example.org/a.mseed");
    }

    #[test]
    fn keep_path_honored() {
        assert_eq!(canonicalize("relative/path.mseed", true), "relative/path.mseed");
    }

    #[test]
    fn version_suffix_split() {
        assert_eq!(split_version_suffix("/a/b.dat#2"), ("/a/b.dat", Some("2")));
        assert_eq!(split_version_suffix("/a/b.dat"), ("/a/b.dat", None));
    }
}
