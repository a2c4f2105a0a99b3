//! `@file` list-file loader: expands a positional argument prefixed with
//! `@` into the paths listed inside it, one per line.

use std::fs;
use std::io;
use std::path::Path;

/// If `arg` starts with `@`, read the named file and return its non-blank,
/// non-comment lines as input paths. Otherwise return `arg` unchanged as
/// the sole entry.
pub fn expand_argument(arg: &str) -> io::Result<Vec<String>> {
    match arg.strip_prefix('@') {
        Some(list_path) => load_list_file(Path::new(list_path)),
        None => Ok(vec![arg.to_string()]),
    }
}

fn load_list_file(path: &Path) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Expand a full positional-argument list, preserving order.
pub fn expand_all(args: &[String]) -> io::Result<Vec<String>> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(expand_argument(arg)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn plain_path_passes_through() {
        assert_eq!(expand_argument("foo.mseed").unwrap(), vec!["foo.mseed".to_string()]);
    }

    #[test]
    fn list_file_expands_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a.mseed").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "b.mseed").unwrap();
        let arg = format!("@{}", file.path().display());
        let expanded = expand_argument(&arg).unwrap();
        assert_eq!(expanded, vec!["a.mseed".to_string(), "b.mseed".to_string()]);
    }
}
