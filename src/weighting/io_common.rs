use std::path::{Path, PathBuf};

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Column names as read from a header row: trimmed, and named after their
/// position (starting at 1) when empty.
pub fn normalize_header(cells: &[String]) -> Vec<String> {
    cells
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let name = c.trim();
            if name.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// The provider to use when none is configured.
pub fn infer_provider(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xlsm") => "excel",
        _ => "csv",
    }
}

pub fn is_stdout(dest: &str) -> bool {
    dest.is_empty() || dest == "stdout"
}

/// Relative paths are taken from the given directory. Absolute paths and
/// `stdout` are kept as is.
pub fn resolve_path(root: &Path, path: &str) -> String {
    if is_stdout(path) || Path::new(path).is_absolute() {
        return path.to_string();
    }
    let p: PathBuf = [root, Path::new(path)].iter().collect();
    p.as_path().display().to_string()
}
