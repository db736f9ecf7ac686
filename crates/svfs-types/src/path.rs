//! Lexical helpers for virtual paths.
//!
//! Virtual paths always use `/` as separator. Nothing here touches the host
//! filesystem: `resolve` never consults the working directory, so a
//! relative base yields a relative result.

/// Returns true for `C:\...`, `c:/...` and bare `C:` drive paths.
pub fn is_windows_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Rewrite a path into canonical forward-slash form: the drive prefix is
/// dropped and every backslash becomes `/`.
pub fn unixify_path(path: &str) -> String {
    let rest = if is_windows_path(path) { &path[2..] } else { path };
    let converted = rest.replace('\\', "/");
    if converted.is_empty() {
        "/".to_string()
    } else {
        converted
    }
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || is_windows_path(path)
}

/// True when the last character is a path separator.
pub fn has_trailing_separator(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Collapse `.`/`..` segments and duplicate separators.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&"..") | None if !absolute => stack.push(".."),
                Some(_) => {
                    stack.pop();
                }
                None => {}
            },
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolve `request` against `base`. An absolute request ignores the base.
pub fn resolve(base: &str, request: &str) -> String {
    if is_absolute(request) || base.is_empty() {
        normalize(request)
    } else {
        normalize(&format!("{base}/{request}"))
    }
}

/// Parent of a virtual path: `/a/b` → `/a`, `/a` → `/`, `a` → `.`.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { "/" } else { "." };
    }
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}
