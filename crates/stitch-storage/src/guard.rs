//! Filename guard applied to every caller-supplied name.

use stitch_models::STAGED_SUFFIX;

use crate::error::{StorageError, StorageResult};

/// Longest name accepted from a caller.
pub const MAX_NAME_LEN: usize = 255;

/// Check that `name` refers to a file directly inside the staging directory.
///
/// Rejects traversal (`..`), absolute prefixes (`/`, `\`, `C:`), any path
/// separator, NUL bytes and empty or oversized names.
pub fn validate_name(name: &str) -> StorageResult<&str> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(StorageError::invalid_name("name is empty or too long"));
    }
    if name.contains('\0') {
        return Err(StorageError::invalid_name("name contains NUL"));
    }
    if name.contains("..") {
        return Err(StorageError::invalid_name("name contains '..'"));
    }
    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(StorageError::invalid_name("name is absolute"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(StorageError::invalid_name("name contains a path separator"));
    }
    Ok(name)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Reduce a client-supplied filename to a safe cosmetic suffix.
///
/// Keeps only the final path component and the characters `[A-Za-z0-9._-]`.
/// Leading dots are dropped so the result never forms `..` on its own, and a
/// trailing staged marker is rewritten so a published input never reads as
/// staged.
pub fn sanitize_original_name(original: &str) -> String {
    let last = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    // Collapse runs of dots so a cleaned name can never contain ".."
    let mut out = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }

    let out = out.trim_start_matches('.');
    if out.is_empty() {
        return "file".to_string();
    }

    let out: String = out.chars().take(100).collect();
    match out.strip_suffix(STAGED_SUFFIX) {
        Some(stem) => format!("{stem}_tmp"),
        None => out,
    }
}
