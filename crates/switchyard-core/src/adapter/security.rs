//! Checks that run before any backend process is spawned for real work.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("working directory {} is outside workspace {}", working.display(), workspace.display())]
    PathEscape { working: PathBuf, workspace: PathBuf },
    #[error("could not resolve {}: {reason}", path.display())]
    Unresolvable { path: PathBuf, reason: String },
    #[error("prompt contains NUL bytes")]
    NulByte,
    #[error("prompt contains ANSI escape sequences")]
    AnsiEscape,
}

/// Resolve `path` to an absolute path.
///
/// Existing paths are canonicalized so symlinks cannot be used to escape;
/// paths that do not exist yet are made absolute and normalized lexically.
pub fn resolve_path(path: &Path) -> Result<PathBuf, SecurityError> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    let absolute = std::path::absolute(path).map_err(|e| SecurityError::Unresolvable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Require `working_dir` to equal or be contained in `workspace_dir`.
///
/// Containment is component-wise, so `/ws-other` is not inside `/ws`.
pub fn ensure_contained(working_dir: &Path, workspace_dir: &Path) -> Result<(), SecurityError> {
    let working = resolve_path(working_dir)?;
    let workspace = resolve_path(workspace_dir)?;
    if working.starts_with(&workspace) {
        Ok(())
    } else {
        Err(SecurityError::PathEscape { working, workspace })
    }
}

/// Reject prompt text that could smuggle control sequences to the backend.
pub fn validate_prompt(prompt: &str) -> Result<(), SecurityError> {
    if prompt.contains('\0') {
        return Err(SecurityError::NulByte);
    }
    // Any ESC starts a terminal sequence (CSI, OSC, `ESC c`, `ESC 7`, ...);
    // U+009B is the single-character C1 form of CSI.
    if prompt.contains(['\u{1b}', '\u{9b}']) {
        return Err(SecurityError::AnsiEscape);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_directory_is_contained() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_contained(tmp.path(), tmp.path()).unwrap();
    }

    #[test]
    fn subdirectory_is_contained() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("a/b");
        std::fs::create_dir_all(&sub).unwrap();
        ensure_contained(&sub, tmp.path()).unwrap();
    }

    #[test]
    fn parent_traversal_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("ws");
        std::fs::create_dir_all(&ws).unwrap();
        let escape = ws.join("..").join("..");
        let err = ensure_contained(&escape, &ws).unwrap_err();
        assert!(matches!(err, SecurityError::PathEscape { .. }));
        assert!(err.to_string().contains("outside workspace"));
    }

    #[test]
    fn sibling_with_common_prefix_is_not_contained() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("ws");
        let sibling = tmp.path().join("ws-other");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        assert!(ensure_contained(&sibling, &ws).is_err());
    }

    #[test]
    fn nonexistent_paths_are_normalized_lexically() {
        let ws = Path::new("/switchyard-no-such-root/ws");
        assert!(ensure_contained(&ws.join("x/../y"), ws).is_ok());
        assert!(ensure_contained(&ws.join("../../etc"), ws).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_workspace_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("ws");
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        let link = ws.join("link");
        std::os::unix::fs::symlink(&outside, &link).unwrap();
        assert!(ensure_contained(&link, &ws).is_err());
    }

    #[test]
    fn prompt_checks() {
        assert!(validate_prompt("plain text, unicode ok: café").is_ok());
        assert_eq!(validate_prompt("a\0b"), Err(SecurityError::NulByte));
        assert_eq!(
            validate_prompt("red \u{1b}[31mtext"),
            Err(SecurityError::AnsiEscape)
        );
        assert_eq!(
            validate_prompt("title \u{1b}]0;pwned\u{7}"),
            Err(SecurityError::AnsiEscape)
        );
    }

    #[test]
    fn every_escape_form_is_rejected() {
        for prompt in [
            "reset \u{1b}c",
            "save \u{1b}7 restore \u{1b}8",
            "charset \u{1b}(0",
            "c1 csi \u{9b}31m",
            "trailing \u{1b}",
        ] {
            assert_eq!(
                validate_prompt(prompt),
                Err(SecurityError::AnsiEscape),
                "prompt: {prompt:?}"
            );
        }
    }
}
