//! Bounded listing of the files in an agent's workspace.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// List files under `root` as `/`-separated relative paths.
///
/// Walks at most `max_depth` levels (root entries are level 1), stops after
/// `max_files` files, and skips hidden entries plus build/dependency
/// directories. Entries are visited in name order so the listing is stable.
/// A missing or unreadable directory yields an empty (or partial) list.
pub fn list_workspace_files(root: &Path, max_files: usize, max_depth: usize) -> Vec<String> {
    let mut files = Vec::new();
    walk(root, "", 1, max_files, max_depth, &mut files);
    files
}

fn walk(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_files: usize,
    max_depth: usize,
    files: &mut Vec<String>,
) {
    if depth > max_depth || files.len() >= max_files {
        return;
    }
    let mut entries: Vec<fs::DirEntry> = match fs::read_dir(dir) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list directory");
            return;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if files.len() >= max_files {
            return;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let relative = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        };
        if file_type.is_dir() {
            if !SKIPPED_DIRS.contains(&&*name) {
                walk(&entry.path(), &relative, depth + 1, max_files, max_depth, files);
            }
        } else {
            files.push(relative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn lists_sorted_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.rs");
        touch(tmp.path(), "a.rs");
        touch(tmp.path(), "src/lib.rs");
        assert_eq!(
            list_workspace_files(tmp.path(), 100, 3),
            vec!["a.rs", "b.rs", "src/lib.rs"]
        );
    }

    #[test]
    fn skips_hidden_and_build_directories() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), ".git/config");
        touch(tmp.path(), ".env");
        touch(tmp.path(), "target/debug/app");
        touch(tmp.path(), "web/node_modules/x/index.js");
        touch(tmp.path(), "web/app.js");
        assert_eq!(list_workspace_files(tmp.path(), 100, 3), vec!["web/app.js"]);
    }

    #[test]
    fn respects_depth_limit() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "one.txt");
        touch(tmp.path(), "a/two.txt");
        touch(tmp.path(), "a/b/three.txt");
        touch(tmp.path(), "a/b/c/four.txt");
        assert_eq!(
            list_workspace_files(tmp.path(), 100, 3),
            vec!["a/b/three.txt", "a/two.txt", "one.txt"]
        );
        assert_eq!(list_workspace_files(tmp.path(), 100, 1), vec!["one.txt"]);
    }

    #[test]
    fn respects_file_limit() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..20 {
            touch(tmp.path(), &format!("f{i:02}.txt"));
        }
        let files = list_workspace_files(tmp.path(), 5, 3);
        assert_eq!(files, vec!["f00.txt", "f01.txt", "f02.txt", "f03.txt", "f04.txt"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_workspace_files(&tmp.path().join("nope"), 100, 3).is_empty());
    }
}
