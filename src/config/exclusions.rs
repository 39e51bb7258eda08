//! Local preview of what the file synchronization will transfer.
//!
//! rsync evaluates `--exclude` patterns against every path component, which
//! for patterns without a leading slash matches gitignore semantics. The
//! preview walks the project tree with the same patterns so the operator can
//! see what stays local before anything leaves the machine.

use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, DeployError, Result};

use super::spec::{JSON_PATTERN, SyncExclusionSet};

/// Compiled matcher for a [`SyncExclusionSet`].
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    matcher: Gitignore,
}

/// Result of walking the project tree with the exclusion set.
#[derive(Debug, Default, Serialize)]
pub struct SyncPreview {
    /// Files that will be transferred, relative to the project root.
    pub transferred: Vec<PathBuf>,
    /// Files that stay local, relative to the project root.
    pub excluded: Vec<PathBuf>,
    /// Excluded files caught only by the blanket `*.json` rule.
    pub json_only: Vec<PathBuf>,
}

impl ExclusionMatcher {
    /// Compiles the exclusion set against a project root.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn new(root: &Path, set: &SyncExclusionSet) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in set.patterns() {
            builder.add_line(None, pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        let matcher = builder.build().map_err(|e| ConfigError::InvalidPattern {
            pattern: String::from("<set>"),
            message: e.to_string(),
        })?;
        Ok(Self { matcher })
    }

    /// Returns true if the relative path (or any parent) is excluded.
    #[must_use]
    pub fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }
}

impl SyncPreview {
    /// Walks `root` and partitions its files by the exclusion set.
    ///
    /// Hidden files are included; no `.gitignore` is consulted, since rsync
    /// does not consult one either.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid or the tree cannot be read.
    pub fn build(root: &Path, set: &SyncExclusionSet) -> Result<Self> {
        let full = ExclusionMatcher::new(root, set)?;
        let without_json = if set.contains(JSON_PATTERN) {
            Some(ExclusionMatcher::new(root, &set.without(JSON_PATTERN))?)
        } else {
            None
        };

        let mut preview = Self::default();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| DeployError::internal(format!("Failed to walk tree: {e}")))?;
            if entry.file_type().is_none_or(|t| t.is_dir()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_path_buf();

            if full.is_excluded(&rel, false) {
                let json_only = without_json
                    .as_ref()
                    .is_some_and(|m| !m.is_excluded(&rel, false));
                if json_only {
                    preview.json_only.push(rel.clone());
                }
                preview.excluded.push(rel);
            } else {
                preview.transferred.push(rel);
            }
        }

        preview.transferred.sort();
        preview.excluded.sort();
        preview.json_only.sort();

        debug!(
            "Sync preview: {} to transfer, {} excluded",
            preview.transferred.len(),
            preview.excluded.len()
        );
        Ok(preview)
    }

    /// Returns true if the given relative path would be transferred.
    #[must_use]
    pub fn transfers(&self, rel_path: &Path) -> bool {
        self.transferred.iter().any(|p| p == rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "x").unwrap();
    }

    fn project_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for rel in [
            "main.py",
            "server.py",
            "requirements.txt",
            "README.md",
            ".env",
            ".env.example",
            "tokens.json",
            "service_account.json",
            "data/mapping.json",
            "venv/bin/python",
            ".venv/lib/site.py",
            "__pycache__/main.cpython-312.pyc",
            "lib/helper.pyc",
            ".git/HEAD",
            ".git/objects/ab/cdef",
            "PLAN.md",
            "NOTES.md",
        ] {
            touch(dir.path(), rel);
        }
        dir
    }

    #[test]
    fn test_secret_files_never_transferred() {
        let dir = project_tree();
        let preview = SyncPreview::build(dir.path(), &SyncExclusionSet::defaults(true)).unwrap();

        for secret in [
            ".env",
            "tokens.json",
            "service_account.json",
            "data/mapping.json",
            ".git/HEAD",
            ".git/objects/ab/cdef",
            "venv/bin/python",
            ".venv/lib/site.py",
            "__pycache__/main.cpython-312.pyc",
            "lib/helper.pyc",
            "PLAN.md",
            "NOTES.md",
        ] {
            assert!(!preview.transfers(Path::new(secret)), "{secret} would be sent");
        }
    }

    #[test]
    fn test_code_is_transferred() {
        let dir = project_tree();
        let preview = SyncPreview::build(dir.path(), &SyncExclusionSet::defaults(true)).unwrap();

        for file in ["main.py", "server.py", "requirements.txt", "README.md", ".env.example"] {
            assert!(preview.transfers(Path::new(file)), "{file} missing");
        }
        assert_eq!(preview.transferred.len(), 5);
    }

    #[test]
    fn test_json_only_exclusions_reported() {
        let dir = project_tree();
        let preview = SyncPreview::build(dir.path(), &SyncExclusionSet::defaults(true)).unwrap();

        assert_eq!(preview.json_only, vec![PathBuf::from("data/mapping.json")]);
    }

    #[test]
    fn test_json_rule_disabled_keeps_token_files_out() {
        let dir = project_tree();
        let preview = SyncPreview::build(dir.path(), &SyncExclusionSet::defaults(false)).unwrap();

        assert!(preview.transfers(Path::new("data/mapping.json")));
        assert!(!preview.transfers(Path::new("tokens.json")));
        assert!(!preview.transfers(Path::new("service_account.json")));
        assert!(preview.json_only.is_empty());
    }

    #[test]
    fn test_rsync_transfers_exactly_the_preview() {
        let rsync_available = std::process::Command::new("rsync")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success());
        if !rsync_available {
            return;
        }

        let src = project_tree();
        let dest = TempDir::new().unwrap();
        let exclusions = SyncExclusionSet::defaults(true);

        let status = std::process::Command::new("rsync")
            .arg("-a")
            .args(exclusions.rsync_args())
            .arg(format!("{}/", src.path().display()))
            .arg(format!("{}/", dest.path().display()))
            .status()
            .unwrap();
        assert!(status.success());

        let preview = SyncPreview::build(src.path(), &exclusions).unwrap();
        let received = SyncPreview::build(dest.path(), &SyncExclusionSet::empty()).unwrap();
        assert_eq!(received.transferred, preview.transferred);
        for secret in [".env", "tokens.json", "service_account.json", "data/mapping.json", ".git/HEAD"] {
            assert!(!dest.path().join(secret).exists(), "rsync copied {secret}");
        }
    }

    #[test]
    fn test_matcher_directory_patterns() {
        let dir = TempDir::new().unwrap();
        let matcher = ExclusionMatcher::new(dir.path(), &SyncExclusionSet::defaults(true)).unwrap();

        assert!(matcher.is_excluded(Path::new("venv"), true));
        assert!(matcher.is_excluded(Path::new("venv/bin/pip"), false));
        // A plain file named like a directory pattern is not excluded.
        assert!(!matcher.is_excluded(Path::new("venv"), false));
    }
}
