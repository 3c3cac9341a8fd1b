//! Workspace confinement for tool file access.
//!
//! Every filesystem tool resolves its paths through a [`WorkspaceGuard`]
//! before touching disk. The guard pins access to one root directory and
//! blocks a deny-list of sensitive locations even inside it. Resolution is
//! lexical (no filesystem calls), so it works for paths that do not exist
//! yet, e.g. the target of a write.

use std::path::{Component, Path, PathBuf};

/// Error returned when path resolution fails.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Path '{path}' is outside the workspace root")]
    OutsideRoot { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    Forbidden { path: String, pattern: String },

    #[error("Invalid path '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

/// Confines candidate paths to a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    enforce: bool,
    forbidden: Vec<String>,
}

/// Sensitive locations blocked even when enforcement is off.
pub fn default_forbidden() -> Vec<String> {
    vec![
        "/.ssh".into(),
        "/.gnupg".into(),
        "/.aws".into(),
        "/etc/shadow".into(),
        "/etc/passwd".into(),
        "/etc/sudoers".into(),
    ]
}

impl WorkspaceGuard {
    /// Create a guard rooted at `root`, with the default deny list.
    ///
    /// `root` should be absolute; a relative root is resolved against the
    /// current directory once, here, not per call.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let raw: PathBuf = root.into();
        let root = if raw.is_absolute() {
            normalize(&raw)
        } else {
            let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            normalize(&base.join(raw))
        };
        Self {
            root,
            enforce: true,
            forbidden: default_forbidden(),
        }
    }

    /// Disable root confinement (the deny list still applies).
    pub fn with_enforcement(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    /// Replace the deny list.
    pub fn with_forbidden(mut self, forbidden: Vec<String>) -> Self {
        self.forbidden = forbidden;
        self
    }

    /// The workspace root this guard confines to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a candidate path.
    ///
    /// Relative paths are taken relative to the root. `.` and `..`
    /// components are folded lexically; a `..` that climbs above the root
    /// of the path is rejected outright. The returned path is absolute and
    /// normalized.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, GuardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GuardError::Invalid {
                path: raw.into(),
                reason: "empty path".into(),
            });
        }

        let candidate = Path::new(trimmed);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = normalize(&joined);

        let resolved_str = resolved.to_string_lossy();
        for pattern in &self.forbidden {
            if resolved_str.contains(pattern.as_str()) {
                tracing::warn!(path = %resolved_str, pattern = %pattern, "Blocked access to forbidden path");
                return Err(GuardError::Forbidden {
                    path: raw.into(),
                    pattern: pattern.clone(),
                });
            }
        }

        if self.enforce && !resolved.starts_with(&self.root) {
            tracing::warn!(path = %resolved_str, root = %self.root.display(), "Blocked access outside workspace root");
            return Err(GuardError::OutsideRoot { path: raw.into() });
        }

        Ok(resolved)
    }

    /// Resolve a candidate path that defaults to the root when absent.
    pub fn resolve_or_root(&self, raw: Option<&str>) -> Result<PathBuf, GuardError> {
        match raw {
            Some(p) if !p.trim().is_empty() => self.resolve(p),
            _ => Ok(self.root.clone()),
        }
    }
}

/// Fold `.` and `..` components lexically. `..` at the top is dropped, so
/// the result never climbs above the filesystem root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> WorkspaceGuard {
        WorkspaceGuard::new("/work/project")
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let resolved = guard().resolve("src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/src/main.rs"));
    }

    #[test]
    fn absolute_path_inside_root_ok() {
        let resolved = guard().resolve("/work/project/notes.md").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/notes.md"));
    }

    #[test]
    fn traversal_out_of_root_blocked() {
        let err = guard().resolve("../../etc/hosts").unwrap_err();
        assert!(matches!(err, GuardError::OutsideRoot { .. }));

        let err = guard().resolve("/work/project/../other").unwrap_err();
        assert!(matches!(err, GuardError::OutsideRoot { .. }));
    }

    #[test]
    fn dot_components_fold_in_place() {
        let resolved = guard().resolve("./src/./lib.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/src/lib.rs"));

        let resolved = guard().resolve("src/sub/../lib.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/src/lib.rs"));
    }

    #[test]
    fn forbidden_applies_even_inside_root() {
        let err = guard().resolve("/work/project/.ssh/id_rsa").unwrap_err();
        assert!(matches!(err, GuardError::Forbidden { .. }));
    }

    #[test]
    fn enforcement_off_still_blocks_forbidden() {
        let open = guard().with_enforcement(false);
        assert!(open.resolve("/tmp/anywhere.txt").is_ok());
        let err = open.resolve("/etc/shadow").unwrap_err();
        assert!(matches!(err, GuardError::Forbidden { .. }));
    }

    #[test]
    fn empty_path_rejected() {
        let err = guard().resolve("   ").unwrap_err();
        assert!(matches!(err, GuardError::Invalid { .. }));
    }

    #[test]
    fn resolve_or_root_defaults_to_root() {
        let g = guard();
        assert_eq!(g.resolve_or_root(None).unwrap(), PathBuf::from("/work/project"));
        assert_eq!(
            g.resolve_or_root(Some("sub")).unwrap(),
            PathBuf::from("/work/project/sub")
        );
    }
}
