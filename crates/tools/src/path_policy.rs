//! Path validation for file-writing tools.
//!
//! A path is accepted when it has no `..` components, does not fall under a
//! forbidden prefix, and (if any roots are configured) falls under one of
//! the allowed roots. Comparisons are made on resolved paths so symlinked
//! temp directories compare equal to their targets.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathPolicyError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden prefix '{prefix}'")]
    Forbidden { path: String, prefix: String },

    #[error("Path traversal detected in '{path}'")]
    Traversal { path: String },
}

/// Prefixes no tool should ever write under.
pub fn default_forbidden() -> Vec<String> {
    vec![
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.crewloop".into(),
        "/etc".into(),
        "/proc".into(),
        "/sys".into(),
    ]
}

/// Validate `path` and return its resolved form.
pub fn validate_path(
    path: &Path,
    allowed_roots: &[PathBuf],
    forbidden: &[String],
) -> Result<PathBuf, PathPolicyError> {
    let display = path.display().to_string();

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathPolicyError::Traversal { path: display });
    }

    let resolved = resolve(path);

    for prefix in forbidden {
        let candidate = resolve(&expand_tilde(prefix));
        if resolved.starts_with(&candidate) {
            return Err(PathPolicyError::Forbidden {
                path: display,
                prefix: prefix.clone(),
            });
        }
    }

    if !allowed_roots.is_empty() && !allowed_roots.iter().any(|root| resolved.starts_with(resolve(root))) {
        return Err(PathPolicyError::OutsideAllowedRoots { path: display });
    }

    Ok(resolved)
}

/// Make `path` absolute and canonicalize its longest existing ancestor.
/// The not-yet-existing tail is appended unchanged.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_relative() {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    };

    let mut tail: Vec<OsString> = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if current.exists() {
            if let Ok(mut canonical) = current.canonicalize() {
                canonical.extend(tail.iter().rev());
                return canonical;
            }
            break;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => break,
        }
    }
    absolute
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_blocked() {
        let err = validate_path(Path::new("reports/../../etc/passwd"), &[], &[]).unwrap_err();
        assert!(matches!(err, PathPolicyError::Traversal { .. }));
    }

    #[test]
    fn forbidden_prefix_blocked() {
        let err = validate_path(Path::new("/etc/passwd"), &[], &["/etc".into()]).unwrap_err();
        match err {
            PathPolicyError::Forbidden { prefix, .. } => assert_eq!(prefix, "/etc"),
            other => panic!("Expected Forbidden, got: {other}"),
        }
    }

    #[test]
    fn forbidden_matches_whole_components() {
        assert!(validate_path(Path::new("/etcetera/file"), &[], &["/etc".into()]).is_ok());
    }

    #[test]
    fn allowed_roots_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let roots = vec![dir.path().to_path_buf()];

        let inside = dir.path().join("nested").join("report.md");
        assert!(validate_path(&inside, &roots, &[]).is_ok());

        let err = validate_path(Path::new("/var/other/report.md"), &roots, &[]).unwrap_err();
        assert!(matches!(err, PathPolicyError::OutsideAllowedRoots { .. }));
    }

    #[test]
    fn forbidden_takes_precedence_over_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret");
        let roots = vec![dir.path().to_path_buf()];
        let forbidden = vec![secret.display().to_string()];

        let err = validate_path(&secret.join("key"), &roots, &forbidden).unwrap_err();
        assert!(matches!(err, PathPolicyError::Forbidden { .. }));
    }
}
