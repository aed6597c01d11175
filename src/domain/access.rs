//! File access policy for every path the agent asks to print or render.
//!
//! Checks run in a fixed order: hidden components first (no override), then
//! the deny-list, then the allow-list. A candidate must clear all three.
//! Symlinks are resolved before the list checks so a link inside an allowed
//! directory cannot reach a target outside of it.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use thiserror::Error;

/// Immutable allow/deny configuration, built once at startup.
///
/// An empty allow-list grants access nowhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed: Vec<PathBuf>,
    denied: Vec<PathBuf>,
}

/// Why a candidate path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    /// A component of the path (before or after symlink resolution) is hidden.
    #[error(
        "is a hidden file or lies inside a hidden directory; \
         paths with components starting with '.' can never be printed"
    )]
    DotfileBlocked,
    /// The resolved path is, or lies beneath, a denied directory.
    #[error("is inside the denied directory `{}`", .directory.display())]
    DeniedDirectory { directory: PathBuf },
    /// The resolved path is not beneath any allowed directory.
    #[error(
        "is outside the allowed directories ({}); \
         add its directory to PRINTGATE__ACCESS__ALLOWED_DIRS to grant access",
        list_dirs(.allowed)
    )]
    OutsideAllowed { allowed: Vec<PathBuf> },
}

impl DenyReason {
    /// Stable identifier for logs and machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::DotfileBlocked => "dotfile_blocked",
            DenyReason::DeniedDirectory { .. } => "denied_directory",
            DenyReason::OutsideAllowed { .. } => "outside_allowed",
        }
    }
}

/// Outcome of validating one candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    /// Access granted; carries the resolved path that must be used from here on.
    Allowed(PathBuf),
    Denied(DenyReason),
}

impl PathDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PathDecision::Allowed(_))
    }
}

/// Typed denial surfaced to callers that propagate with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access denied: `{}` {reason}", .path.display())]
pub struct AccessDenied {
    pub path: PathBuf,
    pub reason: DenyReason,
}

fn list_dirs(dirs: &[PathBuf]) -> String {
    if dirs.is_empty() {
        return "none configured".to_string();
    }
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl AccessPolicy {
    /// Build a policy from absolute directory lists.
    ///
    /// Directories that exist are canonicalized so they compare equal to
    /// symlink-resolved candidates; missing ones are kept lexically normalized.
    pub fn new(allowed: Vec<PathBuf>, denied: Vec<PathBuf>) -> Self {
        Self {
            allowed: allowed.into_iter().map(canonical_or_normalized).collect(),
            denied: denied.into_iter().map(canonical_or_normalized).collect(),
        }
    }

    pub fn allowed(&self) -> &[PathBuf] {
        &self.allowed
    }

    pub fn denied(&self) -> &[PathBuf] {
        &self.denied
    }

    /// Decide whether `candidate` may be read.
    pub fn validate(&self, candidate: &str) -> PathDecision {
        let absolute = match absolutize(Path::new(candidate)) {
            Ok(path) => path,
            // Without a working directory a relative path cannot land anywhere allowed.
            Err(_) => {
                return PathDecision::Denied(DenyReason::OutsideAllowed {
                    allowed: self.allowed.clone(),
                });
            }
        };
        let resolved = std::fs::canonicalize(&absolute).unwrap_or_else(|_| normalize(&absolute));

        if has_hidden_component(&absolute) || has_hidden_component(&resolved) {
            return PathDecision::Denied(DenyReason::DotfileBlocked);
        }

        if let Some(directory) = self.denied.iter().find(|dir| resolved.starts_with(dir)) {
            return PathDecision::Denied(DenyReason::DeniedDirectory {
                directory: directory.clone(),
            });
        }

        if self.allowed.iter().any(|dir| resolved.starts_with(dir)) {
            PathDecision::Allowed(resolved)
        } else {
            PathDecision::Denied(DenyReason::OutsideAllowed {
                allowed: self.allowed.clone(),
            })
        }
    }

    /// [`validate`](Self::validate) in `Result` form, returning the resolved path.
    pub fn authorize(&self, candidate: &str) -> Result<PathBuf, AccessDenied> {
        match self.validate(candidate) {
            PathDecision::Allowed(resolved) => Ok(resolved),
            PathDecision::Denied(reason) => {
                let path = absolutize(Path::new(candidate))
                    .unwrap_or_else(|_| PathBuf::from(candidate));
                metrics::counter!("printgate_access_denied_total", "reason" => reason.code())
                    .increment(1);
                tracing::warn!(
                    target = "domain::access",
                    op = "access::authorize",
                    result = "denied",
                    reason = reason.code(),
                    path = %path.display(),
                    "File access denied"
                );
                Err(AccessDenied { path, reason })
            }
        }
    }
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

fn canonical_or_normalized(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or_else(|_| normalize(&path))
}

/// Lexically collapse `.` and `..` so an unresolvable path cannot climb out
/// of an allowed prefix.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
