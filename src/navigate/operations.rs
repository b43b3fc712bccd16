//! Navigation operations implementation

use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ResourceError;

/// A session's working directory, kept as an ordered list of segments.
///
/// The first segment is the user's home segment (`/<username>`) and is never
/// popped; every later segment is a directory below the real home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    home: PathBuf,
    segments: Vec<String>,
}

impl VirtualPath {
    /// Root of a freshly authenticated session: `/<username>` mapped onto `home`.
    pub fn new(username: &str, home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            segments: vec![username.to_string()],
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Real directory this virtual path is bound to.
    pub fn real_path(&self) -> PathBuf {
        let mut real = self.home.clone();
        real.extend(&self.segments[1..]);
        real
    }

    /// Moves one level up. At the root this is a no-op.
    pub fn ascend(&mut self) {
        if !self.is_root() {
            self.segments.pop();
        }
    }

    fn descend(&mut self, segment: &str) {
        self.segments.push(segment.to_string());
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Splits a client-supplied relative path into plain segments. Leading
/// separators, empty segments, `.` and `..` are all refused so the result can
/// never climb out of the directory it is joined to.
fn relative_segments(raw: &str) -> Option<Vec<&str>> {
    if raw.starts_with(is_separator) {
        return None;
    }
    let segments: Vec<&str> = raw.trim_end_matches(is_separator).split(is_separator).collect();
    let valid = segments
        .iter()
        .all(|segment| !segment.is_empty() && *segment != "." && *segment != "..");
    valid.then_some(segments)
}

/// Resolves a CWD argument against the current virtual path.
///
/// `..` moves one level up (clamped at the home segment). An absolute path is
/// refused. Anything else is a relative descent whose target must exist as a
/// directory inside the home directory.
pub async fn change_directory(
    current: &VirtualPath,
    target: &str,
) -> Result<VirtualPath, ResourceError> {
    let mut next = current.clone();

    if target == ".." {
        next.ascend();
        return Ok(next);
    }

    if target.starts_with(is_separator) {
        return Err(ResourceError::AbsolutePath(target.to_string()));
    }

    let segments = relative_segments(target)
        .ok_or_else(|| ResourceError::DirectoryNotFound(target.to_string()))?;
    for segment in segments {
        next.descend(segment);
    }

    let real_path = next.real_path();
    let metadata = tokio::fs::metadata(&real_path)
        .await
        .map_err(|_| ResourceError::DirectoryNotFound(next.to_string()))?;
    if !metadata.is_dir() {
        return Err(ResourceError::DirectoryNotFound(next.to_string()));
    }

    // Symlinks inside the home directory must not lead out of it
    let canonical = tokio::fs::canonicalize(&real_path)
        .await
        .map_err(|_| ResourceError::DirectoryNotFound(next.to_string()))?;
    let home = tokio::fs::canonicalize(current.home())
        .await
        .map_err(|_| ResourceError::DirectoryNotFound(next.to_string()))?;
    if !canonical.starts_with(&home) {
        return Err(ResourceError::DirectoryNotFound(next.to_string()));
    }

    debug!("Resolved CWD {} -> {}", next, real_path.display());
    Ok(next)
}

/// Whether `real` leads outside `home` once symlinks are followed. A target
/// that exists is checked itself; a new one is checked through its parent.
/// A dangling link counts as escaping since creating through it would land
/// wherever it points.
async fn escapes_home(home: &Path, real: &Path) -> bool {
    let Ok(home) = tokio::fs::canonicalize(home).await else {
        return false;
    };
    let target = if tokio::fs::symlink_metadata(real).await.is_ok() {
        match tokio::fs::canonicalize(real).await {
            Ok(target) => target,
            Err(_) => return true,
        }
    } else {
        let Some(parent) = real.parent() else {
            return false;
        };
        match tokio::fs::canonicalize(parent).await {
            Ok(target) => target,
            Err(_) => return false,
        }
    };
    !target.starts_with(&home)
}

/// Maps a RETR/STOR file name onto a real path under the current directory.
///
/// Either separator style is accepted and translated to the platform's. A
/// path that symlinks out of the home directory is refused; a missing parent
/// is left for the open to report.
pub async fn resolve_file(current: &VirtualPath, name: &str) -> Result<PathBuf, ResourceError> {
    let segments =
        relative_segments(name).ok_or_else(|| ResourceError::InvalidName(name.to_string()))?;
    let mut real = current.real_path();
    real.extend(segments);

    if escapes_home(current.home(), &real).await {
        debug!("Refused {} outside home {}", real.display(), current.home().display());
        return Err(ResourceError::InvalidName(name.to_string()));
    }
    Ok(real)
}
