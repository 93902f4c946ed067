//! Per-repository staging directories.
//!
//! Layout under the staging root:
//!
//! ```text
//! <staging_root>/<repo>/                 package_path: built packages land here
//! <staging_root>/<repo>/content/<repo>/  clone_path: the checked-out tree
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info};

use crate::error::WorkspaceError;

/// Staging area for one repository during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub package_path: PathBuf,
    pub clone_path: PathBuf,
}

impl Workspace {
    /// Computes the paths without touching the filesystem.
    pub fn layout(staging_root: &Path, repository_name: &str) -> Self {
        let package_path = staging_root.join(repository_name);
        let clone_path = package_path.join("content").join(repository_name);
        Workspace {
            package_path,
            clone_path,
        }
    }
}

/// Deletes any previous clone directory and recreates it empty.
pub fn prepare(staging_root: &Path, repository_name: &str) -> Result<Workspace, WorkspaceError> {
    let workspace = Workspace::layout(staging_root, repository_name);
    let clone_path = &workspace.clone_path;

    if !is_plain_name(repository_name) {
        let err = io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("repository name '{repository_name}' is not a single path component"),
        );
        error!(error = ?err, repository = repository_name, "Refusing to prepare workspace");
        return Err(WorkspaceError::UnknownIo {
            path: clone_path.clone(),
            source: err,
        });
    }

    if clone_path.exists() {
        fs::remove_dir_all(clone_path).map_err(|e| classify(clone_path, e))?;
        debug!(path = %clone_path.display(), "Removed existing clone directory");
    }

    fs::create_dir_all(clone_path).map_err(|e| classify(clone_path, e))?;
    info!(
        repository = repository_name,
        path = %clone_path.display(),
        "Prepared clean workspace"
    );
    Ok(workspace)
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn classify(path: &Path, source: io::Error) -> WorkspaceError {
    error!(error = ?source, path = %path.display(), "Workspace filesystem operation failed");
    let path = path.to_path_buf();
    if source.kind() == io::ErrorKind::PermissionDenied {
        WorkspaceError::AccessDenied { path, source }
    } else if is_name_too_long(&source) {
        WorkspaceError::PathTooLong { path, source }
    } else {
        WorkspaceError::UnknownIo { path, source }
    }
}

#[cfg(windows)]
fn is_name_too_long(err: &io::Error) -> bool {
    // ERROR_FILENAME_EXCED_RANGE
    matches!(err.raw_os_error(), Some(206))
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn is_name_too_long(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(63))
}

#[cfg(not(any(windows, target_os = "macos", target_os = "ios", target_os = "freebsd")))]
fn is_name_too_long(err: &io::Error) -> bool {
    // ENAMETOOLONG
    matches!(err.raw_os_error(), Some(36))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_nests_clone_under_package_path() {
        let ws = Workspace::layout(Path::new("Repositories"), "r2");
        assert_eq!(ws.package_path, PathBuf::from("Repositories/r2"));
        assert_eq!(ws.clone_path, PathBuf::from("Repositories/r2/content/r2"));
    }

    #[test]
    fn prepare_creates_empty_clone_path() {
        let root = tempdir().unwrap();
        let ws = prepare(root.path(), "demo").expect("prepare should succeed");
        assert!(ws.clone_path.is_dir());
        assert_eq!(fs::read_dir(&ws.clone_path).unwrap().count(), 0);
    }

    #[test]
    fn prepare_is_idempotent_and_clears_stale_content() {
        let root = tempdir().unwrap();
        let first = prepare(root.path(), "demo").unwrap();
        fs::create_dir_all(first.clone_path.join("src/nested")).unwrap();
        fs::write(first.clone_path.join("src/nested/stale.cs"), "class Old {}").unwrap();

        let second = prepare(root.path(), "demo").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(&second.clone_path).unwrap().count(), 0);

        let third = prepare(root.path(), "demo").unwrap();
        assert_eq!(fs::read_dir(&third.clone_path).unwrap().count(), 0);
    }

    #[test]
    fn prepare_keeps_previous_packages() {
        let root = tempdir().unwrap();
        let ws = prepare(root.path(), "demo").unwrap();
        let old_package = ws.package_path.join("Demo.1.0.3.nupkg");
        fs::write(&old_package, b"pk").unwrap();

        prepare(root.path(), "demo").unwrap();
        assert!(old_package.exists());
    }

    #[test]
    fn prepare_rejects_names_that_escape_the_staging_root() {
        let root = tempdir().unwrap();
        for name in ["../escape", "a/b", "", ".."] {
            let err = prepare(root.path(), name).unwrap_err();
            assert!(
                matches!(err, WorkspaceError::UnknownIo { .. }),
                "{name}: unexpected {err:?}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn prepare_reports_name_too_long() {
        let root = tempdir().unwrap();
        let name = "x".repeat(300);
        let err = prepare(root.path(), &name).unwrap_err();
        assert!(
            matches!(err, WorkspaceError::PathTooLong { .. }),
            "unexpected {err:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn prepare_reports_access_denied() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let locked = root.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        // root bypasses permission bits; nothing to assert there
        let writable = locked.join("writable");
        if fs::create_dir(&writable).is_ok() {
            fs::remove_dir(&writable).unwrap();
            return;
        }

        let err = prepare(&locked, "demo").unwrap_err();
        assert!(
            matches!(err, WorkspaceError::AccessDenied { .. }),
            "unexpected {err:?}"
        );
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    }
}
