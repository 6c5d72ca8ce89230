//! Per-rule temporary workspaces and confined file writes.
//!
//! A [`Workspace`] is a uniquely named directory under the workspace root
//! that holds one clone. It is removed when dropped unless it was created
//! with `keep` set, so failures part-way through a rule do not leave clones
//! behind.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const WORKSPACE_PREFIX: &str = "branchsync-";

/// Errors raised while preparing workspaces or copying files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WorkspaceError {
    /// The workspace directory could not be created or opened.
    #[error("failed to create workspace under {path}: {message}")]
    Create {
        /// Directory that could not be created or opened.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// The source file could not be read.
    #[error("failed to read source {path}: {message}")]
    SourceRead {
        /// Source file path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// The destination file could not be written inside the checkout.
    #[error("failed to copy into {checkout}/{path}: {message}")]
    Copy {
        /// Checkout root.
        checkout: Utf8PathBuf,
        /// Destination path relative to the checkout.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// Temporary directory owning one clone.
#[derive(Debug)]
pub struct Workspace {
    root: Dir,
    root_path: Utf8PathBuf,
    name: String,
    keep: bool,
}

impl Workspace {
    /// Creates a fresh directory named `branchsync-<uuid>` under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Create`] when `root` cannot be opened or the
    /// directory cannot be created.
    pub fn create(root: &Utf8Path, keep: bool) -> Result<Self, WorkspaceError> {
        let to_error = |message: String| WorkspaceError::Create {
            path: root.to_path_buf(),
            message,
        };
        let dir =
            Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| to_error(err.to_string()))?;
        let name = format!("{WORKSPACE_PREFIX}{}", Uuid::new_v4().simple());
        dir.create_dir(&name)
            .map_err(|err| to_error(err.to_string()))?;

        let workspace = Self {
            root: dir,
            root_path: root.to_path_buf(),
            name,
            keep,
        };
        debug!(path = %workspace.path(), "created workspace");
        Ok(workspace)
    }

    /// Path of the workspace directory.
    #[must_use]
    pub fn path(&self) -> Utf8PathBuf {
        self.root_path.join(&self.name)
    }

    /// Path the repository named `repo` is cloned to.
    #[must_use]
    pub fn checkout_path(&self, repo: &str) -> Utf8PathBuf {
        self.path().join(repo)
    }

    /// Opens the clone of `repo` for confined writes.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Create`] when the clone directory is missing.
    pub fn open_checkout(&self, repo: &str) -> Result<Checkout, WorkspaceError> {
        let relative = Utf8PathBuf::from(&self.name).join(repo);
        let dir = self
            .root
            .open_dir(&relative)
            .map_err(|err| WorkspaceError::Create {
                path: self.checkout_path(repo),
                message: err.to_string(),
            })?;
        Ok(Checkout {
            dir,
            path: self.checkout_path(repo),
        })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            debug!(path = %self.path(), "keeping workspace");
            return;
        }
        match self.root.remove_dir_all(&self.name) {
            Ok(()) => debug!(path = %self.path(), "removed workspace"),
            Err(err) => warn!(path = %self.path(), error = %err, "failed to remove workspace"),
        }
    }
}

/// A cloned repository inside a [`Workspace`].
#[derive(Debug)]
pub struct Checkout {
    dir: Dir,
    path: Utf8PathBuf,
}

impl Checkout {
    /// Filesystem path of the checkout.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Writes `contents` to `relative`, creating parent directories. Paths
    /// that would escape the checkout are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Copy`] when the path escapes the checkout or
    /// the write fails.
    pub fn write_file(&self, relative: &Utf8Path, contents: &[u8]) -> Result<(), WorkspaceError> {
        let to_error = |message: String| WorkspaceError::Copy {
            checkout: self.path.clone(),
            path: relative.to_path_buf(),
            message,
        };

        if relative.file_name().is_none() {
            return Err(to_error(String::from("destination does not name a file")));
        }
        if let Some(parent) = relative.parent()
            && !parent.as_str().is_empty()
        {
            self.dir
                .create_dir_all(parent)
                .map_err(|err| to_error(err.to_string()))?;
        }
        self.dir
            .write(relative, contents)
            .map_err(|err| to_error(err.to_string()))
    }
}

/// Reads the source file `source`, resolved against `source_root`.
///
/// # Errors
///
/// Returns [`WorkspaceError::SourceRead`] when the file cannot be read.
pub fn read_source(source_root: &Utf8Path, source: &Utf8Path) -> Result<Vec<u8>, WorkspaceError> {
    let path = source_root.join(source);
    let to_error = |message: String| WorkspaceError::SourceRead {
        path: path.clone(),
        message,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| to_error(String::from("source does not name a file")))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| to_error(err.to_string()))?;
    dir.read(file_name).map_err(|err| to_error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Root {
        path: Utf8PathBuf,
        _tmp: TempDir,
    }

    #[fixture]
    fn root() -> Root {
        let tmp = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp dir not UTF-8: {}", path.display()));
        Root { path, _tmp: tmp }
    }

    fn entries(path: &Utf8Path) -> Vec<String> {
        std::fs::read_dir(path)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[rstest]
    fn workspace_is_removed_on_drop(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        let path = workspace.path();
        assert!(path.is_dir());
        assert!(
            path.file_name()
                .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX))
        );

        drop(workspace);
        assert!(!path.exists(), "workspace should be removed");
    }

    #[rstest]
    fn kept_workspace_survives_drop(root: Root) {
        let workspace = Workspace::create(&root.path, true).expect("workspace");
        let path = workspace.path();
        drop(workspace);
        assert!(path.is_dir(), "kept workspace should remain");
    }

    #[rstest]
    fn workspaces_are_unique(root: Root) {
        let first = Workspace::create(&root.path, false).expect("first");
        let second = Workspace::create(&root.path, false).expect("second");
        assert_ne!(first.path(), second.path());
        assert_eq!(entries(&root.path).len(), 2);
    }

    #[rstest]
    fn missing_root_is_a_creation_error(root: Root) {
        let missing = root.path.join("absent");
        let err = Workspace::create(&missing, false).expect_err("missing root should fail");
        assert!(matches!(err, WorkspaceError::Create { ref path, .. } if *path == missing));
    }

    #[rstest]
    fn checkout_writes_nested_destination(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        std::fs::create_dir(workspace.checkout_path("widgets")).expect("fake clone");
        let checkout = workspace.open_checkout("widgets").expect("checkout");

        checkout
            .write_file(Utf8Path::new(".github/workflows/ci.yml"), b"on: push\n")
            .expect("write should succeed");

        let written = std::fs::read_to_string(
            workspace
                .checkout_path("widgets")
                .join(".github/workflows/ci.yml"),
        )
        .expect("read back");
        assert_eq!(written, "on: push\n");
    }

    #[rstest]
    fn checkout_overwrites_existing_file(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        let clone = workspace.checkout_path("widgets");
        std::fs::create_dir(&clone).expect("fake clone");
        std::fs::write(clone.join("VERSION"), "1.0.0\n").expect("seed");
        let checkout = workspace.open_checkout("widgets").expect("checkout");

        checkout
            .write_file(Utf8Path::new("VERSION"), b"2.0.0\n")
            .expect("overwrite should succeed");

        assert_eq!(
            std::fs::read_to_string(clone.join("VERSION")).expect("read back"),
            "2.0.0\n"
        );
    }

    #[rstest]
    fn checkout_rejects_paths_escaping_the_clone(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        std::fs::create_dir(workspace.checkout_path("widgets")).expect("fake clone");
        let checkout = workspace.open_checkout("widgets").expect("checkout");

        let err = checkout
            .write_file(Utf8Path::new("../../escaped"), b"nope")
            .expect_err("escape should be rejected");

        assert!(matches!(err, WorkspaceError::Copy { .. }), "unexpected error: {err}");
        assert!(!root.path.join("escaped").exists());
    }

    #[rstest]
    fn checkout_rejects_absolute_destinations(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        std::fs::create_dir(workspace.checkout_path("widgets")).expect("fake clone");
        let checkout = workspace.open_checkout("widgets").expect("checkout");
        let target = root.path.join("absolute");

        let result = checkout.write_file(&target, b"nope");

        assert!(matches!(result, Err(WorkspaceError::Copy { .. })));
        assert!(!target.exists());
    }

    #[rstest]
    fn open_checkout_requires_a_clone(root: Root) {
        let workspace = Workspace::create(&root.path, false).expect("workspace");
        assert!(workspace.open_checkout("widgets").is_err());
    }

    #[rstest]
    fn read_source_resolves_against_root(root: Root) {
        std::fs::write(root.path.join("VERSION"), "3.1.4\n").expect("seed");
        let bytes = read_source(&root.path, Utf8Path::new("VERSION")).expect("read");
        assert_eq!(bytes, b"3.1.4\n");
    }

    #[rstest]
    fn read_source_reports_missing_file(root: Root) {
        let err = read_source(&root.path, Utf8Path::new("absent")).expect_err("missing");
        assert!(matches!(err, WorkspaceError::SourceRead { ref path, .. } if *path == root.path.join("absent")));
    }
}
