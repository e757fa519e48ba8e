//! Filesystem-backed workspace rooted at a directory

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{Result, VerifierError};
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative document path, refusing anything that escapes the root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if relative.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(VerifierError::WorkspaceError(format!(
                "invalid workspace path: {:?}",
                relative
            )));
        }
        Ok(self.root.join(path))
    }
}

impl Workspace for FsWorkspace {
    type Reader = BufReader<File>;

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn open(&self, path: &str) -> Result<Self::Reader> {
        let resolved = self.resolve(path)?;
        let file = File::open(&resolved).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                VerifierError::InputUnavailable(format!("{} not found in workspace", path))
            }
            _ => VerifierError::io(format!("opening {}", resolved.display()), e),
        })?;

        debug!("Opened workspace document {}", path);
        Ok(BufReader::new(file))
    }

    fn put(&self, path: &str, content: &[u8]) -> Result<()> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| VerifierError::io(format!("creating {}", parent.display()), e))?;
        }

        fs::write(&resolved, content)
            .map_err(|e| VerifierError::io(format!("writing {}", resolved.display()), e))?;

        debug!("Saved workspace document {} ({} bytes)", path, content.len());
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        match fs::remove_file(&resolved) {
            Ok(()) => {
                debug!("Removed workspace document {}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VerifierError::io(format!("removing {}", resolved.display()), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_put_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = FsWorkspace::new(dir.path());

        workspace.put("a/b/c.txt", b"content").unwrap();
        assert!(workspace.exists("a/b/c.txt"));

        let mut content = String::new();
        workspace
            .open("a/b/c.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "content");
    }

    #[test]
    fn test_remove_document() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = FsWorkspace::new(dir.path());

        workspace.put("op/error_flag", b"").unwrap();
        workspace.remove("op/error_flag").unwrap();
        assert!(!workspace.exists("op/error_flag"));

        // already gone
        workspace.remove("op/error_flag").unwrap();
    }

    #[test]
    fn test_missing_document_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = FsWorkspace::new(dir.path());

        assert!(!workspace.exists("missing.json"));
        assert!(matches!(
            workspace.open("missing.json"),
            Err(VerifierError::InputUnavailable(_))
        ));
    }

    #[test]
    fn test_paths_escaping_root_are_rejected() {
        let workspace = FsWorkspace::new("/tmp/workspace");

        for path in ["../secret", "/etc/passwd", "a/../../b", "./a", ""] {
            assert!(
                matches!(workspace.resolve(path), Err(VerifierError::WorkspaceError(_))),
                "path {:?} should be rejected",
                path
            );
        }
        assert!(workspace.resolve("op/report.json").is_ok());
    }

    #[test]
    fn test_read_json_reports_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = FsWorkspace::new(dir.path());
        workspace.put("doc.json", b"{not json").unwrap();

        let result = workspace.read_json::<serde_json::Value>("doc.json");
        assert!(matches!(result, Err(VerifierError::MalformedContent(_))));
    }
}
