//! Request-scoped scratch space for downloaded and transcoded audio.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A private temporary directory owned by a single request.
///
/// The directory and everything in it is deleted when the workspace is
/// dropped, so success, early validation returns, and errors all clean up.
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("transcribe-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded bytes are stored, untouched.
    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join("source.audio")
    }

    /// Sibling path for the normalized 16kHz mono WAV.
    pub fn waveform_path(&self) -> PathBuf {
        self.dir.path().join("source.wav")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_paths_are_siblings() {
        let workspace = RequestWorkspace::new().unwrap();
        assert_eq!(workspace.source_path().parent(), Some(workspace.path()));
        assert_eq!(workspace.waveform_path().parent(), Some(workspace.path()));
        assert_ne!(workspace.source_path(), workspace.waveform_path());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = RequestWorkspace::new().unwrap();
        std::fs::write(workspace.source_path(), b"bytes").unwrap();
        std::fs::write(workspace.waveform_path(), b"more bytes").unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(dir.exists());

        drop(workspace);
        assert!(!dir.exists());
    }
}
