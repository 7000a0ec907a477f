use std::io;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;

/// Extensions the backend knows how to load. A hint for pickers only; the
/// gateway uploads whatever it is handed.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "png", "jpg", "jpeg"];

/// Raw document bytes plus the filename reported to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn read(path: &Path) -> io::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { filename, bytes })
    }

    pub async fn read_all(paths: &[PathBuf]) -> io::Result<Vec<Self>> {
        try_join_all(paths.iter().map(|p| Self::read(p))).await
    }
}

pub fn is_accepted(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    ACCEPTED_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_accepted() {
        assert!(is_accepted(Path::new("notes.txt")));
        assert!(is_accepted(Path::new("/tmp/Scan.JPEG")));
        assert!(is_accepted(Path::new("report.pdf")));
        assert!(!is_accepted(Path::new("sheet.xlsx")));
        assert!(!is_accepted(Path::new("README")));
    }

    #[tokio::test]
    async fn test_read_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let payload = FilePayload::read(&path).await.unwrap();
        assert_eq!(payload.filename, "a.txt");
        assert_eq!(payload.bytes, b"one\ntwo\n");
    }

    #[tokio::test]
    async fn test_read_all_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.md");
        std::fs::write(&present, "# a").unwrap();
        let missing = dir.path().join("gone.pdf");

        let err = FilePayload::read_all(&[present, missing]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
