//! Upload validation: the extension allow-list.
//!
//! Runs before any byte of an upload is read. A rejected file gets no
//! hashing, no dedup lookup, no engine call, and no persisted rows.

use std::path::Path;

use crate::error::FileError;

/// Case-insensitive set of accepted file extensions (stored as `".ext"`).
#[derive(Debug, Clone)]
pub struct ExtensionAllowList {
    extensions: Vec<String>,
}

impl ExtensionAllowList {
    /// Builds the list, normalizing each entry to lower case with a leading dot.
    /// Blank entries are ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = extensions
            .into_iter()
            .filter_map(|e| normalize_extension(e.as_ref()))
            .collect();
        normalized.sort();
        normalized.dedup();
        Self {
            extensions: normalized,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Fails with [`FileError::UnsupportedFileType`] unless `file_name`'s
    /// extension is on the list.
    pub fn check(&self, file_name: &str) -> Result<(), FileError> {
        let extension = file_extension(file_name);
        if !extension.is_empty() && self.extensions.iter().any(|e| *e == extension) {
            Ok(())
        } else {
            Err(FileError::UnsupportedFileType { extension })
        }
    }
}

/// Lower-cased extension of `file_name` including the dot, or `""`.
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> ExtensionAllowList {
        ExtensionAllowList::new([".pdf", "DOCX", " .txt ", ""])
    }

    #[test]
    fn test_normalizes_entries() {
        assert_eq!(list().extensions(), &[".docx", ".pdf", ".txt"]);
    }

    #[test]
    fn test_accepts_case_insensitively() {
        let list = list();
        assert!(list.check("report.PDF").is_ok());
        assert!(list.check("notes.Txt").is_ok());
        assert!(list.check("dir/sub/thesis.docx").is_ok());
    }

    #[test]
    fn test_rejects_unknown_and_missing_extensions() {
        let list = list();
        match list.check("a.exe") {
            Err(FileError::UnsupportedFileType { extension }) => assert_eq!(extension, ".exe"),
            other => panic!("expected unsupported type, got {:?}", other),
        }
        assert!(list.check("README").is_err());
        assert!(list.check(".txt").is_err());
        assert!(list.check("archive.txt.gz").is_err());
    }
}
