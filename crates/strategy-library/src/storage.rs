use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use strategy_core::{ScreenerError, ScreeningStrategy};

pub const DOCUMENT_EXTENSION: &str = "json";

pub fn document_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, DOCUMENT_EXTENSION))
}

pub fn is_document(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
}

/// Write bytes so readers only ever see the old or the new file.
///
/// The data goes to a sibling temp file first, is synced, then renamed over
/// the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ScreenerError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| ScreenerError::storage(parent, e))?;

    // "<name>.json.tmp" so a crash leftover is never listed as a document
    let temp_path = path.with_extension(format!("{}.tmp", DOCUMENT_EXTENSION));
    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(ScreenerError::storage(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        ScreenerError::storage(path, e)
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ScreenerError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| ScreenerError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

pub fn read_json(path: &Path) -> Result<serde_json::Value, ScreenerError> {
    let text = fs::read_to_string(path).map_err(|e| ScreenerError::storage(path, e))?;
    serde_json::from_str(&text).map_err(|e| ScreenerError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read and validate one strategy document.
pub fn read_document(path: &Path) -> Result<ScreeningStrategy, ScreenerError> {
    let text = fs::read_to_string(path).map_err(|e| ScreenerError::storage(path, e))?;
    let strategy: ScreeningStrategy =
        serde_json::from_str(&text).map_err(|e| ScreenerError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })?;
    strategy.validate()?;
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = document_path(dir.path(), "gappers");

        write_atomic(&path, b"{\"v\": 1}").unwrap();
        write_atomic(&path, b"{\"v\": 2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\": 2}");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn atomic_write_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("a.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(is_document(&path));
    }

    #[test]
    fn corrupted_document_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = document_path(dir.path(), "broken");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_document(&path),
            Err(ScreenerError::Malformed { .. })
        ));
    }
}
