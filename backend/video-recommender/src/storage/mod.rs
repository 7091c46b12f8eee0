// ============================================
// Artifact & Table Storage
// ============================================
//
// - JSON-lines tables: one record per line, blank lines skipped
// - JSON artifacts: written to `<name>.tmp`, synced, then renamed over the
//   target so readers never see a half-written model

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path} at line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_err(path: &Path, line: usize) -> impl FnOnce(serde_json::Error) -> StorageError + '_ {
    move |source| StorageError::Json {
        path: path.to_path_buf(),
        line,
        source,
    }
}

/// Read every record of a JSON-lines file.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut records = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err(path))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line).map_err(json_err(path, idx + 1))?);
    }

    debug!(path = %path.display(), records = records.len(), "Read JSON-lines table");
    Ok(records)
}

pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);

    for (idx, record) in records.iter().enumerate() {
        serde_json::to_writer(&mut writer, record).map_err(json_err(path, idx + 1))?;
        writer.write_all(b"\n").map_err(io_err(path))?;
    }
    writer.flush().map_err(io_err(path))?;

    info!(path = %path.display(), records = records.len(), "Wrote JSON-lines table");
    Ok(())
}

/// Serialize `value` to `path` atomically.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    create_parent(path)?;
    let tmp = tmp_path(path);

    {
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value).map_err(json_err(&tmp, 1))?;
        writer.flush().map_err(io_err(&tmp))?;
        writer.get_ref().sync_all().map_err(io_err(&tmp))?;
    }

    fs::rename(&tmp, path).map_err(io_err(path))?;
    info!(path = %path.display(), "Saved artifact");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(io_err(path))?;
    let value = serde_json::from_reader(BufReader::new(file)).map_err(json_err(path, 1))?;
    info!(path = %path.display(), "Loaded artifact");
    Ok(value)
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_err(parent))
        }
        _ => Ok(()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TruthPair;
    use tempfile::tempdir;

    #[test]
    fn test_jsonl_round_trip_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truth.jsonl");
        let pairs = vec![
            TruthPair { user_id: 1, item_id: 2 },
            TruthPair { user_id: 3, item_id: 4 },
        ];
        write_jsonl(&path, &pairs).unwrap();

        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("\n\n");
        fs::write(&path, text).unwrap();

        let back: Vec<TruthPair> = read_jsonl(&path).unwrap();
        assert_eq!(back, pairs);
    }

    #[test]
    fn test_bad_line_reports_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"user_id\":1,\"item_id\":2}\nnot json\n").unwrap();

        let err = read_jsonl::<TruthPair>(&path).unwrap_err();
        assert!(matches!(err, StorageError::Json { line: 2, .. }));
    }

    #[test]
    fn test_atomic_save_creates_dirs_and_leaves_no_tmp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        save_json_atomic(&path, &vec![1, 2, 3]).unwrap();

        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
        let back: Vec<i32> = load_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_json::<Vec<i32>>(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
