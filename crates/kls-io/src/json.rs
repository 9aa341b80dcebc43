//! JSON persistence for configuration files.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{IoError, Result};

/// Read and deserialize a JSON document.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serialize a value as pretty-printed JSON, creating parent directories.
pub fn save_config<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<f64>,
    }

    #[test]
    fn config_roundtrip_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("sample.json");
        let sample = Sample {
            name: "plate".to_string(),
            values: vec![0.5, -1.0e-3],
        };

        save_config(&path, &sample).expect("save should succeed");
        let loaded: Sample = load_config(&path).expect("load should succeed");
        assert_eq!(loaded, sample);
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        let err = load_config::<Sample>(&path).expect_err("missing file should fail");
        assert!(matches!(err, IoError::FileNotFound(p) if p.ends_with("absent.json")));
    }

    #[test]
    fn malformed_payload_is_a_json_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").expect("write payload");
        let err = load_config::<Sample>(&path).expect_err("invalid JSON should fail");
        assert!(matches!(err, IoError::Json(_)));
    }
}
