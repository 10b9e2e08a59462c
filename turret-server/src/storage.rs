//! Calibration persistence.
//!
//! One JSON document per installation, holding every named calibration, the
//! same `directories`-resolved-base-path plus in-memory-cache-over-
//! `serde_json` shape the original `LocalStorage` used for applicationData.
//!
//! Storage path: `<data-dir>/turret/calibrations.json`

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use log::{debug, info, warn};
use thiserror::Error;

use turret_core::calibration::CalibrationRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create calibration directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read calibration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse calibration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write calibration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk document shape: a schema version plus a map of calibration name
/// to its full record.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CalibrationDocument {
    pub schema_version: String,
    pub calibrations: HashMap<String, CalibrationRecord>,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "turret")
}

fn document_path(base_dir: &PathBuf) -> PathBuf {
    let mut path = base_dir.clone();
    path.push("turret");
    path.push("calibrations.json");
    path
}

/// Calibration store: loads the whole document into memory on open, writes
/// the whole document back on every save (it is small — a handful of named
/// calibrations, each a handful of points).
pub struct CalibrationStore {
    path: PathBuf,
    document: CalibrationDocument,
}

impl CalibrationStore {
    /// Open the default (directories-resolved) calibration file, creating an
    /// empty document if none exists yet.
    pub fn open_default() -> Result<Self, StorageError> {
        let base_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::open(document_path(&base_dir))
    }

    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if !path.exists() {
            debug!("no calibration file at {}, starting empty", path.display());
            return Ok(CalibrationStore {
                path,
                document: CalibrationDocument {
                    schema_version: turret_core::calibration::SCHEMA_VERSION.to_string(),
                    calibrations: HashMap::new(),
                },
            });
        }

        let file = fs::File::open(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        let document: CalibrationDocument =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| StorageError::Parse {
                path: path.clone(),
                source,
            })?;
        info!("loaded {} calibration(s) from {}", document.calibrations.len(), path.display());
        Ok(CalibrationStore { path, document })
    }

    pub fn get(&self, name: &str) -> Option<&CalibrationRecord> {
        self.document.calibrations.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.document.calibrations.keys().cloned().collect()
    }

    /// Insert or overwrite a calibration and persist the whole document.
    pub fn save(&mut self, record: CalibrationRecord) -> Result<(), StorageError> {
        self.document.calibrations.insert(record.name.clone(), record);
        self.flush()
    }

    pub fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        self.document.calibrations.remove(name);
        self.flush()
    }

    fn flush(&self) -> Result<(), StorageError> {
        let file = fs::File::create(&self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.document).map_err(|e| StorageError::Write {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
        if let Err(e) = writer.write_all(b"\n") {
            warn!("failed to write trailing newline to {}: {}", self.path.display(), e);
        }
        writer.flush().map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!("saved calibration document to {}", self.path.display());
        Ok(())
    }
}
