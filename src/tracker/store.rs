use crate::error::Result;
use crate::models::OperationRecord;
use crate::paths;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StatusFile<R> {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    records: Vec<R>,
}

#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record. A missing file is an empty map; a corrupt file
    /// is moved aside to `.bak` and also treated as empty. Records that do
    /// not parse on their own are skipped.
    pub fn load(&self) -> Result<Vec<OperationRecord>> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<StatusFile<Value>>(&content) {
            Ok(file) => {
                if file.version > FORMAT_VERSION {
                    tracing::warn!(
                        version = file.version,
                        path = %self.path.display(),
                        "Running status file was written by a newer version",
                    );
                }
                Ok(file
                    .records
                    .into_iter()
                    .filter_map(|raw| match serde_json::from_value(raw) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                path = %self.path.display(),
                                "Skipping unreadable running status record",
                            );
                            None
                        }
                    })
                    .collect())
            }
            Err(e) => {
                let bak_path = self.path.with_extension("bak");
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    bak = %bak_path.display(),
                    "Corrupt running status file, moving to .bak and starting empty",
                );
                std::fs::rename(&self.path, &bak_path)?;
                Ok(Vec::new())
            }
        }
    }

    pub fn save<'a>(&self, records: impl IntoIterator<Item = &'a OperationRecord>) -> Result<()> {
        let file = StatusFile::<OperationRecord> {
            version: FORMAT_VERSION,
            records: records.into_iter().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        paths::write_file_atomic(&self.path, &json)
    }
}
