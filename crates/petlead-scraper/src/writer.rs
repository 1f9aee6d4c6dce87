//! CSV persistence of one site's deduplicated records.
//!
//! Each non-empty result lands in `<dir>/<site_id>_<YYYYMMDD_HHMMSS>.csv`.
//! The file is written to a temporary sibling first and then linked into
//! place without replacing anything already there, so a reader never sees a
//! half-written file and an earlier output is never overwritten.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use petlead_core::{StoreRecord, PROVENANCE_COLUMNS};
use tempfile::NamedTempFile;

use crate::error::WriteError;

/// Numbered suffixes tried before giving up on a free file name.
const MAX_NAME_TRIES: u32 = 100;

#[derive(Debug, Clone)]
pub struct ResultWriter {
    directory: PathBuf,
}

impl ResultWriter {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Output columns: every record key in first-seen order, then the
    /// provenance columns. A record key that collides with a provenance
    /// column is dropped in favour of the provenance value.
    #[must_use]
    pub fn columns(records: &[StoreRecord]) -> Vec<String> {
        let mut keys: IndexSet<&str> = IndexSet::new();
        for record in records {
            keys.extend(record.keys().filter(|k| !PROVENANCE_COLUMNS.contains(k)));
        }
        keys.into_iter()
            .chain(PROVENANCE_COLUMNS)
            .map(str::to_string)
            .collect()
    }

    /// Write `records` for `site_id`, timestamped with `run_started`.
    ///
    /// Returns `Ok(None)` without touching the file system when there is
    /// nothing to write.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] if the directory cannot be created, the CSV
    /// cannot be written, or no free file name is found.
    pub fn write(
        &self,
        site_id: &str,
        run_started: DateTime<Utc>,
        records: &[StoreRecord],
    ) -> Result<Option<PathBuf>, WriteError> {
        if records.is_empty() {
            tracing::warn!(site = site_id, "no data to save");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.directory).map_err(|source| WriteError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(|source| WriteError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let tmp_path = tmp.path().to_path_buf();
        write_csv(tmp.as_file_mut(), records).map_err(|source| WriteError::Csv {
            path: tmp_path.clone(),
            source,
        })?;
        tmp.as_file().sync_all().map_err(|source| WriteError::Io {
            path: tmp_path,
            source,
        })?;

        let stem = format!("{site_id}_{}", run_started.format("%Y%m%d_%H%M%S"));
        for n in 0..MAX_NAME_TRIES {
            let path = if n == 0 {
                self.directory.join(format!("{stem}.csv"))
            } else {
                self.directory.join(format!("{stem}_{n}.csv"))
            };
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(
                        site = site_id,
                        path = %path.display(),
                        records = records.len(),
                        "saved records"
                    );
                    return Ok(Some(path));
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                }
                Err(e) => {
                    return Err(WriteError::Io {
                        path,
                        source: e.error,
                    })
                }
            }
        }

        Err(WriteError::NameExhausted {
            path: self.directory.join(format!("{stem}.csv")),
            tries: MAX_NAME_TRIES,
        })
    }
}

fn write_csv<W: std::io::Write>(out: W, records: &[StoreRecord]) -> Result<(), csv::Error> {
    let columns = ResultWriter::columns(records);
    let field_columns = &columns[..columns.len() - PROVENANCE_COLUMNS.len()];

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;
    for record in records {
        let row = field_columns
            .iter()
            .map(|c| record.get(c).unwrap_or_default().to_string())
            .chain(record.provenance.values());
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
