use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{debug, info, warn};

use super::drive::DriveOperationError;
use super::record::SubmissionRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Append-only sink for completed submissions.
pub trait SubmissionStore: Send + Sync {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError>;
}

impl<T: SubmissionStore + ?Sized> SubmissionStore for Box<T> {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        (**self).append(record)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("submission store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("submission store csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("stored header column {column} is '{found}' but the record has '{expected}'")]
    HeaderMismatch {
        column: usize,
        expected: String,
        found: String,
    },
    #[error("submission store unavailable: {0}")]
    Unavailable(String),
}

/// Local CSV file with one row per submission, opened by spreadsheet tools via its BOM.
#[derive(Debug)]
pub struct CsvSubmissionStore {
    path: PathBuf,
    backup_dir: Option<PathBuf>,
    lock: Mutex<()>,
}

impl CsvSubmissionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: None,
            lock: Mutex::new(()),
        }
    }

    /// Copy the whole file into `dir` after every successful append.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored rows keyed by header.
    pub fn rows(&self) -> Result<Vec<BTreeMap<String, String>>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|header| strip_bom(header).to_string())
            .collect();

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            rows.push(
                headers
                    .iter()
                    .cloned()
                    .zip(row.iter().map(str::to_string))
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn is_blank(&self) -> Result<bool, PersistenceError> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len() == 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    fn stored_header(&self) -> Result<Option<Vec<String>>, PersistenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        let mut first = csv::StringRecord::new();
        if !reader.read_record(&mut first)? {
            return Ok(None);
        }
        Ok(Some(
            first
                .iter()
                .map(|header| strip_bom(header).to_string())
                .collect(),
        ))
    }

    fn check_header(stored: &[String], record: &SubmissionRecord) -> Result<(), PersistenceError> {
        let expected = record.headers();
        let width = stored.len().max(expected.len());
        for column in 0..width {
            let found = stored.get(column).map(String::as_str).unwrap_or("");
            let wanted = expected.get(column).copied().unwrap_or("");
            if found != wanted {
                return Err(PersistenceError::HeaderMismatch {
                    column: column + 1,
                    expected: wanted.to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }

    fn snapshot(&self, dir: &Path) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(dir)?;
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("submissions");
        let target = dir.join(format!(
            "{stem}_{}.csv",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        fs::copy(&self.path, &target)?;
        Ok(target)
    }
}

impl SubmissionStore for CsvSubmissionStore {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".to_string()))?;

        let blank = self.is_blank()?;
        let header = if blank { None } else { self.stored_header()? };
        if let Some(stored) = &header {
            Self::check_header(stored, record)?;
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if blank {
            file.write_all(UTF8_BOM)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if header.is_none() {
            writer.write_record(record.headers())?;
        }
        writer.write_record(record.values())?;
        writer.flush()?;

        info!(
            columns = record.len(),
            path = %self.path.display(),
            "submission appended"
        );

        if let Some(dir) = &self.backup_dir {
            match self.snapshot(dir) {
                Ok(target) => debug!(backup = %target.display(), "backup snapshot written"),
                Err(err) => warn!(error = %err, "backup snapshot failed; row is already stored"),
            }
        }

        Ok(())
    }
}

fn strip_bom(value: &str) -> &str {
    value.trim_start_matches('\u{feff}')
}

/// Copies the local store to an external spreadsheet.
pub trait SpreadsheetMirror: Send + Sync {
    fn sync(&self, csv_path: &Path) -> Result<(), MirrorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("unable to read local store for mirroring: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Drive(#[from] DriveOperationError),
}

/// CSV store whose file is mirrored after every append. Only the local append decides success.
pub struct MirroredSubmissionStore<M> {
    store: CsvSubmissionStore,
    mirror: M,
}

impl<M: SpreadsheetMirror> MirroredSubmissionStore<M> {
    pub fn new(store: CsvSubmissionStore, mirror: M) -> Self {
        Self { store, mirror }
    }

    pub fn store(&self) -> &CsvSubmissionStore {
        &self.store
    }
}

impl<M: SpreadsheetMirror> SubmissionStore for MirroredSubmissionStore<M> {
    fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        self.store.append(record)?;

        if let Err(err) = self.mirror.sync(self.store.path()) {
            warn!(error = %err, "spreadsheet mirror failed; local row kept");
        }
        Ok(())
    }
}
