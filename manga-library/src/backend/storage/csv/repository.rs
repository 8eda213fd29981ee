//! # CSV Record Repository
//!
//! One repository per collection file. Every mutation reads the whole file,
//! applies the change in memory and writes the whole file back through a
//! temp file and rename, so a crash mid-write leaves the previous version.
//!
//! ## CSV Format
//!
//! ```csv
//! id,title,author,genre,volume,status,notes,cover_image_ref,year,created_at
//! library::6f1c...,"Yotsuba&!",Kiyohiko Azuma,Comedy,1,reading,"Gift from ""Sam""",,2003,2024-05-01T10:00:00.000000000Z
//! ```
//!
//! Columns this version does not know about are written back after the known
//! ones with their cells unchanged.

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Writer};
use log::{debug, warn};
use shared::ItemQuery;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::codec::{ColumnMap, CsvRecord};
use super::connection::CsvConnection;
use crate::backend::domain::models::{sort_records, Record};
use crate::backend::storage::error::{StorageError, StorageResult};
use crate::backend::storage::traits::{check_bulk, check_record, RecordStorage};

/// Whole contents of one collection file
pub(super) struct CsvTable<R> {
    pub(super) records: Vec<R>,
    /// Header names after the known columns
    extra_columns: Vec<String>,
    /// Cells of `extra_columns`, keyed by record id
    extra_cells: HashMap<String, Vec<String>>,
}

impl<R: CsvRecord> CsvTable<R> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            extra_columns: Vec::new(),
            extra_cells: HashMap::new(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    fn header(&self) -> Vec<&str> {
        R::COLUMNS
            .iter()
            .copied()
            .chain(self.extra_columns.iter().map(String::as_str))
            .collect()
    }

    /// Known fields followed by the record's extra cells, blank for new records
    fn row(&self, record: &R) -> Vec<String> {
        let mut row = record.to_row();
        match self.extra_cells.get(record.id()) {
            Some(cells) => row.extend(cells.iter().cloned()),
            None => row.resize(R::COLUMNS.len() + self.extra_columns.len(), String::new()),
        }
        row
    }
}

/// CSV-backed storage for one collection
pub struct CsvRepository<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: CsvRecord> CsvRepository<R> {
    pub fn new(connection: &CsvConnection) -> Self {
        Self {
            path: connection.file_path(R::COLLECTION),
            _record: PhantomData,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> StorageResult<Vec<R>> {
        Ok(self.read_table()?.records)
    }

    /// Read every row in file order. A missing file is an empty collection.
    pub(super) fn read_table(&self) -> StorageResult<CsvTable<R>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CsvTable::empty()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(BufReader::new(file));

        let header = reader.headers().map_err(|e| self.csv_error(e))?.clone();
        if header.is_empty() {
            return Ok(CsvTable::empty());
        }

        let (columns, extra_columns) = ColumnMap::from_header(&header, &R::COLUMNS)
            .map_err(|message| self.parse_error(1, message))?;
        if !extra_columns.is_empty() {
            warn!(
                "Unknown columns {:?} in {} are kept but not used",
                extra_columns,
                self.path.display()
            );
        }

        let mut records = Vec::new();
        let mut extra_cells = HashMap::new();
        let mut seen = HashSet::new();
        let mut row = StringRecord::new();
        while reader.read_record(&mut row).map_err(|e| self.csv_error(e))? {
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let record = R::from_row(&columns, &row).map_err(|message| self.parse_error(line, message))?;
            if !seen.insert(record.id().to_string()) {
                return Err(self.parse_error(line, format!("duplicate id '{}'", record.id())));
            }
            if !extra_columns.is_empty() {
                let cells = extra_columns
                    .iter()
                    .map(|column| columns.value(&row, column).to_string())
                    .collect();
                extra_cells.insert(record.id().to_string(), cells);
            }
            records.push(record);
        }

        debug!("Read {} rows from {}", records.len(), self.path.display());
        Ok(CsvTable {
            records,
            extra_columns,
            extra_cells,
        })
    }

    /// Current contents with `batch` appended. Fails with `Duplicate` if any
    /// id is already in the file.
    pub(super) fn appended(&self, batch: &[R]) -> StorageResult<CsvTable<R>> {
        let mut table = self.read_table()?;
        if let Some(clash) = batch.iter().find(|r| table.contains(r.id())) {
            return Err(StorageError::Duplicate {
                collection: R::COLLECTION,
                id: clash.id().to_string(),
            });
        }
        table.records.extend(batch.iter().cloned());
        Ok(table)
    }

    /// Replace the file with `table`. The original stays untouched unless
    /// the new contents were fully written and synced.
    pub(super) fn write_table(&self, table: &CsvTable<R>) -> StorageResult<()> {
        let temp_path = self.path.with_extension("csv.tmp");

        if let Err(e) = Self::write_temp_file(&temp_path, table) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        "Could not remove temp file {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
            }
            return Err(e);
        }

        fs::rename(&temp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = sync_directory(parent) {
                warn!("Could not sync directory {}: {}", parent.display(), e);
            }
        }

        debug!("Wrote {} rows to {}", table.records.len(), self.path.display());
        Ok(())
    }

    fn write_temp_file(temp_path: &Path, table: &CsvTable<R>) -> StorageResult<()> {
        let file = File::create(temp_path).map_err(|e| StorageError::io(temp_path, e))?;
        {
            let mut writer = Writer::from_writer(&file);
            let csv_error = |source| StorageError::Csv {
                path: temp_path.to_path_buf(),
                source,
            };

            writer.write_record(table.header()).map_err(csv_error)?;
            for record in &table.records {
                writer.write_record(table.row(record)).map_err(csv_error)?;
            }
            writer.flush().map_err(|e| StorageError::io(temp_path, e))?;
        }
        file.sync_all().map_err(|e| StorageError::io(temp_path, e))
    }

    fn parse_error(&self, line: u64, message: String) -> StorageError {
        StorageError::Parse {
            path: self.path.clone(),
            line,
            message,
        }
    }

    /// Malformed content becomes a parse error, everything else stays an I/O failure
    fn csv_error(&self, error: csv::Error) -> StorageError {
        if error.is_io_error() {
            return StorageError::Csv {
                path: self.path.clone(),
                source: error,
            };
        }
        let line = error.position().map(|p| p.line()).unwrap_or(0);
        self.parse_error(line, error.to_string())
    }

    fn not_found(id: &str) -> StorageError {
        StorageError::NotFound {
            collection: R::COLLECTION,
            id: id.to_string(),
        }
    }
}

/// Flush the directory entry so the rename survives a power loss
#[cfg(unix)]
fn sync_directory(path: &Path) -> std::io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl<R: CsvRecord> RecordStorage<R> for CsvRepository<R> {
    async fn load(&self) -> StorageResult<Vec<R>> {
        self.read_records()
    }

    async fn get(&self, id: &str) -> StorageResult<Option<R>> {
        Ok(self.read_records()?.into_iter().find(|r| r.id() == id))
    }

    async fn query(&self, query: &ItemQuery) -> StorageResult<Vec<R>> {
        let mut records: Vec<R> = self
            .read_records()?
            .into_iter()
            .filter(|r| r.matches(query))
            .collect();
        sort_records(&mut records, query.order);
        Ok(records)
    }

    async fn store(&self, record: &R) -> StorageResult<()> {
        check_record(record)?;
        let table = self.appended(std::slice::from_ref(record))?;
        self.write_table(&table)
    }

    async fn update(&self, record: &R) -> StorageResult<()> {
        check_record(record)?;
        let mut table = self.read_table()?;
        let slot = table
            .records
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| Self::not_found(record.id()))?;
        *slot = record.clone();
        self.write_table(&table)
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let mut table = self.read_table()?;
        let index = table
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| Self::not_found(id))?;
        table.records.remove(index);
        self.write_table(&table)
    }

    async fn store_batch(&self, records: &[R]) -> StorageResult<()> {
        check_bulk(records)?;
        let table = self.appended(records)?;
        self.write_table(&table)
    }
}
