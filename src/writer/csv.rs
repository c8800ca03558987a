//! CSV dialect for the intermediate files (spec.md §4.3): RFC 4180 quoting
//! via the `csv` crate's defaults, `\N` as the null sentinel (matching
//! PostgreSQL's `COPY ... WITH NULL '\N'` default so the loader's `COPY`
//! step needs no dialect translation), `t`/`f` for booleans, and ISO 8601
//! dates. Grounded in the teacher's use of `csv::Writer` throughout
//! `loggers/*.rs`, generalized here into one chunk-rotating writer shared by
//! every table instead of one writer per logger.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use csv::{Writer, WriterBuilder};
use serde::{Serialize, Serializer};

use crate::errors::Error;

pub const NULL_SENTINEL: &str = "\\N";

/// `#[serde(serialize_with = "...")]` helpers so every row struct can go
/// straight through `writer.serialize(row)` (the teacher's idiom) while
/// still landing on the reference loader's `COPY` dialect: `\N` for null,
/// `t`/`f` for booleans, ISO 8601 for dates. Plain serde defaults would emit
/// an empty string for `None` and `true`/`false` for `bool`, which the
/// reference loader's `COPY ... WITH NULL '\N'` does not accept.
pub fn serialize_opt_string<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(v),
        None => serializer.serialize_str(NULL_SENTINEL),
    }
}

pub fn serialize_opt_date<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_str(NULL_SENTINEL),
    }
}

pub fn serialize_opt_decimal<S: Serializer>(value: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_str(&d.to_string()),
        None => serializer.serialize_str(NULL_SENTINEL),
    }
}

pub fn serialize_bool_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "t" } else { "f" })
}

/// A chunked CSV writer for a single table. Rotates to a new file once
/// either `chunk_size` rows or `chunk_bytes` bytes have been written to the
/// current chunk, per spec.md §4.3's "Batching policy".
pub struct ChunkedCsvWriter {
    directory: PathBuf,
    table: String,
    chunk_size: usize,
    chunk_bytes: u64,
    chunk_index: u32,
    rows_in_chunk: usize,
    bytes_in_chunk: u64,
    current: Option<Writer<BufWriter<File>>>,
    pub written_files: Vec<PathBuf>,
}

impl ChunkedCsvWriter {
    pub fn new(directory: impl Into<PathBuf>, table: impl Into<String>, chunk_size: usize, chunk_bytes: u64) -> Self {
        ChunkedCsvWriter {
            directory: directory.into(),
            table: table.into(),
            chunk_size,
            chunk_bytes,
            chunk_index: 0,
            rows_in_chunk: 0,
            bytes_in_chunk: 0,
            current: None,
            written_files: Vec::new(),
        }
    }

    pub fn write_row<T: Serialize>(&mut self, row: &T) -> Result<(), Error> {
        if let Err(e) = self.try_write_row(row) {
            // spec.md §4.3 "Failure": on any write error the writer
            // finalizes and deletes partial chunks for the current table
            // before surfacing the error; already-rotated chunks stay put
            // for inspection, only the in-progress one is discarded.
            self.discard_current_chunk();
            return Err(e);
        }
        Ok(())
    }

    fn try_write_row<T: Serialize>(&mut self, row: &T) -> Result<(), Error> {
        self.ensure_open()?;
        let writer = self.current.as_mut().expect("ensure_open just populated this");
        let before = writer.get_ref().get_ref().metadata().map(|m| m.len()).unwrap_or(0);
        writer.serialize(row)?;
        writer.flush()?;
        let after = writer.get_ref().get_ref().metadata().map(|m| m.len()).unwrap_or(before);
        self.bytes_in_chunk += after.saturating_sub(before);
        self.rows_in_chunk += 1;

        if self.rows_in_chunk >= self.chunk_size || self.bytes_in_chunk >= self.chunk_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn discard_current_chunk(&mut self) {
        if self.current.take().is_some() {
            let path = self.chunk_path();
            self.written_files.retain(|p| p != &path);
            std::fs::remove_file(&path).ok();
        }
    }

    pub fn finish(mut self) -> Result<Vec<PathBuf>, Error> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        Ok(self.written_files)
    }

    fn ensure_open(&mut self) -> Result<(), Error> {
        if self.current.is_some() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.directory)?;
        let path = self.chunk_path();
        let file = File::create(&path)?;
        // No header row: the reference loader's `COPY ... (FORMAT csv)`
        // defaults to `HEADER false`, so a header here would be parsed as a
        // data row and abort the load on the first line of every chunk.
        self.current = Some(WriterBuilder::new().has_headers(false).from_writer(BufWriter::new(file)));
        self.written_files.push(path);
        self.rows_in_chunk = 0;
        self.bytes_in_chunk = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), Error> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        self.chunk_index += 1;
        Ok(())
    }

    fn chunk_path(&self) -> PathBuf {
        self.directory.join(format!("{}.{:05}.csv", self.table, self.chunk_index))
    }
}

pub fn table_directory(base: &Path, table: &str) -> PathBuf {
    base.join(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(serde::Serialize)]
    struct Row {
        a: i32,
        b: String,
    }

    #[test]
    fn rotates_chunks_by_row_count() {
        let dir = tempdir().unwrap();
        let mut writer = ChunkedCsvWriter::new(dir.path(), "widgets", 2, u64::MAX);
        for i in 0..5 {
            writer.write_row(&Row { a: i, b: "x".to_string() }).unwrap();
        }
        let files = writer.finish().unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn chunk_files_carry_no_header_row() {
        // Postgres's `COPY ... (FORMAT csv)` defaults to HEADER false; a
        // header row here would be parsed as a data row and fail the load.
        let dir = tempdir().unwrap();
        let mut writer = ChunkedCsvWriter::new(dir.path(), "widgets", 10, u64::MAX);
        writer.write_row(&Row { a: 1, b: "x".to_string() }).unwrap();
        writer.write_row(&Row { a: 2, b: "y".to_string() }).unwrap();
        let files = writer.finish().unwrap();
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(contents, "1,x\n2,y\n");
    }

    /// A row whose `Serialize` impl always fails, used to exercise the
    /// spec.md §4.3 "Failure" cleanup path without needing a real I/O error.
    struct PoisonRow;

    impl Serialize for PoisonRow {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("poison"))
        }
    }

    #[test]
    fn write_failure_deletes_only_the_in_progress_chunk() {
        let dir = tempdir().unwrap();
        let mut writer = ChunkedCsvWriter::new(dir.path(), "widgets", 1, u64::MAX);
        // chunk_size=1 rotates (finalizes) after every row, so this leaves
        // chunk .00000.csv closed on disk before the failing write begins
        // a fresh chunk .00001.csv.
        writer.write_row(&Row { a: 1, b: "x".to_string() }).unwrap();
        let finalized_chunk = dir.path().join("widgets.00000.csv");
        assert!(finalized_chunk.exists());

        let err = writer.write_row(&PoisonRow);
        assert!(err.is_err());

        let failing_chunk = dir.path().join("widgets.00001.csv");
        assert!(!failing_chunk.exists(), "partial chunk for the failed write should be deleted");
        assert!(finalized_chunk.exists(), "previously finalized chunks must survive a later failure");
    }

    #[test]
    fn null_sentinel_matches_postgres_default() {
        assert_eq!(NULL_SENTINEL, "\\N");
    }

    #[test]
    fn opt_string_serializes_none_as_null_sentinel() {
        #[derive(serde::Serialize)]
        struct Row {
            #[serde(serialize_with = "serialize_opt_string")]
            name: Option<String>,
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(Row { name: None }).unwrap();
        writer.serialize(Row { name: Some("x".to_string()) }).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "name\n\\N\nx\n");
    }

    #[test]
    fn bool_flag_renders_single_char() {
        #[derive(serde::Serialize)]
        struct Row {
            #[serde(serialize_with = "serialize_bool_flag")]
            active: bool,
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(Row { active: true }).unwrap();
        writer.serialize(Row { active: false }).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "active\nt\nf\n");
    }
}
