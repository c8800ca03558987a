//! Optional Parquet intermediate dialect (spec.md §4.3, SPEC_FULL.md §D),
//! gated behind the `intermediate-parquet` feature so the default CSV path
//! carries no dependency on the `parquet` crate. Grounded in `estuary-flow`'s
//! use of `parquet` for its own columnar intermediate format.

#![cfg(feature = "intermediate-parquet")]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use crate::errors::Error;

/// A chunked Parquet writer for a single table, rotating on the same
/// row/byte thresholds as `ChunkedCsvWriter`. The row-group schema is
/// supplied by the caller as a Parquet message-type string, since each
/// destination table has its own fixed column set (spec.md §3).
pub struct ChunkedParquetWriter {
    directory: PathBuf,
    table: String,
    schema: String,
    chunk_size: usize,
    chunk_index: u32,
    pub written_files: Vec<PathBuf>,
}

impl ChunkedParquetWriter {
    pub fn new(directory: impl Into<PathBuf>, table: impl Into<String>, schema: impl Into<String>, chunk_size: usize) -> Self {
        ChunkedParquetWriter {
            directory: directory.into(),
            table: table.into(),
            schema: schema.into(),
            chunk_size,
            chunk_index: 0,
            written_files: Vec::new(),
        }
    }

    /// Opens a fresh chunk file and returns a `SerializedFileWriter` the
    /// caller writes row groups into directly; rotation between chunks is
    /// driven by the caller counting rows against `chunk_size`, since the
    /// column-oriented writer API does not expose a per-row hook the way
    /// `csv::Writer` does.
    pub fn open_chunk(&mut self) -> Result<SerializedFileWriter<File>, Error> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(format!("{}.{:05}.parquet", self.table, self.chunk_index));
        let schema = parse_message_type(&self.schema)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;
        let file = File::create(&path)?;
        let props = Arc::new(WriterProperties::builder().build());
        let writer = SerializedFileWriter::new(file, Arc::new(schema), props)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        self.written_files.push(path);
        self.chunk_index += 1;
        Ok(writer)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn table_directory(base: &Path, table: &str) -> PathBuf {
        base.join(table)
    }
}
