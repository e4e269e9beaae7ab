//! CSV upload reader
//!
//! Turns a delimited upload into header → cell maps. No typing happens here;
//! header normalization and validation are the pipeline's job.

use std::io::Read;
use std::path::Path;

use crate::error::ImportResult;
use crate::models::RawRow;

/// Read every record of a CSV upload
///
/// Short records are allowed; missing trailing cells are simply absent.
pub fn read_rows<R: Read>(reader: R) -> ImportResult<Vec<RawRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Read a CSV upload from disk
pub fn read_rows_from_path(path: &Path) -> ImportResult<Vec<RawRow>> {
    let file = std::fs::File::open(path).map_err(registry_common::Error::Io)?;
    read_rows(std::io::BufReader::new(file))
}
