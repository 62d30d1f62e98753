use std::collections::BTreeMap;
use std::error::Error;
use std::io::Read;
use log::error;
use serde::Deserialize;

use super::errors::TransferError;
use super::file_info::{FileInfo, FileMap};

const OK: &str = "OK";

/// One row of a `gsutil cp -L` manifest. Columns are matched by header name.
#[derive(Debug, Deserialize)]
struct GsLogRow {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Md5")]
    md5: String,
    #[serde(rename = "Source Size", default)]
    size: Option<u64>,
    #[serde(rename = "End", default)]
    end: Option<String>,
    #[serde(rename = "Result")]
    result: String,
}

impl GsLogRow {
    fn is_ok(&self) -> bool {
        self.result == OK
    }
}

fn read_rows<R: Read>(input: R) -> Result<Vec<GsLogRow>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let headers = rdr.byte_headers()?.clone();
    let mut raw_record = csv::ByteRecord::new();
    let mut rows = Vec::new();

    while rdr.read_byte_record(&mut raw_record)? {
        let row: GsLogRow = raw_record.deserialize(Some(&headers))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Source to md5 of every transferred file. Any row that is not OK fails the read.
pub fn read_gs_log<R: Read>(input: R) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
    let mut failed = Vec::new();
    let mut transferred = BTreeMap::new();
    for row in read_rows(input)? {
        if !row.is_ok() {
            error!("The following file is not OK: {}", row.source);
            failed.push(row.source.clone());
        }
        transferred.insert(row.source, row.md5);
    }
    if !failed.is_empty() {
        return Err(Box::new(TransferError::FailedTransfers(failed)));
    }
    Ok(transferred)
}

pub fn check_gs_log<R: Read>(input: R) -> Result<usize, Box<dyn Error>> {
    match read_gs_log(input) {
        Ok(transferred) => Ok(transferred.len()),
        Err(e) => match e.downcast::<TransferError>() {
            Ok(te) => match *te {
                TransferError::FailedTransfers(files) => Err(Box::new(TransferError::NotOkDuringCheck(files))),
                other => Err(Box::new(other)),
            },
            Err(e) => Err(e),
        },
    }
}

/// Turns the rows of a gsutil log into historic log entries, keeping their end date.
pub fn gs_log_to_file_map<R: Read>(input: R) -> Result<FileMap, Box<dyn Error>> {
    let mut files = FileMap::new();
    for row in read_rows(input)? {
        if !row.is_ok() {
            error!("The following file is not OK: {}", row.source);
            return Err(Box::new(TransferError::NotOkDuringConversion(row.source)));
        }
        let mut info = FileInfo::new(&row.source, &row.md5, row.size.unwrap_or(0));
        info.date = row.end;
        files.insert(row.source, info);
    }
    Ok(files)
}
