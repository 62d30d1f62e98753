use std::error::Error;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use log::{debug, error, info};
use serde::Deserialize;

use super::errors::TransferError;
use super::file_info::{FileInfo, FileMap};

pub const HEADER: [&str; 5] = ["File", "Hash(MD5)", "Size(bytes)", "Date", "Destination"];
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Deserialize)]
struct HistoricRow {
    #[serde(rename = "File")]
    file: String,
    #[serde(rename = "Hash(MD5)")]
    md5: String,
    #[serde(rename = "Size(bytes)")]
    size: u64,
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "Destination", default)]
    destination: Option<String>,
}

/// Reads a tab separated historic transfer log.
pub fn read_historic_log<R: Read>(input: R) -> Result<FileMap, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(input);
    let headers = rdr.byte_headers()?.clone();
    let mut raw_record = csv::ByteRecord::new();
    let mut files = FileMap::new();

    while rdr.read_byte_record(&mut raw_record)? {
        let row: HistoricRow = raw_record.deserialize(Some(&headers))?;
        let mut info = FileInfo::new(&row.file, &row.md5, row.size);
        info.date = row.date;
        info.destination = row.destination;
        files.insert(row.file, info);
    }
    Ok(files)
}

pub fn read_historic_log_file(hist: &Path) -> Result<FileMap, Box<dyn Error>> {
    let files = read_historic_log(File::open(hist)?)?;
    info!("Historic log {} lists {} files.", hist.display(), files.len());
    Ok(files)
}

/// Writes the previous entries unchanged, then the newly transferred ones stamped with `stamp`.
pub fn write_historic_log<W: Write>(output: W, previous: &FileMap, transferred: &FileMap, stamp: &str)
    -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(output);
    wtr.write_record(&HEADER)?;

    for info in previous.values() {
        wtr.write_record(&[
            info.source.as_str(),
            info.md5.as_str(),
            info.size.to_string().as_str(),
            info.date.as_deref().unwrap_or(""),
            info.destination.as_deref().unwrap_or(""),
        ])?;
    }
    for info in transferred.values() {
        wtr.write_record(&[
            info.source.as_str(),
            info.md5.as_str(),
            info.size.to_string().as_str(),
            stamp,
            info.destination.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_historic_log_file(hist: &Path, previous: &FileMap, transferred: &FileMap) -> Result<(), Box<dyn Error>> {
    let stamp = chrono::Local::now().format(DATE_FORMAT).to_string();
    write_historic_log(File::create(hist)?, previous, transferred, &stamp)?;
    debug!("Historic log {} written with {} new entries.", hist.display(), transferred.len());
    Ok(())
}

/// Moves the current historic log aside before it is rewritten.
pub fn rotate_historic_log(hist: &Path, hist_temp: &Path) -> Result<(), Box<dyn Error>> {
    if hist_temp.exists() {
        error!("Error in making temp historic log copy. The destination file already exists: {}", hist_temp.display());
        return Err(Box::new(TransferError::TempLogExists(hist_temp.display().to_string())));
    }
    if hist.exists() {
        fs::rename(hist, hist_temp)?;
        info!("Historic log {} moved to {}", hist.display(), hist_temp.display());
    }
    Ok(())
}

pub fn default_historic_log_name(tumor: &str) -> String {
    format!("new_historic_log_{}_{}.txt", tumor, chrono::Local::now().format("%m-%d-%Y-%H-%M-%S"))
}
