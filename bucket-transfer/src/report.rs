use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use itertools::Itertools;
use log::info;

use super::file_info::{self, FileMap};

const GSUTIL_COMMAND: &str = "gsutil -m cp -r -L";
const BYTES_IN_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One `gsutil cp` line per file with a destination. `date` names the manifest file.
pub fn make_gsutil_command<W: Write>(output: &mut W, tumor: &str, files: &FileMap, date: &str)
    -> Result<usize, Box<dyn Error>> {
    let mut count = 0;
    for info in files.values() {
        if let Some(destination) = info.destination.as_ref() {
            writeln!(output, "{} {}-{}.txt {} {}", GSUTIL_COMMAND, tumor, date, info.source, destination)?;
            count += 1;
        }
    }
    Ok(count)
}

pub fn make_gsutil_command_file(cmd_file: &Path, tumor: &str, files: &FileMap) -> Result<(), Box<dyn Error>> {
    let date = chrono::Local::today().format("%Y-%m-%d").to_string();
    let mut out = BufWriter::new(File::create(cmd_file)?);
    let count = make_gsutil_command(&mut out, tumor, files, &date)?;
    out.flush()?;
    info!("{} gsutil commands written to {}", count, cmd_file.display());
    Ok(())
}

pub fn size_in_gb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_IN_GB * 100.0).round() / 100.0
}

/// Audit summary of the transfer: counts, total size, types and the file list.
pub fn make_documentation<W: Write>(output: &mut W, tumor: &str, files: &FileMap) -> Result<(), Box<dyn Error>> {
    let documented: Vec<_> = files.values().filter(|i| i.destination.is_some()).collect();
    let total_size: u64 = documented.iter().map(|i| i.size).sum();
    let types = documented.iter()
        .map(|i| file_info::get_extension(&i.source))
        .unique()
        .sorted()
        .join(",");

    writeln!(output, "Documentation for bucket transfer for the following tumor: {}", tumor)?;
    writeln!(output, "Number of files transferred: {}", documented.len())?;
    writeln!(output, "Size of files: {:.2} GB ({} bytes)", size_in_gb(total_size), total_size)?;
    writeln!(output, "Types of files transferred: {}", types)?;
    writeln!(output)?;
    for info in documented.iter() {
        writeln!(output, "{} {} {}", info.source, info.destination.as_deref().unwrap_or(""), info.md5)?;
    }
    Ok(())
}

pub fn make_documentation_file(doc_file: &Path, tumor: &str, files: &FileMap) -> Result<(), Box<dyn Error>> {
    let mut out = BufWriter::new(File::create(doc_file)?);
    make_documentation(&mut out, tumor, files)?;
    out.flush()?;
    info!("Transfer documentation written to {}", doc_file.display());
    Ok(())
}
