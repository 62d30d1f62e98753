use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use log::{debug, info};

use super::errors::TransferError;
use super::file_info::{FileInfo, FileMap};

const OBJECT_START: &str = "gs://";
const DIR_END: &str = "/:";
const ACL: &str = "ACL:";
const MD5_FIELD: &str = "Hash (md5):";
const SIZE_FIELD: &str = "Content-Length:";

/// Splits `Key: value` listing lines. Two word keys like `Hash (md5):` are kept together and
/// the value is the last token.
fn split_ls_line(line: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.len() {
        0 | 1 => None,
        2 => Some((tokens[0].to_string(), tokens[1].to_string())),
        n => Some((tokens[0..2].join(" "), tokens[n - 1].to_string())),
    }
}

fn finish_object(name: String, fields: BTreeMap<String, String>, files: &mut FileMap) -> Result<(), Box<dyn Error>> {
    let md5 = fields.get(MD5_FIELD).ok_or_else(|| TransferError::MissingLsField {
        file: name.clone(),
        field: MD5_FIELD,
    })?;
    let size = fields.get(SIZE_FIELD).ok_or_else(|| TransferError::MissingLsField {
        file: name.clone(),
        field: SIZE_FIELD,
    })?;
    let info = FileInfo::new(&name, md5, size.parse()?);
    files.insert(name, info);
    Ok(())
}

/// Parses the output of `gsutil ls -L`.
pub fn read_gs_ls<R: BufRead>(reader: R) -> Result<FileMap, Box<dyn Error>> {
    let mut files = FileMap::new();
    let mut current: Option<(String, BTreeMap<String, String>)> = None;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with(OBJECT_START) {
            if let Some((name, fields)) = current.take() {
                finish_object(name, fields, &mut files)?;
            }
            if !trimmed.ends_with(DIR_END) {
                let name = trimmed.strip_suffix(':').unwrap_or(trimmed);
                current = Some((name.to_string(), BTreeMap::new()));
            }
            continue;
        }

        if trimmed.starts_with(ACL) {
            if let Some((name, fields)) = current.take() {
                finish_object(name, fields, &mut files)?;
            }
            continue;
        }

        if let Some((_, fields)) = current.as_mut() {
            if let Some((key, value)) = split_ls_line(trimmed) {
                fields.insert(key, value);
            }
        }
    }
    if let Some((name, fields)) = current.take() {
        finish_object(name, fields, &mut files)?;
    }

    debug!("Listing contains {} objects.", files.len());
    Ok(files)
}

pub fn read_gs_ls_file(ls_file: &Path) -> Result<FileMap, Box<dyn Error>> {
    info!("Reading gsutil listing {}", ls_file.display());
    read_gs_ls(BufReader::new(File::open(ls_file)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
gs://bucket/dir/:
gs://bucket/dir/HTAPP-1-SMP-2_scRNA/a_R1.fastq.gz:
    Creation time:          Tue, 01 Sep 2020 15:04:05 GMT
    Content-Length:         1024
    Content-Type:           application/octet-stream
    Hash (crc32c):          AAAAAA==
    Hash (md5):             q1w2e3==
    ACL:                    [
      {
        \"entity\": \"project-owners-1\"
      }
    ]
gs://bucket/dir/HTAPP-1-SMP-2_scRNA/a_R2.fastq.gz:
    Content-Length:         2048
    Hash (md5):             r4t5y6==
TOTAL: 2 objects, 3072 bytes (3 KiB)
";

    #[test]
    fn listing_objects_are_parsed() {
        let files = read_gs_ls(LISTING.as_bytes()).unwrap();
        assert_eq!(files.len(), 2);
        let first = &files["gs://bucket/dir/HTAPP-1-SMP-2_scRNA/a_R1.fastq.gz"];
        assert_eq!(first.md5, "q1w2e3==");
        assert_eq!(first.size, 1024);
        let second = &files["gs://bucket/dir/HTAPP-1-SMP-2_scRNA/a_R2.fastq.gz"];
        assert_eq!(second.size, 2048);
    }

    #[test]
    fn missing_hash_is_an_error() {
        let listing = "gs://bucket/a.bam:\n    Content-Length: 10\n    ACL: []\n";
        let err = read_gs_ls(listing.as_bytes()).unwrap_err();
        let err = err.downcast_ref::<TransferError>().unwrap();
        assert_eq!(err, &TransferError::MissingLsField { file: "gs://bucket/a.bam".to_string(), field: MD5_FIELD });
    }
}
