use std::collections::BTreeMap;
use std::fmt;

pub const PATH_SEP: char = '/';

pub const BAM_TYPES: &[&str] = &["bam", "bai", "bam.bai"];
pub const FASTQ_TYPES: &[&str] = &["fastq.gz", "fastq"];
pub const MATRIX_TYPES: &[&str] = &["tsv", "tsv.gz", "mtx", "mtx.gz"];

/// Path components of `gs://bucket/dir/<ID DIR>/...`.
const ID_DIR_INDEX: usize = 4;
const BAM_ID_DIR_INDEX: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub source: String,
    pub md5: String,
    pub size: u64,
    pub date: Option<String>,
    pub destination: Option<String>,
}

impl FileInfo {
    pub fn new(source: &str, md5: &str, size: u64) -> FileInfo {
        FileInfo {
            source: source.to_string(),
            md5: md5.to_string(),
            size,
            date: None,
            destination: None,
        }
    }
}

/// Files keyed by their source path.
pub type FileMap = BTreeMap<String, FileInfo>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferType {
    Fastq,
    Bam,
    Matrix,
}

impl TransferType {
    pub fn extensions(&self) -> &'static [&'static str] {
        match *self {
            TransferType::Fastq => FASTQ_TYPES,
            TransferType::Bam => BAM_TYPES,
            TransferType::Matrix => MATRIX_TYPES,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TransferType::Fastq => write!(f, "fastq"),
            TransferType::Bam => write!(f, "bam"),
            TransferType::Matrix => write!(f, "matrix"),
        }
    }
}

pub fn base_name(path: &str) -> &str {
    path.rsplit(PATH_SEP).next().unwrap_or(path)
}

/// Extension of the file name: everything after the first dot, except for logs.
pub fn get_extension(path: &str) -> String {
    let elements: Vec<&str> = base_name(path).split('.').collect();
    match elements.len() {
        0 | 1 => String::new(),
        _ if elements[elements.len() - 1] == "log" => "log".to_string(),
        _ => elements[1..].join("."),
    }
}

pub fn is_bam(path: &str) -> bool {
    BAM_TYPES.contains(&get_extension(path).as_str())
}

pub fn dir_parse_index(path: &str) -> usize {
    if is_bam(path) { BAM_ID_DIR_INDEX } else { ID_DIR_INDEX }
}

/// The path component holding the sample ids.
pub fn id_dir(path: &str) -> Option<&str> {
    path.split(PATH_SEP).nth(dir_parse_index(path))
}

/// Sample id used for reporting, taken before the first underscore.
pub fn extract_smp_id(path: &str) -> Option<&str> {
    path.split(PATH_SEP).nth(ID_DIR_INDEX).and_then(|d| d.split('_').next())
}

/// Path component counted from the end, `1` being the file name.
pub fn component_from_end(path: &str, n: usize) -> Option<&str> {
    if n == 0 { return None; }
    path.rsplit(PATH_SEP).nth(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_follow_the_first_dot() {
        assert_eq!(get_extension("gs://b/d/HTAPP-1-SMP-2_x.fastq.gz"), "fastq.gz");
        assert_eq!(get_extension("gs://b/d/sample.bam.bai"), "bam.bai");
        assert_eq!(get_extension("gs://b/d/run.2020.log"), "log");
        assert_eq!(get_extension("gs://b/d/README"), "");
    }

    #[test]
    fn id_dir_depends_on_type() {
        let fq = "gs://bucket/dir/HTAPP-1-SMP-2_scRNA/a.fastq.gz";
        let bam = "gs://bucket/dir/run/HTAPP-1-SMP-2_RNA/a.bam";
        assert_eq!(id_dir(fq), Some("HTAPP-1-SMP-2_scRNA"));
        assert_eq!(id_dir(bam), Some("HTAPP-1-SMP-2_RNA"));
        assert_eq!(extract_smp_id(fq), Some("HTAPP-1-SMP-2"));
        assert_eq!(id_dir("gs://bucket/a.bam"), None);
    }

    #[test]
    fn components_from_end() {
        let p = "gs://b/x/filtered_feature_bc_matrix/features.tsv.gz";
        assert_eq!(component_from_end(p, 1), Some("features.tsv.gz"));
        assert_eq!(component_from_end(p, 2), Some("filtered_feature_bc_matrix"));
        assert_eq!(component_from_end(p, 0), None);
    }
}
