use std::collections::BTreeMap;
use std::error::Error;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{debug, error, info, warn};
use serde::Deserialize;

use super::errors::UtilsError;

const MUT_BAM_FILE: &str = "recalibrated.bam";
const MUT_BAI_FILE: &str = "recalibrated.bai";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenameMode {
    /// Files of the input directory ending with the extension.
    Flat,
    /// `<dir>/<sample>/<run>/recalibrated.bam` of the RNA mutation pipeline.
    MutBam,
}

impl FromStr for RenameMode {
    type Err = UtilsError;

    fn from_str(s: &str) -> Result<RenameMode, UtilsError> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(RenameMode::Flat),
            "mut_bam" => Ok(RenameMode::MutBam),
            _ => Err(UtilsError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub extension: String,
    pub map_file: PathBuf,
    pub input_dir: PathBuf,
    pub link_dir: Option<PathBuf>,
    pub mode: RenameMode,
    pub apply: bool,
}

#[derive(Debug, Deserialize)]
struct MappingRow<'a> {
    new_token: &'a str,
    old_token: &'a str,
}

/// Old token to new token, read from `new\told` lines.
pub fn read_mapping<R: Read>(input: R) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(input);
    let mut raw_record = csv::ByteRecord::new();
    let mut mapping = BTreeMap::new();

    while rdr.read_byte_record(&mut raw_record)? {
        let row: MappingRow = raw_record.deserialize(None)?;
        mapping.insert(row.old_token.to_string(), row.new_token.to_string());
    }
    Ok(mapping)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

pub fn collect_flat_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    Ok(sorted_entries(dir)?.into_iter()
        .filter(|p| {
            let name = file_name(p);
            !name.starts_with('.') && name.ends_with(extension)
        })
        .collect())
}

/// Recalibrated bams and their indices, one run directory per sample.
pub fn collect_mut_bam_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    for sample_dir in sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()) {
        let runs: Vec<PathBuf> = sorted_entries(&sample_dir)?.into_iter().filter(|p| p.is_dir()).collect();
        if runs.len() != 1 {
            error!("Incomplete results, could not explicitly find the bam folder for {}", sample_dir.display());
            continue;
        }
        if runs[0].join(MUT_BAM_FILE).exists() {
            files.push(runs[0].join(MUT_BAM_FILE));
            files.push(runs[0].join(MUT_BAI_FILE));
        }
    }
    Ok(files)
}

/// The longest key that starts the file name is replaced by its new token.
pub fn flat_rename(path: &Path, mapping: &BTreeMap<String, String>) -> PathBuf {
    let name = file_name(path);
    match mapping.iter().rev().find(|(old, _)| name.starts_with(old.as_str())) {
        Some((old, new)) => path.with_file_name(format!("{}{}", new, &name[old.len()..])),
        None => {
            info!("Did not update {}", path.display());
            path.to_path_buf()
        }
    }
}

/// `<sample>/<run>/recalibrated.bam` becomes `<sample>/<run>/<mapped sample>.bam`.
pub fn mut_bam_rename(path: &Path, mapping: &BTreeMap<String, String>) -> PathBuf {
    let sample = path.parent().and_then(|p| p.parent()).map(file_name).unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
    let new_sample = match mapping.get(&sample) {
        Some(new) => new.clone(),
        None => {
            warn!("Did not find mapping for {}, named after its sample directory.", path.display());
            sample
        }
    };
    path.with_file_name(format!("{}.{}", new_sample, ext))
}

pub fn plan_renames(files: &[PathBuf], mapping: &BTreeMap<String, String>, mode: RenameMode) -> Vec<(PathBuf, PathBuf)> {
    files.iter()
        .map(|f| {
            let renamed = match mode {
                RenameMode::Flat => flat_rename(f, mapping),
                RenameMode::MutBam => mut_bam_rename(f, mapping),
            };
            (f.clone(), renamed)
        })
        .collect()
}

/// Links or renames the files of the input directory. Without a link dir or `apply` the plan is only logged.
pub fn rename_files(opts: &RenameOptions) -> Result<Vec<(PathBuf, PathBuf)>, Box<dyn Error>> {
    if !opts.input_dir.is_dir() {
        return Err(Box::new(UtilsError::MissingDirectory(opts.input_dir.display().to_string())));
    }
    let mapping = read_mapping(File::open(&opts.map_file)?)?;
    info!("Read {} name mappings.", mapping.len());

    let files = match opts.mode {
        RenameMode::Flat => collect_flat_files(&opts.input_dir, &opts.extension)?,
        RenameMode::MutBam => collect_mut_bam_files(&opts.input_dir)?,
    };
    let plan = plan_renames(&files, &mapping, opts.mode);

    if let Some(link_dir) = opts.link_dir.as_ref() {
        if !link_dir.is_dir() {
            fs::create_dir_all(link_dir)?;
        }
        for (original, renamed) in plan.iter() {
            let target = fs::canonicalize(original)?;
            let link = link_dir.join(file_name(renamed));
            symlink(&target, &link)?;
            debug!("Linked {} to {}", link.display(), target.display());
        }
        info!("{} links made in {}", plan.len(), link_dir.display());
    } else if opts.apply {
        for (original, renamed) in plan.iter().filter(|(o, r)| o != r) {
            fs::rename(original, renamed)?;
            debug!("Renamed {} to {}", original.display(), renamed.display());
        }
    } else {
        for (original, renamed) in plan.iter() {
            info!("{} -> {}", original.display(), renamed.display());
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> BTreeMap<String, String> {
        read_mapping("patient_1\tS1\npatient_10\tS10\n".as_bytes()).unwrap()
    }

    #[test]
    fn longest_key_wins() {
        let m = mapping();
        assert_eq!(flat_rename(Path::new("/d/S10_R1.fastq"), &m), PathBuf::from("/d/patient_10_R1.fastq"));
        assert_eq!(flat_rename(Path::new("/d/S1_R1.fastq"), &m), PathBuf::from("/d/patient_1_R1.fastq"));
        assert_eq!(flat_rename(Path::new("/d/xS1_R1.fastq"), &m), PathBuf::from("/d/xS1_R1.fastq"));
    }

    #[test]
    fn mut_bams_are_named_after_sample() {
        let m = mapping();
        assert_eq!(mut_bam_rename(Path::new("/d/S1/misc_run/recalibrated.bai"), &m),
                   PathBuf::from("/d/S1/misc_run/patient_1.bai"));
        assert_eq!(mut_bam_rename(Path::new("/d/S7/misc_run/recalibrated.bam"), &m),
                   PathBuf::from("/d/S7/misc_run/S7.bam"));
    }

    #[test]
    fn mode_names() {
        assert_eq!("FLAT".parse::<RenameMode>(), Ok(RenameMode::Flat));
        assert_eq!("mut_bam".parse::<RenameMode>(), Ok(RenameMode::MutBam));
        assert!("tree".parse::<RenameMode>().is_err());
    }

    #[test]
    fn links_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("S1_R1.fastq"), "x").unwrap();
        fs::write(input.join("S2_R1.fastq"), "y").unwrap();
        fs::write(input.join("S1_R1.txt"), "z").unwrap();
        let map_file = dir.path().join("map.tsv");
        fs::write(&map_file, "patient_1\tS1\n").unwrap();

        let mut opts = RenameOptions {
            extension: ".fastq".to_string(),
            map_file,
            input_dir: input.clone(),
            link_dir: Some(dir.path().join("links")),
            mode: RenameMode::Flat,
            apply: false,
        };
        let plan = rename_files(&opts).unwrap();
        assert_eq!(plan.len(), 2);
        let link = dir.path().join("links").join("patient_1_R1.fastq");
        assert_eq!(fs::read_to_string(&link).unwrap(), "x");
        assert!(input.join("S1_R1.fastq").exists());

        opts.link_dir = None;
        opts.apply = true;
        rename_files(&opts).unwrap();
        assert!(input.join("patient_1_R1.fastq").exists());
        assert!(input.join("S2_R1.fastq").exists());
        assert!(!input.join("S1_R1.fastq").exists());
    }
}
