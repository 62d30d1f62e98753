use std::collections::BTreeMap;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;

use super::errors::TransferError;
use super::file_info::{self, FileMap};

pub const HTAN_PROJECT: &str = "HTA1";
const HTAPP_KEY: &str = "HTAPP-";
const SMP_KEY: &str = "-SMP-";

const POSSORTED_FILES: &[&str] = &["possorted_genome_bam.bam", "possorted_genome_bam.bam.bai"];
const MATRIX_FILES: &[&str] = &[
    "barcodes.tsv", "barcodes.tsv.gz",
    "genes.tsv", "features.tsv.gz",
    "matrix.mtx", "matrix.mtx.gz",
];

const SAMPLE_COUNT: &str = "_sample_count";
const CASE_COUNT: &str = "_case_count";
const KEY_SUFFIX: &str = "-KEY.csv";
const KEY_HEADER: &str = "Patient Id, Case Id, HTAN Patient Id, HTAN Case Id, HTAN Full Prefix, Transferred File";

lazy_static! {
    static ref HTAPP_NAME: Regex = Regex::new(r"^HTAPP-([^-_]*)-SMP-([^-_]*)_").unwrap();
}

/// Participant and sample parts of an `HTAPP-<p>-SMP-<s>_...` name.
#[derive(Debug, Clone, PartialEq)]
pub struct IdTokens {
    pub participant: String,
    pub sample: String,
}

impl IdTokens {
    pub fn htapp_id(&self) -> String {
        format!("HTAPP-{}", self.participant)
    }

    pub fn smp_id(&self) -> String {
        format!("SMP-{}", self.sample)
    }
}

pub fn split_file_to_id_tokens(name: &str) -> Option<IdTokens> {
    HTAPP_NAME.captures(name).map(|caps| IdTokens {
        participant: caps[1].to_string(),
        sample: caps[2].to_string(),
    })
}

/// Id directory split into the id and the assay.
fn id_and_assay(path: &str) -> Option<(&str, &str)> {
    let mut parts = file_info::id_dir(path)?.split('_');
    match (parts.next(), parts.next()) {
        (Some(id), Some(assay)) => Some((id, assay)),
        _ => None,
    }
}

/// Ids of a tab separated id file, keyed by its second and third columns.
/// The flag is false when an id is listed more than once.
pub fn read_id_file<R: Read>(input: R) -> Result<(AHashSet<String>, bool), Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input);
    let mut record = csv::StringRecord::new();
    let mut ids = AHashSet::new();
    let mut success = true;

    while rdr.read_record(&mut record)? {
        let key = match (record.get(1), record.get(2)) {
            (Some(a), Some(b)) => format!("{}-{}", a.trim(), b.trim()),
            _ => {
                error!("ID file line {} has less than three columns.", rdr.position().line());
                success = false;
                continue;
            }
        };
        if !ids.insert(key.clone()) {
            error!("The following id was entered in multiple times: {}", key);
            success = false;
        }
    }
    Ok((ids, success))
}

pub fn read_id_file_path(path: &Path) -> Result<(AHashSet<String>, bool), Box<dyn Error>> {
    read_id_file(File::open(path)?)
}

/// Files that survived an id check, and whether the check passed.
#[derive(Debug)]
pub struct IdCheck {
    pub success: bool,
    pub files: FileMap,
}

pub fn qc_ids(reference: &AHashSet<String>, files: FileMap) -> IdCheck {
    info!("Starting QC IDs");
    let mut success = true;
    let mut assay_count: BTreeMap<String, usize> = BTreeMap::new();
    let mut passed = FileMap::new();

    for (path, info) in files.into_iter() {
        let dir = file_info::id_dir(&path).unwrap_or("");
        if !dir.contains(HTAPP_KEY) || !dir.contains(SMP_KEY) {
            warn!("{} excluded for not having keywords '{}' or '{}'", path, HTAPP_KEY, SMP_KEY);
            continue;
        }
        match id_and_assay(&path) {
            Some((id, assay)) => {
                *assay_count.entry(assay.to_string()).or_insert(0) += 1;
                if reference.contains(id) {
                    passed.insert(path, info);
                } else {
                    error!("The following file has an ID that does not match the expected ids: {}", path);
                    success = false;
                }
            }
            None => {
                error!("The following file is named poorly: {}", path);
                success = false;
            }
        }
    }

    info!("The following assay counts were found.");
    for (assay, count) in assay_count.iter() {
        info!("Assay: {}  Count: {}", assay, count);
    }
    IdCheck { success, files: passed }
}

pub fn hold_ids(hold: &AHashSet<String>, files: FileMap) -> IdCheck {
    info!("Starting HOLD IDs");
    let mut success = true;
    let mut passed = FileMap::new();

    for (path, info) in files.into_iter() {
        match id_and_assay(&path) {
            Some((id, _)) if hold.contains(id) => {
                info!("The following file has an ID that is being held, it will not be transferred: {}", path);
            }
            Some(_) => { passed.insert(path, info); },
            None => {
                error!("The following file is named poorly: {}", path);
                success = false;
            }
        }
    }
    IdCheck { success, files: passed }
}

/// HTAPP/SMP id to HTAN id mapping. Both sides must be unique.
pub fn read_map<R: BufRead>(input: R) -> Result<AHashMap<String, String>, Box<dyn Error>> {
    let mut map = AHashMap::new();
    let mut values: AHashSet<String> = AHashSet::new();

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = match line.split('\t').map(|t| t.trim()).next_tuple::<(&str, &str)>() {
            Some(kv) => kv,
            None => {
                warn!("Skipping mapping line without two columns: {}", line);
                continue;
            }
        };
        if map.contains_key(key) {
            error!("The mapping file contains duplicate HTAPP/SMP ids, they must be unique. ID={}", key);
            return Err(Box::new(TransferError::DuplicateMapKey(key.to_string())));
        }
        if !values.insert(value.to_string()) {
            error!("The mapping file contains duplicate HTAN ids, they must be unique. ID={}", value);
            return Err(Box::new(TransferError::DuplicateMapValue(value.to_string())));
        }
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

pub fn read_map_file(path: &Path) -> Result<AHashMap<String, String>, Box<dyn Error>> {
    if !path.exists() {
        error!("The mapping file does not exist. Mapping file must be provided.");
        return Err(Box::new(TransferError::MissingMapFile(path.display().to_string())));
    }
    let map = read_map(BufReader::new(File::open(path)?))?;
    info!("Read {} id mappings from {}", map.len(), path.display());
    Ok(map)
}

fn htan_prefix(tokens: &IdTokens, map: &AHashMap<String, String>) -> Option<String> {
    let participant = map.get(&tokens.htapp_id());
    let sample = map.get(&tokens.smp_id());
    match (participant, sample) {
        (Some(p), Some(s)) => Some(format!("{}_{}_{}", HTAN_PROJECT, p, s)),
        _ => {
            warn!("No HTAN mapping for {} or {}", tokens.htapp_id(), tokens.smp_id());
            None
        }
    }
}

fn special_case_tokens(path: &str) -> Option<IdTokens> {
    let base = file_info::base_name(path);
    if POSSORTED_FILES.contains(&base) {
        return file_info::component_from_end(path, 2).and_then(split_file_to_id_tokens);
    }
    if MATRIX_FILES.contains(&base) {
        return file_info::component_from_end(path, 3).and_then(split_file_to_id_tokens)
            .or_else(|| file_info::component_from_end(path, 4).and_then(split_file_to_id_tokens));
    }
    None
}

/// New file name following the HTAN convention, `None` when the ids can not be found or mapped.
pub fn convert_file_name_to_htan_standard(path: &str, map: &AHashMap<String, String>) -> Option<String> {
    if path.trim().is_empty() {
        return None;
    }
    let base = file_info::base_name(path);

    if let Some(tokens) = special_case_tokens(path) {
        let prefix = htan_prefix(&tokens, map)?;
        return Some(format!("{}_{}-{}-{}", prefix, tokens.htapp_id(), tokens.smp_id(), base));
    }

    match split_file_to_id_tokens(base) {
        Some(tokens) => {
            let prefix = htan_prefix(&tokens, map)?;
            Some(format!("{}_{}", prefix, base))
        }
        None => {
            error!("Failed token check for {}, expected HTAPP-<id>-SMP-<id>_ at the start.", base);
            None
        }
    }
}

/// How one file was anonymized.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamedFile {
    pub original_sample: String,
    pub original_case: String,
    pub renamed_sample: String,
    pub renamed_case: String,
    pub renamed_name: String,
}

impl RenamedFile {
    fn key_row(&self) -> String {
        let htan_patient = self.renamed_sample.split('-').nth(1).unwrap_or("");
        [
            self.original_sample.as_str(),
            self.original_case.as_str(),
            htan_patient,
            self.renamed_case.as_str(),
            format!("{}-{}", self.renamed_sample, self.renamed_case).as_str(),
            self.renamed_name.as_str(),
        ].join(",")
    }
}

/// Persistent original-to-anonymous id assignments.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IdRegistry {
    ids: BTreeMap<String, String>,
    sample_count: usize,
    case_count: usize,
}

impl IdRegistry {
    pub fn new() -> IdRegistry {
        IdRegistry::default()
    }

    pub fn read<R: BufRead>(input: R) -> Result<IdRegistry, Box<dyn Error>> {
        let mut registry = IdRegistry::new();
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = match line.split(',').map(|t| t.trim()).collect_tuple::<(&str, &str)>() {
                Some(kv) => kv,
                None => {
                    warn!("Skipping registry line: {}", line);
                    continue;
                }
            };
            match key {
                SAMPLE_COUNT => registry.sample_count = value.parse()?,
                CASE_COUNT => registry.case_count = value.parse()?,
                _ => { registry.ids.insert(key.to_string(), value.to_string()); },
            }
        }
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<IdRegistry, Box<dyn Error>> {
        if !path.exists() {
            info!("Rename file {} does not exist yet, starting a new one.", path.display());
            return Ok(IdRegistry::new());
        }
        IdRegistry::read(BufReader::new(File::open(path)?))
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.ids.get(id).map(|s| s.as_str())
    }

    fn assign_sample(&mut self, sample: &str) -> String {
        if let Some(renamed) = self.ids.get(sample) {
            return renamed.clone();
        }
        self.sample_count += 1;
        let renamed = format!("{}-{}", HTAN_PROJECT, self.sample_count);
        self.ids.insert(sample.to_string(), renamed.clone());
        renamed
    }

    fn assign_case(&mut self, case: &str) -> String {
        if let Some(renamed) = self.ids.get(case) {
            return renamed.clone();
        }
        self.case_count += 1;
        let renamed = self.case_count.to_string();
        self.ids.insert(case.to_string(), renamed.clone());
        renamed
    }

    /// Anonymizes the ids of the id directory, `A-B-C-D_...` gives sample `A-B` and case `C-D`.
    pub fn rename(&mut self, path: &str) -> Option<RenamedFile> {
        let dir = file_info::id_dir(path)?;
        let parts: Vec<&str> = dir.split('_').next()?.split('-').collect();
        if parts.len() < 4 {
            warn!("Can not find sample and case ids in {}", path);
            return None;
        }
        let original_sample = parts[0..2].join("-");
        let original_case = parts[2..4].join("-");
        let renamed_sample = self.assign_sample(&original_sample);
        let renamed_case = self.assign_case(&original_case);
        let renamed_name = format!("{}-{}_{}", renamed_sample, renamed_case, file_info::base_name(path));
        debug!("{} renamed to {}", path, renamed_name);

        Some(RenamedFile { original_sample, original_case, renamed_sample, renamed_case, renamed_name })
    }

    fn key_file_name(path: &Path) -> PathBuf {
        PathBuf::from(format!("{}{}", path.with_extension("").display(), KEY_SUFFIX))
    }

    fn backup(path: &Path, moved: PathBuf) -> Result<(), Box<dyn Error>> {
        if path.exists() {
            fs::rename(path, &moved)?;
            info!("Backed up {} to {}", path.display(), moved.display());
        }
        Ok(())
    }

    /// Writes the registry and its key table, backing up existing files with a timestamp.
    pub fn write(&self, path: &Path, renamed: &[RenamedFile]) -> Result<(), Box<dyn Error>> {
        let key_file = IdRegistry::key_file_name(path);
        let stamp = chrono::Local::now().format("%m-%d-%Y-%H-%M-%S").to_string();
        let base = path.with_extension("").display().to_string();
        let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
        IdRegistry::backup(path, PathBuf::from(format!("{}{}{}", base, stamp, ext)))?;
        IdRegistry::backup(&key_file, PathBuf::from(format!("{}{}{}", base, stamp, KEY_SUFFIX)))?;

        let mut out = BufWriter::new(File::create(path)?);
        self.write_ids(&mut out)?;
        out.flush()?;

        let mut key_out = BufWriter::new(File::create(&key_file)?);
        writeln!(key_out, "{}", KEY_HEADER)?;
        write!(key_out, "{}", renamed.iter().map(|r| r.key_row()).join("\n"))?;
        key_out.flush()?;
        info!("Rename ids written to {} and {}", path.display(), key_file.display());
        Ok(())
    }

    pub fn write_ids<W: Write>(&self, out: &mut W) -> Result<(), Box<dyn Error>> {
        writeln!(out, "{},{}", SAMPLE_COUNT, self.sample_count)?;
        writeln!(out, "{},{}", CASE_COUNT, self.case_count)?;
        for (key, value) in self.ids.iter() {
            writeln!(out, "{},{}", key, value)?;
        }
        Ok(())
    }
}
