use std::collections::BTreeMap;
use itertools::Itertools;
use log::{debug, info, warn};

use super::errors::TransferError;
use super::file_info::{self, FileMap, TransferType};

const REMOVE_FILES: &[&str] = &[".DS_Store"];

const FILTERED_GENE_MATRICES: &str = "filtered_gene_bc_matrices";
const FILTERED_FEATURE_MATRIX: &str = "filtered_feature_bc_matrix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeFilter {
    BulkDna,
    BulkRna,
    SingleCellRna,
}

impl MoleculeFilter {
    /// Picks at most one class of bams. Asking for several is contradictory.
    pub fn from_flags(bulk_dna: bool, bulk_rna: bool, sc_rna: bool) -> Result<Option<MoleculeFilter>, TransferError> {
        let requested: Vec<MoleculeFilter> = vec![
            (bulk_dna, MoleculeFilter::BulkDna),
            (bulk_rna, MoleculeFilter::BulkRna),
            (sc_rna, MoleculeFilter::SingleCellRna),
        ].into_iter().filter(|(on, _)| *on).map(|(_, f)| f).collect();

        match requested.len() {
            0 => Ok(None),
            1 => Ok(Some(requested[0])),
            _ => Err(TransferError::ContradictoryMoleculeFilters),
        }
    }

    fn marker(&self) -> &'static str {
        match *self {
            MoleculeFilter::BulkDna => "_WES_",
            MoleculeFilter::BulkRna => "_RNA_",
            MoleculeFilter::SingleCellRna => "possorted_genome_bam",
        }
    }

    pub fn accepts(&self, path: &str) -> bool {
        file_info::base_name(path).contains(self.marker())
    }
}

pub fn transfer_extensions(types: &[TransferType]) -> Vec<&'static str> {
    types.iter().flat_map(|t| t.extensions().iter().copied()).collect()
}

/// Selects the files of the listing that were never transferred or changed since.
pub fn extract_transfer_files(previous: &FileMap, current: &FileMap, extensions: &[&str],
                              exclusion_keys: &[String]) -> FileMap {
    info!("Extract transfer files.");
    let mut transfer = FileMap::new();
    let mut excluded_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut removed = 0;
    let mut not_transferred = 0;

    for (path, info) in current.iter() {
        if REMOVE_FILES.contains(&file_info::base_name(path)) {
            debug!("Not transferring {}", path);
            removed += 1;
            continue;
        }

        if let Some(key) = exclusion_keys.iter().find(|k| path.contains(k.as_str())) {
            warn!("{} was excluded because it includes the key '{}'.", path, key);
            removed += 1;
            continue;
        }

        let ext = file_info::get_extension(path);
        if !extensions.contains(&ext.as_str()) {
            *excluded_types.entry(ext).or_insert(0) += 1;
            continue;
        }

        match previous.get(path) {
            Some(prev) if prev.md5 == info.md5 => not_transferred += 1,
            _ => { transfer.insert(path.clone(), info.clone()); },
        }
    }

    let ids: Vec<&str> = transfer.keys()
        .filter_map(|p| file_info::extract_smp_id(p))
        .unique()
        .sorted()
        .collect();

    info!("Number of files to transfer = {}", transfer.len());
    info!("Number of files already transferred previously = {}", previous.len());
    debug!("Number of unchanged files skipped = {}, removed = {}", not_transferred, removed);
    info!("Number of sample ids to be transferred = {}", ids.len());
    for (ext, count) in excluded_types.iter() {
        warn!("The following file type was found and ignored {} many times: {}", count, ext);
    }
    info!("Sample ids to be transferred: {}", ids.iter().join(", "));
    transfer
}

/// Keeps only the bams of the requested molecule type. Other files always pass.
pub fn reduce_bams_to_molecule_type(filter: Option<MoleculeFilter>, files: FileMap) -> FileMap {
    let filter = match filter {
        Some(f) => f,
        None => {
            info!("No filtering by molecule occurred for BAMs");
            return files;
        }
    };

    info!("Filtering BAMs by molecule type {:?}.", filter);
    let mut not_bam = 0;
    let mut allowed = 0;
    let reduced: FileMap = files.into_iter()
        .filter(|(path, _)| {
            if !file_info::is_bam(path) {
                not_bam += 1;
                true
            } else if filter.accepts(path) {
                allowed += 1;
                true
            } else {
                false
            }
        })
        .collect();
    info!("{} files were not bams and so were not filtered.", not_bam);
    info!("{} {:?} bams were allowed through the filter.", allowed, filter);
    reduced
}

fn is_filtered_matrix(path: &str) -> bool {
    file_info::component_from_end(path, 3) == Some(FILTERED_GENE_MATRICES)
        || file_info::component_from_end(path, 2) == Some(FILTERED_FEATURE_MATRIX)
}

/// Drops the filtered 10x matrices, only raw matrices are transferred.
pub fn remove_filtered_matrices(files: FileMap) -> FileMap {
    files.into_iter()
        .filter(|(path, _)| {
            let ext = file_info::get_extension(path);
            if TransferType::Matrix.extensions().contains(&ext.as_str()) && is_filtered_matrix(path) {
                info!("Removing file as it is filtered. File={}", path);
                false
            } else {
                true
            }
        })
        .collect()
}
