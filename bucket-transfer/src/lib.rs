use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use ahash::AHashMap;
use log::{error, info, warn};

pub mod errors;
pub mod file_info;
pub mod gs_log;
pub mod gs_ls;
pub mod historic;
pub mod ids;
pub mod report;
pub mod transfer;

pub use self::errors::{TransferError, COMPLETED_WITH_ERROR};
pub use self::file_info::{FileInfo, FileMap, TransferType};
pub use self::transfer::MoleculeFilter;

use self::ids::{IdRegistry, RenamedFile};

/// How destination file names are derived.
#[derive(Debug, Clone)]
pub enum Naming {
    /// Keep the source base name.
    Keep,
    /// HTAN convention from an HTAPP/SMP to HTAN id mapping file.
    Htan(PathBuf),
    /// Anonymized ids kept in a rename registry, updated after the run.
    Anonymized(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub tumor: String,
    pub bucket: String,
    pub ls_file: PathBuf,
    pub hist: Option<PathBuf>,
    pub hist_temp: PathBuf,
    pub cmd_out: PathBuf,
    pub document_out: PathBuf,
    pub naming: Naming,
    pub qc_ids: Option<PathBuf>,
    pub hold_ids: Option<PathBuf>,
    pub types: Vec<TransferType>,
    pub molecule: Option<MoleculeFilter>,
    pub exclude_keys: Vec<String>,
}

pub fn convert_gs_log(log_file: &Path, out_file: &Path) -> Result<(), Box<dyn Error>> {
    info!("Converting gsutil log {} to historic log format.", log_file.display());
    let files = gs_log::gs_log_to_file_map(File::open(log_file)?)?;
    historic::write_historic_log(File::create(out_file)?, &files, &FileMap::new(), "")?;
    info!("{} entries written to {}", files.len(), out_file.display());
    Ok(())
}

pub fn check_transfer_log(log_file: &Path) -> Result<(), Box<dyn Error>> {
    info!("Checking gsutil log {} for transfer.", log_file.display());
    let count = gs_log::check_gs_log(File::open(log_file)?)?;
    info!("All {} files were transferred OK.", count);
    Ok(())
}

fn destination(bucket: &str, name: &str) -> String {
    format!("{}/{}", bucket.trim_end_matches('/'), name)
}

/// Fills in the destinations of the files, dropping the ones that can not be named.
fn assign_destinations(bucket: &str, files: FileMap, id_map: Option<&AHashMap<String, String>>,
                       registry: Option<&mut IdRegistry>) -> (FileMap, Vec<RenamedFile>) {
    let mut named = FileMap::new();
    let mut renamed = Vec::new();

    match (id_map, registry) {
        (Some(map), _) => {
            for (path, mut info) in files.into_iter() {
                match ids::convert_file_name_to_htan_standard(&path, map) {
                    Some(name) => {
                        info.destination = Some(destination(bucket, &name));
                        named.insert(path, info);
                    }
                    None => warn!("Skipping file for transfer, no HTAN name for {}", path),
                }
            }
        }
        (None, Some(registry)) => {
            for (path, mut info) in files.into_iter() {
                match registry.rename(&path) {
                    Some(r) => {
                        info.destination = Some(destination(bucket, &r.renamed_name));
                        renamed.push(r);
                        named.insert(path, info);
                    }
                    None => warn!("Skipping file for transfer, can not rename {}", path),
                }
            }
        }
        _ => {
            for (path, mut info) in files.into_iter() {
                info.destination = Some(destination(bucket, file_info::base_name(&path)));
                named.insert(path, info);
            }
        }
    }
    (named, renamed)
}

/// Prepares a transfer: selects the files to copy, checks their ids, and writes the historic log,
/// the gsutil commands and the documentation. Returns whether all id checks passed.
pub fn document_transfer(opts: &DocumentOptions) -> Result<bool, Box<dyn Error>> {
    info!("Preparing documentation and commands for transfer of {}.", opts.tumor);
    let mut success = true;

    let id_map = match &opts.naming {
        Naming::Htan(map_file) => Some(ids::read_map_file(map_file)?),
        _ => None,
    };
    let mut registry = match &opts.naming {
        Naming::Anonymized(rename_file) => Some(IdRegistry::from_file(rename_file)?),
        _ => None,
    };

    let previous = match &opts.hist {
        Some(hist) => historic::read_historic_log_file(hist)?,
        None => {
            info!("Skip historic log.");
            FileMap::new()
        }
    };
    let mut current = gs_ls::read_gs_ls_file(&opts.ls_file)?;

    current = transfer::reduce_bams_to_molecule_type(opts.molecule, current);
    if opts.types.contains(&TransferType::Matrix) {
        current = transfer::remove_filtered_matrices(current);
    }

    let extensions = transfer::transfer_extensions(&opts.types);
    let mut files = transfer::extract_transfer_files(&previous, &current, &extensions, &opts.exclude_keys);

    match &opts.qc_ids {
        Some(id_file) => {
            let (reference, read_ok) = ids::read_id_file_path(id_file)?;
            let check = ids::qc_ids(&reference, files);
            success = success && read_ok && check.success;
            files = check.files;
            if success {
                info!("QC ID check passed.");
            } else {
                error!("QC ID check failed.");
            }
        }
        None => warn!("QC IDs were not checked"),
    }

    match &opts.hold_ids {
        Some(id_file) => {
            let (hold, read_ok) = ids::read_id_file_path(id_file)?;
            let check = ids::hold_ids(&hold, files);
            success = success && read_ok && check.success;
            files = check.files;
            if success {
                info!("Hold ID check passed.");
            } else {
                error!("Hold ID check failed.");
            }
        }
        None => warn!("Hold IDs were not given."),
    }

    let (files, renamed) = assign_destinations(&opts.bucket, files, id_map.as_ref(), registry.as_mut());

    let hist_out = match &opts.hist {
        Some(hist) => {
            historic::rotate_historic_log(hist, &opts.hist_temp)?;
            hist.clone()
        }
        None => {
            warn!("Historic log was not given, starting a new one.");
            PathBuf::from(historic::default_historic_log_name(&opts.tumor))
        }
    };
    info!("Writing historic log {}", hist_out.display());
    historic::write_historic_log_file(&hist_out, &previous, &files)?;

    report::make_gsutil_command_file(&opts.cmd_out, &opts.tumor, &files)?;
    report::make_documentation_file(&opts.document_out, &opts.tumor, &files)?;

    if let (Naming::Anonymized(rename_file), Some(registry)) = (&opts.naming, registry.as_ref()) {
        registry.write(rename_file, &renamed)?;
    }

    if success {
        info!("Completed documentation and reporting with no error.");
    } else {
        warn!("Completed with error.");
    }
    Ok(success)
}
