use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use log::info;

pub mod bsub;
pub mod errors;
pub mod inspector;
pub mod md5check;
pub mod pair;
pub mod rename;

pub use self::bsub::BsubOptions;
pub use self::errors::UtilsError;
pub use self::md5check::{Md5Report, Md5Status};
pub use self::rename::{RenameMode, RenameOptions};

pub fn pair_samples_to_file(dir: &Path, suffix: &str, sentinel: &str, out_file: &Path) -> Result<(), Box<dyn Error>> {
    let pairs = pair::pair_samples(dir, suffix, sentinel)?;
    let mut out = BufWriter::new(File::create(out_file)?);
    pair::write_pairs(&mut out, &pairs)?;
    out.flush()?;
    info!("{} sample pairs written to {}", pairs.len(), out_file.display());
    Ok(())
}

pub fn rename_samples(opts: &RenameOptions) -> Result<(), Box<dyn Error>> {
    let plan = rename::rename_files(opts)?;
    info!("{} files handled.", plan.len());
    Ok(())
}

pub fn make_bsub_scripts(sample_file: &Path, opts: &BsubOptions) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let samples = bsub::read_samples(BufReader::new(File::open(sample_file)?))?;
    let commands: Vec<String> = samples.iter().map(|s| bsub::make_command(s, opts)).collect();
    bsub::write_bsub_files(&commands, opts)
}

pub fn check_md5sums(check_file: &Path, truth_file: &Path) -> Result<Md5Report, Box<dyn Error>> {
    info!("Checking md5sums of {} against {}", check_file.display(), truth_file.display());
    let report = md5check::check_md5sums(check_file, truth_file)?;
    info!("OK: {} Fail (md5sum): {} Fail (not in truth): {}", report.count(Md5Status::Ok),
          report.count(Md5Status::Mismatch), report.count(Md5Status::NotInTruth));
    Ok(report)
}

pub fn convert_for_inspector(out_dir: &Path, input_json: &Path) -> Result<(), Box<dyn Error>> {
    inspector::convert_pipeline_json(out_dir, input_json)?;
    Ok(())
}
