use std::error::Error;
use std::path::{Path, PathBuf};
use log::info;

pub mod errors;
pub mod fasta;
pub mod fastq_format;
pub mod gmap;
pub mod vcf;

pub use self::fastq_format::{Encoding, QualityReport};
pub use self::gmap::{CompareCounts, CompressSummary};

pub fn convert_fasta_to_fastq(fasta_file: &Path, fastq_file: &Path) -> Result<(), Box<dyn Error>> {
    info!("Starting converting fasta to fastq...");
    fasta::fasta_to_fastq(fasta_file, fastq_file)?;
    info!("Converting fasta to fastq is complete.");
    Ok(())
}

pub fn split_multi_fasta(fasta_file: &Path, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    if !out_dir.is_dir() {
        std::fs::create_dir_all(out_dir)?;
    }
    fasta::split_fasta(fasta_file, out_dir)?;
    Ok(())
}

pub fn guess_fastq_format(fastq_file: &Path) -> Result<QualityReport, Box<dyn Error>> {
    fastq_format::guess_fastq_format(fastq_file)
}

pub fn convert_gmap_to_vcf(gmap_file: &Path, vcf_file: &Path) -> Result<(), Box<dyn Error>> {
    info!("Starting converting GMAP result to vcf...");
    gmap::gmap_to_vcf(gmap_file, vcf_file)?;
    info!("Converting GMAP result to vcf is complete.");
    Ok(())
}

pub fn compress_gmap_alignments(alignment_file: &Path, out_file: &Path) -> Result<CompressSummary, Box<dyn Error>> {
    gmap::gmap_compress(alignment_file, out_file)
}

pub fn gmap_read_depth(alignment_file: &Path, target_file: Option<&Path>, out_file: &Path) -> Result<(), Box<dyn Error>> {
    gmap::gmap_read_depth(alignment_file, target_file, out_file)?;
    Ok(())
}

pub fn compare_gmap_to_vcf(gmap_file: &Path, vcf_file: &Path, out_file: &Path) -> Result<CompareCounts, Box<dyn Error>> {
    gmap::gmap_compare(gmap_file, vcf_file, out_file)
}

pub fn switch_vcf_chr(in_file: &Path, out_file: &Path) -> Result<(), Box<dyn Error>> {
    vcf::switch_chr(in_file, out_file)?;
    Ok(())
}

pub fn compare_calls_to_truth(truth_file: &Path, call_files: &[PathBuf], depth_file: Option<&Path>,
                              out_dir: &Path) -> Result<(), Box<dyn Error>> {
    info!("Starting comparing {} vcf files to the truth set...", call_files.len());
    vcf::compare_to_truth(truth_file, call_files, depth_file, out_dir)?;
    info!("Comparison results saved into {}.", out_dir.display());
    Ok(())
}

pub fn vcf_metric_distribution(truth_file: &Path, vcf_file: &Path, out_file: &Path) -> Result<(), Box<dyn Error>> {
    vcf::metric_distribution(truth_file, vcf_file, out_file)
}
