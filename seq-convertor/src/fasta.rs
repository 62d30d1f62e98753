use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use seq_io::fasta::{self, Record};

/// Phred 93, the highest score representable in Phred+33.
pub const PERFECT_QUALITY: u8 = b'~';
const HEADER_START: u8 = b'>';
const REPORT_EVERY: usize = 100_000;

/// Writes every FASTA record as a FASTQ record with perfect base qualities.
pub fn write_fastq_records<R: Read, W: Write>(input: R, output: W) -> Result<usize, Box<dyn Error>> {
    let mut reader = fasta::Reader::new(input);
    let mut wrtr = BufWriter::new(output);

    let mut total = 0;
    while let Some(record) = reader.next() {
        let record = record?;
        let seq = record.full_seq();

        wrtr.write_all(b"@")?;
        wrtr.write_all(record.id()?.as_bytes())?;
        wrtr.write_all(b"\n")?;
        wrtr.write_all(&seq)?;
        wrtr.write_all(b"\n+\n")?;
        wrtr.write_all(&vec![PERFECT_QUALITY; seq.len()])?;
        wrtr.write_all(b"\n")?;

        total += 1;
        if total % REPORT_EVERY == 0 {
            debug!("{} records were converted", total);
        }
    }
    wrtr.flush()?;
    Ok(total)
}

pub fn fasta_to_fastq(fasta_file: &Path, fastq_file: &Path) -> Result<usize, Box<dyn Error>> {
    info!("Converting {} to {}", fasta_file.display(), fastq_file.display());
    let total = write_fastq_records(File::open(fasta_file)?, File::create(fastq_file)?)?;
    info!("{} records were written.", total);
    Ok(total)
}

fn split_file_name(stem: &str, index: usize) -> String {
    format!("{}_{}.fasta", stem, index)
}

/// Copies each record of a multi-fasta into its own file, lines untouched.
pub fn split_fasta_lines<R: BufRead>(input: R, stem: &str, out_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut current: Option<BufWriter<File>> = None;
    let mut skipped = 0;

    for line in input.lines() {
        let line = line?;
        if line.as_bytes().first() == Some(&HEADER_START) {
            if let Some(mut w) = current.take() { w.flush()?; }
            let path = out_dir.join(split_file_name(stem, written.len() + 1));
            current = Some(BufWriter::new(File::create(&path)?));
            written.push(path);
        }

        match current.as_mut() {
            Some(w) => writeln!(w, "{}", line)?,
            None => skipped += 1,
        }
    }
    if let Some(mut w) = current { w.flush()?; }

    if skipped > 0 {
        warn!("{} lines before the first fasta header were skipped", skipped);
    }
    Ok(written)
}

pub fn split_fasta(fasta_file: &Path, out_dir: &Path) -> io::Result<usize> {
    let stem = fasta_file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "split".to_string());

    info!("Splitting {} into {}", fasta_file.display(), out_dir.display());
    let rdr = BufReader::new(File::open(fasta_file)?);
    let files = split_fasta_lines(rdr, &stem, out_dir)?;
    info!("{} fasta files were written.", files.len());
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fastq_gets_one_quality_per_base() {
        let fasta = b">read1 some description\nACGT\nAC\n>read2\nTT\n";
        let mut out = Vec::new();
        let n = write_fastq_records(&fasta[..], &mut out).unwrap();

        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap(),
                   "@read1\nACGTAC\n+\n~~~~~~\n@read2\nTT\n+\n~~\n");
    }

    #[test]
    fn empty_fasta_gives_empty_fastq() {
        let mut out = Vec::new();
        assert_eq!(write_fastq_records(&b""[..], &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn split_writes_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = "junk\n>a\nAC\nGT\n>b\nTT\n";
        let files = split_fasta_lines(fasta.as_bytes(), "genes", dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0], dir.path().join("genes_1.fasta"));
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), ">a\nAC\nGT\n");
        assert_eq!(fs::read_to_string(&files[1]).unwrap(), ">b\nTT\n");
    }
}
