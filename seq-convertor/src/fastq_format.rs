use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ascii::{AsciiChar, AsciiString};
use log::{info, warn};
use seq_io::fastq::{self, Record};

// Sanger and Illumina 1.8
const SANGER_ILLUMINA8: &[u8] = b"!\"#$%&'()*+,-./0123456789:";
// Sanger, Solexa and Illumina 1.8
const SANGER_SOLEXA_ILLUMINA8: &[u8] = b";<=>?";
// Sanger, Solexa, Illumina 1.5 and 1.8
const SANGER_SOLEXA_ILLUMINA5_8: &[u8] = b"@A";
// Every encoding, not discriminant
const ANY_ENCODING: &[u8] = b"BCDEFGHIJ";
// Solexa, Illumina 1.3 and 1.5
const SOLEXA_ILLUMINA3_5: &[u8] = b"KLMNOPQRSTUVWXYZ[\\]^_`abcdefgh";
// Too high for any fastq encoding
const NOT_VALID: &[u8] = b"ijklmnopqrstuvwxyz{|}~";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Illumina18,
    SangerOrIllumina18,
    Solexa,
    SolexaOrIllumina18,
    SangerSolexaOrIllumina18,
    SolexaOrIllumina13OrIllumina15,
    Unknown,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Encoding::Illumina18 => write!(f, "This must be Illumina 1.8+ Phred+33."),
            Encoding::SangerOrIllumina18 => write!(f, "This file may either be Sanger Phred+33 or Illumina 1.8+ Phred+33."),
            Encoding::Solexa => write!(f, "This must be Solexa+64."),
            Encoding::SolexaOrIllumina18 => write!(f, "This is either Solexa+64 or Illumina 1.8+ Phred+33."),
            Encoding::SangerSolexaOrIllumina18 => write!(f, "This could be either Sanger Phred+33, Solexa+64 or Illumina 1.8+ Phred+33."),
            Encoding::SolexaOrIllumina13OrIllumina15 => write!(f, "This file is either Solexa+64, Illumina 1.3+ Phred+64, or Illumina 1.5+ Phred+64."),
            Encoding::Unknown => write!(f, "The quality encoding of this file could not be determined."),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub observed: BTreeSet<AsciiChar>,
    pub has_invalid: bool,
    pub encoding: Encoding,
}

impl QualityReport {
    pub fn observed_string(&self) -> AsciiString {
        self.observed.iter().copied().collect()
    }

    /// Observed characters shared by every encoding.
    pub fn non_discriminant(&self) -> AsciiString {
        self.observed.iter().copied().filter(|ch| ANY_ENCODING.contains(&ch.as_byte())).collect()
    }
}

fn any_of(observed: &BTreeSet<AsciiChar>, class: &[u8]) -> bool {
    observed.iter().any(|ch| class.contains(&ch.as_byte()))
}

pub fn classify(observed: &BTreeSet<AsciiChar>) -> Encoding {
    let has_j = observed.contains(&AsciiChar::J);

    if any_of(observed, SANGER_ILLUMINA8) {
        if has_j { Encoding::Illumina18 } else { Encoding::SangerOrIllumina18 }
    } else if any_of(observed, SANGER_SOLEXA_ILLUMINA8) {
        if any_of(observed, SOLEXA_ILLUMINA3_5) {
            Encoding::Solexa
        } else if has_j {
            Encoding::SolexaOrIllumina18
        } else {
            Encoding::SangerSolexaOrIllumina18
        }
    } else if any_of(observed, SANGER_SOLEXA_ILLUMINA5_8) {
        if has_j { Encoding::SolexaOrIllumina18 } else { Encoding::SangerSolexaOrIllumina18 }
    } else if any_of(observed, SOLEXA_ILLUMINA3_5) {
        Encoding::SolexaOrIllumina13OrIllumina15
    } else {
        Encoding::Unknown
    }
}

/// Distinct quality characters of all reads, and whether any byte was not ascii.
pub fn collect_qualities<R: Read>(input: R) -> Result<(BTreeSet<AsciiChar>, bool), Box<dyn Error>> {
    let mut reader = fastq::Reader::new(input);
    let mut seen = [false; 256];
    let mut observed = BTreeSet::new();
    let mut non_ascii = false;

    while let Some(record) = reader.next() {
        let record = record?;
        for &q in record.qual() {
            if seen[q as usize] { continue; }
            seen[q as usize] = true;
            match AsciiChar::from_ascii(q) {
                Ok(ch) => { observed.insert(ch); },
                Err(_) => {
                    warn!("Found a non ascii quality value {} in read {}", q, String::from_utf8_lossy(record.head()));
                    non_ascii = true;
                }
            }
        }
    }
    Ok((observed, non_ascii))
}

pub fn guess_quality_encoding<R: Read>(input: R) -> Result<QualityReport, Box<dyn Error>> {
    let (observed, non_ascii) = collect_qualities(input)?;
    let has_invalid = non_ascii || any_of(&observed, NOT_VALID);
    let encoding = classify(&observed);
    Ok(QualityReport { observed, has_invalid, encoding })
}

pub fn guess_fastq_format(fastq_file: &Path) -> Result<QualityReport, Box<dyn Error>> {
    info!("Reading file {}", fastq_file.display());
    let report = guess_quality_encoding(File::open(fastq_file)?)?;

    info!("The following quality scores were found: {}", report.observed_string());
    if report.has_invalid {
        warn!("Not valid, contained values too high for fastq quality scores. ie {}",
              String::from_utf8_lossy(NOT_VALID));
    }
    if report.encoding == Encoding::Unknown && !report.non_discriminant().is_empty() {
        info!("Only quality scores shared by every encoding were found: {}", report.non_discriminant());
    }
    info!("{}", report.encoding);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(quals: &[&str]) -> QualityReport {
        let mut fq = String::new();
        for (i, q) in quals.iter().enumerate() {
            fq.push_str(&format!("@r{}\n{}\n+\n{}\n", i, "A".repeat(q.len()), q));
        }
        guess_quality_encoding(fq.as_bytes()).unwrap()
    }

    #[test]
    fn phred33_with_j_is_illumina18() {
        assert_eq!(guess(&["#5IJ", "AAFF"]).encoding, Encoding::Illumina18);
        assert_eq!(guess(&["#5II"]).encoding, Encoding::SangerOrIllumina18);
    }

    #[test]
    fn mid_range_with_high_chars_is_solexa() {
        assert_eq!(guess(&[";;hh"]).encoding, Encoding::Solexa);
        assert_eq!(guess(&[";;JJ"]).encoding, Encoding::SolexaOrIllumina18);
        assert_eq!(guess(&["??BB"]).encoding, Encoding::SangerSolexaOrIllumina18);
    }

    #[test]
    fn at_and_a_without_lower_classes() {
        assert_eq!(guess(&["@AJ"]).encoding, Encoding::SolexaOrIllumina18);
        assert_eq!(guess(&["@AB"]).encoding, Encoding::SangerSolexaOrIllumina18);
    }

    #[test]
    fn phred64_only() {
        let report = guess(&["KLhh", "BBJ"]);
        assert_eq!(report.encoding, Encoding::SolexaOrIllumina13OrIllumina15);
        assert!(!report.has_invalid);
    }

    #[test]
    fn not_discriminant_and_invalid() {
        let report = guess(&["BBCC~"]);
        assert!(report.has_invalid);
        assert_eq!(report.encoding, Encoding::Unknown);
        assert_eq!(report.observed_string().as_str(), "BC~");
        assert_eq!(report.non_discriminant().as_str(), "BC");
    }

    #[test]
    fn non_ascii_quality_marks_invalid_and_continues() {
        let fq = b"@r0\nAAA\n+\nB\xffJ\n@r1\nAA\n+\n#5\n";
        let report = guess_quality_encoding(&fq[..]).unwrap();
        assert!(report.has_invalid);
        assert_eq!(report.observed_string().as_str(), "#5BJ");
        assert_eq!(report.encoding, Encoding::Illumina18);
    }
}
