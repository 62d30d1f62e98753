use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use ahash::AHashMap;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Md5Status {
    Ok,
    Mismatch,
    NotInTruth,
}

impl fmt::Display for Md5Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Md5Status::Ok => write!(f, "OK"),
            Md5Status::Mismatch => write!(f, "FAIL (md5sum)"),
            Md5Status::NotInTruth => write!(f, "FAIL (FILE NOT IN TRUTH FILE)"),
        }
    }
}

/// Hash and file name of an `md5sum` output line. Binary mode names start with `*`.
pub fn parse_md5_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let mut parts = line.splitn(2, char::is_whitespace);
    let hash = parts.next()?;
    let name = parts.next()?.trim_start();
    let name = name.strip_prefix('*').unwrap_or(name);
    if hash.is_empty() || name.is_empty() {
        return None;
    }
    Some((hash, name))
}

pub fn read_md5_lines<R: BufRead>(input: R) -> Result<Vec<(String, String)>, Box<dyn Error>> {
    let mut sums = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_md5_line(&line) {
            Some((hash, name)) => sums.push((hash.to_string(), name.to_string())),
            None => warn!("Skipping malformed md5sum line: {}", line),
        }
    }
    Ok(sums)
}

#[derive(Debug, Default)]
pub struct Md5Report {
    pub results: Vec<(Md5Status, String)>,
}

impl Md5Report {
    pub fn count(&self, status: Md5Status) -> usize {
        self.results.iter().filter(|(s, _)| *s == status).count()
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), Box<dyn Error>> {
        writeln!(out, "OK:   {}", self.count(Md5Status::Ok))?;
        writeln!(out, "Fail (md5sum): {}", self.count(Md5Status::Mismatch))?;
        writeln!(out, "Fail (FILE NOT IN TRUTH FILE): {}", self.count(Md5Status::NotInTruth))?;
        for (status, name) in self.results.iter() {
            writeln!(out, "{} {}", status, name)?;
        }
        Ok(())
    }
}

pub fn compare_md5sums(truth: &[(String, String)], check: &[(String, String)]) -> Md5Report {
    let mut truth_sums: AHashMap<&str, &str> = AHashMap::new();
    for (hash, name) in truth.iter() {
        truth_sums.insert(name.as_str(), hash.as_str());
    }
    info!("Read in truth file of {} unique entries.", truth_sums.len());

    let results = check.iter()
        .map(|(hash, name)| {
            let status = match truth_sums.get(name.as_str()) {
                Some(expected) if *expected == hash.as_str() => Md5Status::Ok,
                Some(_) => Md5Status::Mismatch,
                None => Md5Status::NotInTruth,
            };
            (status, name.clone())
        })
        .collect();
    Md5Report { results }
}

pub fn check_report_path(check_file: &Path) -> PathBuf {
    PathBuf::from(format!("{}.check.txt", check_file.display()))
}

/// Compares the check file against the truth file and writes `<check>.check.txt`.
pub fn check_md5sums(check_file: &Path, truth_file: &Path) -> Result<Md5Report, Box<dyn Error>> {
    let truth = read_md5_lines(BufReader::new(File::open(truth_file)?))?;
    let check = read_md5_lines(BufReader::new(File::open(check_file)?))?;
    let report = compare_md5sums(&truth, &check);

    let out_file = check_report_path(check_file);
    info!("Writing results to {}.", out_file.display());
    let mut out = BufWriter::new(File::create(&out_file)?);
    report.write(&mut out)?;
    out.flush()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn md5sum_lines() {
        assert_eq!(parse_md5_line("d41d8cd98f00b204e9800998ecf8427e  a.fastq"), Some(("d41d8cd98f00b204e9800998ecf8427e", "a.fastq")));
        assert_eq!(parse_md5_line("abc *b.bam"), Some(("abc", "b.bam")));
        assert_eq!(parse_md5_line("abc  dir/my file.txt"), Some(("abc", "dir/my file.txt")));
        assert_eq!(parse_md5_line("abc"), None);
    }

    #[test]
    fn report_counts_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let truth = dir.path().join("truth.md5");
        let check = dir.path().join("check.md5");
        fs::write(&truth, "aaa  a.fastq\nbbb  b.fastq\n").unwrap();
        fs::write(&check, "aaa  a.fastq\nxxx  b.fastq\nccc  c.fastq\n").unwrap();

        let report = check_md5sums(&check, &truth).unwrap();
        assert_eq!(report.count(Md5Status::Ok), 1);

        let text = fs::read_to_string(dir.path().join("check.md5.check.txt")).unwrap();
        assert_eq!(text, "OK:   1\nFail (md5sum): 1\nFail (FILE NOT IN TRUTH FILE): 1\n\
                          OK a.fastq\nFAIL (md5sum) b.fastq\nFAIL (FILE NOT IN TRUTH FILE) c.fastq\n");
    }
}
