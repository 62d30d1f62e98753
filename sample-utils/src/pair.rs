use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use itertools::Itertools;
use log::{debug, warn};

use super::errors::UtilsError;

pub type Pairs = BTreeMap<String, (PathBuf, PathBuf)>;

fn absolute(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// Pairs consecutive names sharing the prefix before `sentinel`. Names must be sorted.
pub fn pair_names<'a>(names: &[&'a str], sentinel: &str) -> Vec<(&'a str, &'a str, &'a str)> {
    let mut pairs = Vec::new();
    let mut prev: Option<(&str, &str)> = None;

    for &name in names.iter() {
        let key = match name.find(sentinel) {
            Some(i) => &name[..i],
            None => {
                warn!("{} has no '{}' and can not be paired", name, sentinel);
                continue;
            }
        };
        match prev {
            Some((prev_key, prev_name)) if prev_key == key => {
                pairs.push((key, prev_name, name));
                prev = None;
            }
            _ => prev = Some((key, name)),
        }
    }
    pairs
}

/// Pairs the files of `dir` ending with `suffix`, keyed by their prefix.
pub fn pair_samples(dir: &Path, suffix: &str, sentinel: &str) -> Result<Pairs, Box<dyn Error>> {
    if !dir.exists() {
        return Err(Box::new(UtilsError::MissingDirectory(dir.display().to_string())));
    }
    let abs_dir = absolute(dir)?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.file_name().to_string_lossy().to_string());
    }
    let names = entries.iter()
        .filter(|n| n.len() > suffix.len() && n.ends_with(suffix))
        .map(|n| n.as_str())
        .sorted()
        .collect_vec();

    let mut pairs = Pairs::new();
    for (key, left, right) in pair_names(&names, sentinel) {
        debug!("Paired {} and {}", left, right);
        pairs.insert(key.to_string(), (abs_dir.join(left), abs_dir.join(right)));
    }
    Ok(pairs)
}

pub fn write_pairs<W: Write>(output: &mut W, pairs: &Pairs) -> Result<(), Box<dyn Error>> {
    for (key, (left, right)) in pairs.iter() {
        writeln!(output, "{}\t{}\t{}", key, left.display(), right.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_names_are_paired() {
        let names = ["a_1.fastq", "a_2.fastq", "b_1.fastq", "c_1.fastq", "c_2.fastq", "c_3.fastq", "nosep.fastq"];
        let pairs = pair_names(&names, "_");
        assert_eq!(pairs, vec![
            ("a", "a_1.fastq", "a_2.fastq"),
            ("c", "c_1.fastq", "c_2.fastq"),
        ]);
    }

    #[test]
    fn directory_files_are_paired_with_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in &["s1_R1.fastq", "s1_R2.fastq", "s2_R1.fastq", "notes.txt", ".fastq"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let pairs = pair_samples(dir.path(), ".fastq", "_").unwrap();
        assert_eq!(pairs.len(), 1);
        let (left, right) = &pairs["s1"];
        assert!(left.is_absolute());
        assert!(left.ends_with("s1_R1.fastq"));
        assert!(right.ends_with("s1_R2.fastq"));

        let mut out = Vec::new();
        write_pairs(&mut out, &pairs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("s1\t"));
        assert_eq!(text.matches('\t').count(), 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(pair_samples(Path::new("/nonexistent/dir"), ".fastq", "_").is_err());
    }
}
