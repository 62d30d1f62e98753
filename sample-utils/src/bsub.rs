use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;
use log::{info, warn};

use super::errors::UtilsError;

pub const PLACEHOLDER: &str = "###";

#[derive(Debug, Clone)]
pub struct BsubOptions {
    pub command_template: String,
    pub email: bool,
    pub group: usize,
    pub memory: String,
    pub out: String,
    pub queue: String,
}

impl Default for BsubOptions {
    fn default() -> BsubOptions {
        BsubOptions {
            command_template: String::new(),
            email: false,
            group: 10,
            memory: "8".to_string(),
            out: "output_bsub".to_string(),
            queue: "regevlab".to_string(),
        }
    }
}

pub fn read_samples<R: BufRead>(input: R) -> Result<Vec<String>, Box<dyn Error>> {
    let mut samples = Vec::new();
    for line in input.lines() {
        let line = line?;
        let sample = line.trim_end_matches('\r');
        if !sample.is_empty() {
            samples.push(sample.to_string());
        }
    }
    Ok(samples)
}

pub fn make_command(sample: &str, opts: &BsubOptions) -> String {
    let email = if opts.email { "-N " } else { "" };
    format!("bsub -q {} -R rusage[mem={}] {}-e {}.err -o {}.out {}",
            opts.queue, opts.memory, email, sample, sample,
            opts.command_template.replace(PLACEHOLDER, sample))
}

/// Writes the commands `group` per script, to `<out>0.sh`, `<out>1.sh`, ...
pub fn write_bsub_files(commands: &[String], opts: &BsubOptions) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if opts.group == 0 {
        return Err(Box::new(UtilsError::EmptyGroup));
    }
    if commands.is_empty() {
        warn!("No samples were given, no scripts were made.");
    }

    let mut scripts = Vec::new();
    for (i, chunk) in commands.chunks(opts.group).enumerate() {
        let path = PathBuf::from(format!("{}{}.sh", opts.out, i));
        let mut out = BufWriter::new(File::create(&path)?);
        for command in chunk {
            writeln!(out, "{}", command)?;
        }
        out.flush()?;
        scripts.push(path);
    }
    info!("{} commands written to {} scripts.", commands.len(), scripts.len());
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn command_layout() {
        let mut opts = BsubOptions::default();
        opts.command_template = "run.sh ###.fastq > ###.txt".to_string();
        assert_eq!(make_command("s1", &opts),
                   "bsub -q regevlab -R rusage[mem=8] -e s1.err -o s1.out run.sh s1.fastq > s1.txt");
        opts.email = true;
        assert!(make_command("s1", &opts).contains("rusage[mem=8] -N -e s1.err"));
    }

    #[test]
    fn commands_are_grouped_without_trailing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = BsubOptions::default();
        opts.group = 2;
        opts.out = dir.path().join("jobs").display().to_string();

        let samples = read_samples("a\nb\n\nc\nd\n".as_bytes()).unwrap();
        let commands: Vec<String> = samples.iter().map(|s| make_command(s, &opts)).collect();
        let scripts = write_bsub_files(&commands, &opts).unwrap();
        assert_eq!(scripts.len(), 2);
        assert!(!dir.path().join("jobs2.sh").exists());
        let second = fs::read_to_string(dir.path().join("jobs1.sh")).unwrap();
        assert_eq!(second.lines().count(), 2);
        assert!(second.contains("-e c.err"));
    }
}
