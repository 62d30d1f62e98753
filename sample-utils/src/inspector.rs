use std::error::Error;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use log::{debug, info};
use serde_json::Value;

use super::errors::UtilsError;

pub const INSPECTOR_JSON: &str = "pipeline_inspector.json";
const BAM_FIELDS: [&str; 2] = ["DNA", "RNA"];
const INDEX_EXTENSION: &str = ".bai";

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn with_index(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), INDEX_EXTENSION))
}

/// Points the DNA and RNA bams of every sample into `out_dir`, returning the links to make.
pub fn relocate_bams(samples: &mut Value, out_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>, Box<dyn Error>> {
    let mut links = Vec::new();
    let samples = match samples.as_object_mut() {
        Some(s) => s,
        None => return Err(Box::new(UtilsError::EmptyJson)),
    };

    for (name, sample) in samples.iter_mut() {
        for field in BAM_FIELDS.iter() {
            let old = sample.get(*field).and_then(|v| v.as_str()).map(PathBuf::from)
                .ok_or_else(|| UtilsError::MissingSampleField { sample: name.clone(), field: *field })?;
            let base = old.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            let new = out_dir.join(base);
            sample[*field] = Value::String(new.display().to_string());
            debug!("{} {}: {} -> {}", name, field, old.display(), new.display());
            links.push((old, new));
        }
    }
    Ok(links)
}

/// Rewrites a validation pipeline JSON for the inspector and links the bams it refers to.
pub fn convert_pipeline_json(out_dir: &Path, input_json: &Path) -> Result<usize, Box<dyn Error>> {
    let out_json = out_dir.join(INSPECTOR_JSON);
    if out_json.exists() {
        return Err(Box::new(UtilsError::JsonExists(out_json.display().to_string())));
    }
    if out_dir.exists() {
        return Err(Box::new(UtilsError::OutputDirExists(out_dir.display().to_string())));
    }

    let mut samples: Value = serde_json::from_reader(BufReader::new(File::open(input_json)?))?;
    if is_empty_json(&samples) {
        return Err(Box::new(UtilsError::EmptyJson));
    }
    let links = relocate_bams(&mut samples, out_dir)?;

    fs::create_dir_all(out_dir)?;
    for (old, new) in links.iter() {
        symlink(old, new)?;
        symlink(with_index(old), with_index(new))?;
    }

    let mut out = File::create(&out_json)?;
    out.write_all(serde_json::to_string_pretty(&samples)?.as_bytes())?;
    info!("{} bams linked into {}, inspector json written to {}", links.len(), out_dir.display(), out_json.display());
    Ok(links.len())
}
