use std::{error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum UtilsError {
    MissingDirectory(String),
    UnknownMode(String),
    EmptyGroup,
    JsonExists(String),
    OutputDirExists(String),
    EmptyJson,
    MissingSampleField { sample: String, field: &'static str },
}

impl UtilsError {
    pub fn exit_code(&self) -> i32 {
        match self {
            UtilsError::JsonExists(_) => 101,
            UtilsError::OutputDirExists(_) => 102,
            UtilsError::EmptyJson => 103,
            _ => 1,
        }
    }
}

impl fmt::Display for UtilsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UtilsError::MissingDirectory(d) => write!(f, "Path does not exist. Path = {}", d),
            UtilsError::UnknownMode(m) => write!(f, "Unknown rename mode {}, expected flat or mut_bam", m),
            UtilsError::EmptyGroup => write!(f, "Group size must be at least one command per file"),
            UtilsError::JsonExists(p) =>
                write!(f, "The json file that would be made already exists. Please delete or rename it. File = {}", p),
            UtilsError::OutputDirExists(d) =>
                write!(f, "The output directory already exists. Please delete it to move forward. Dir = {}", d),
            UtilsError::EmptyJson => write!(f, "JSON file was empty."),
            UtilsError::MissingSampleField { sample, field } =>
                write!(f, "Sample {} has no {} entry", sample, field),
        }
    }
}

impl error::Error for UtilsError {}
