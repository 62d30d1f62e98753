use std::{error, fmt};

#[derive(Debug, Clone)]
pub struct GmapLineError {
    pub line: usize,
    pub reason: &'static str,
}

impl fmt::Display for GmapLineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Malformed GMAP line {}: {}.", self.line, self.reason)
    }
}

impl error::Error for GmapLineError {}

#[derive(Debug, Clone)]
pub struct DuplicateHeaderError(pub String);

impl fmt::Display for DuplicateHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Found duplicate alignment header {}.", self.0)
    }
}

impl error::Error for DuplicateHeaderError {}

#[derive(Debug, Clone)]
pub struct DuplicateDepthError(pub String);

impl fmt::Display for DuplicateDepthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Duplicate entry found in depth file for {}.", self.0)
    }
}

impl error::Error for DuplicateDepthError {}

#[derive(Debug, Clone)]
pub struct VcfLineError {
    pub line: usize,
    pub reason: &'static str,
}

impl fmt::Display for VcfLineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Malformed VCF line {}: {}.", self.line, self.reason)
    }
}

impl error::Error for VcfLineError {}
