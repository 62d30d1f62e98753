use std::{error, fmt};

/// Failures that end a bucket-transfer run with a dedicated exit code.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferError {
    FailedTransfers(Vec<String>),
    MissingMapFile(String),
    NotOkDuringConversion(String),
    NotOkDuringCheck(Vec<String>),
    TempLogExists(String),
    DuplicateMapKey(String),
    DuplicateMapValue(String),
    ContradictoryMoleculeFilters,
    MissingColumn(&'static str),
    MissingLsField { file: String, field: &'static str },
}

impl TransferError {
    pub fn exit_code(&self) -> i32 {
        match self {
            TransferError::FailedTransfers(_) => 301,
            TransferError::MissingMapFile(_) => 302,
            TransferError::NotOkDuringConversion(_) => 303,
            TransferError::NotOkDuringCheck(_) => 304,
            TransferError::TempLogExists(_) => 305,
            TransferError::DuplicateMapKey(_) => 306,
            TransferError::DuplicateMapValue(_) => 307,
            TransferError::ContradictoryMoleculeFilters => 311,
            TransferError::MissingColumn(_) => 312,
            TransferError::MissingLsField { .. } => 313,
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransferError::FailedTransfers(files) =>
                write!(f, "The following files were not transferred OK: {}", files.join(", ")),
            TransferError::MissingMapFile(p) =>
                write!(f, "The mapping file {} does not exist. Mapping file must be provided.", p),
            TransferError::NotOkDuringConversion(p) =>
                write!(f, "The following file is not OK, the log can not be converted: {}", p),
            TransferError::NotOkDuringCheck(files) =>
                write!(f, "{} files in the gsutil log are not OK: {}", files.len(), files.join(", ")),
            TransferError::TempLogExists(p) =>
                write!(f, "Can not make temp historic log copy, the destination {} already exists.", p),
            TransferError::DuplicateMapKey(id) =>
                write!(f, "The mapping file contains duplicate HTAPP/SMP ids, they must be unique. ID={}", id),
            TransferError::DuplicateMapValue(id) =>
                write!(f, "The mapping file contains duplicate HTAN ids, they must be unique. ID={}", id),
            TransferError::ContradictoryMoleculeFilters =>
                write!(f, "Only one class of bams can be requested."),
            TransferError::MissingColumn(c) =>
                write!(f, "Expected column {} was not found in the header.", c),
            TransferError::MissingLsField { file, field } =>
                write!(f, "The listing of {} has no {} entry.", file, field),
        }
    }
}

impl error::Error for TransferError {}

/// Exit code for a run that finished but failed its id checks.
pub const COMPLETED_WITH_ERROR: i32 = 400;
