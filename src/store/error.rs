use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("A file named \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("No file named \"{0}\"")]
    NotFound(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Failed to read ZIP archive: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for StoreError {
    fn from(err: zip::result::ZipError) -> Self {
        StoreError::Archive(err.to_string())
    }
}
