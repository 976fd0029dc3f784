use thiserror::Error;

/// Result type alias for SIO and disk image operations
pub type Result<T> = std::result::Result<T, SioError>;

/// Errors that can occur when mounting images or restoring drive state
#[derive(Debug, Error)]
pub enum SioError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Drive unit outside 1..=8
    #[error("Invalid drive unit {unit} (expected 1-{max})")]
    InvalidUnit {
        /// Unit number as requested
        unit: usize,
        /// Highest valid unit number
        max: usize,
    },

    /// Path does not fit the platform filename limit
    #[error("Path too long: {len} bytes (max: {max})")]
    PathTooLong {
        /// Length of the rejected path in bytes
        len: usize,
        /// Longest accepted path
        max: usize,
    },

    /// Path cannot be stored as a filename (not valid UTF-8)
    #[error("Path is not valid UTF-8: {}", .0.display())]
    InvalidPath(std::path::PathBuf),

    /// Image is shorter than the 16-byte header
    #[error("Truncated header: read {read} of {expected} bytes")]
    TruncatedHeader {
        /// Bytes actually available
        read: usize,
        /// Bytes required
        expected: usize,
    },

    /// Image ends before a region that geometry detection needs
    #[error("Truncated image at offset {offset}: {message}")]
    TruncatedImage {
        /// Byte offset of the missing region
        offset: u64,
        /// What was being read
        message: String,
    },

    /// ATR header declares a sector size other than 128 or 256
    #[error("Invalid sector size {0} (expected 128 or 256)")]
    InvalidSectorSize(u16),

    /// Image format is recognised but cannot be handled
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decompression collaborator reported a failure
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Saved drive state could not be decoded
    #[error("Invalid saved state: {0}")]
    InvalidState(String),
}

impl SioError {
    /// Create a truncated image error with context
    pub fn truncated<S: Into<String>>(offset: u64, message: S) -> Self {
        SioError::TruncatedImage {
            offset,
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        SioError::UnsupportedFormat(message.into())
    }

    /// Create a decompression error
    pub fn decompression<S: Into<String>>(message: S) -> Self {
        SioError::Decompression(message.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        SioError::InvalidState(message.into())
    }
}
