use thiserror::Error;

pub use biffdump_offcrypto::OffcryptoError;

/// Fatal decoding errors.
///
/// Two non-fatal conditions deliberately do not appear here: unknown record
/// ids are skipped (with a once-per-id warning), and recognized-but-undecoded
/// payloads surface as [`crate::Value::Unsupported`] inside the value tree.
#[derive(Debug, Error)]
pub enum BiffError {
    /// The stream is not a BIFF8 workbook stream (missing or non-BIFF8 BOF).
    #[error("unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    /// Decryption failed: unsupported scheme or wrong password.
    #[error(transparent)]
    Decrypt(#[from] OffcryptoError),

    /// A record header or payload extends past the end of the stream.
    #[error("workbook stream is truncated: {0}")]
    Truncated(&'static str),

    /// Structurally invalid input (bad counts, runaway continuations, a
    /// record too short for its mandatory fields).
    #[error("malformed workbook stream: {0}")]
    Malformed(String),

    /// Compound-file access failed (only the `.xls` convenience helper).
    #[error("container error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BiffError>;
