use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompressionError>;

/// Failures of a single recompression. None of them are retried here; the
/// Lambda runtime reports them and the platform decides what happens next.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("no bucket name found in S3 event record")]
    MissingBucket,

    #[error("no object key found in S3 event record")]
    MissingKey,

    #[error("object key {0:?} is not valid UTF-8 once decoded")]
    InvalidKey(String),

    #[error("S3 {operation} failed for {bucket}/{key}: {message}")]
    S3 {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to read body of {bucket}/{key}: {message}")]
    Body {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("transcode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
