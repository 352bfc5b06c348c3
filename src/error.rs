use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecolorError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A color key string that does not have exactly three numeric fields.
    /// Means the caller and the index disagree, so it is never defaulted.
    #[error("Malformed color key: {0:?}")]
    MalformedColorKey(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Buffer size mismatch: {width}x{height} needs {expected} bytes, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("A recolor operation is already in flight for this session")]
    Busy,

    #[error("Processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, RecolorError>;

// Serialize as the display string so errors can cross a UI boundary
impl serde::Serialize for RecolorError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_message() {
        let err = RecolorError::MalformedColorKey("1,2".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Malformed color key: \\\"1,2\\\"\"");
    }

    #[test]
    fn test_buffer_size_message() {
        let err = RecolorError::BufferSize {
            width: 2,
            height: 2,
            expected: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "Buffer size mismatch: 2x2 needs 16 bytes, got 12"
        );
    }
}
