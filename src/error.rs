use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of the matching core degrades gracefully instead of erroring: malformed or empty
/// instruction streams produce empty results, unknown block ids resolve to `None`, and bounded
/// fixpoints return a best-effort state plus a diagnostic. The variants below are reserved for
/// genuine contract violations and for I/O performed by the injected load/save capabilities.
///
/// # Error Categories
///
/// ## Contract Violations
/// - [`Error::Contract`] - A caller violated an API precondition (e.g. a ragged score matrix)
///
/// ## I/O and Persistence
/// - [`Error::FileError`] - Filesystem I/O errors from weight-store or cache persistence
/// - [`Error::CacheFormat`] - A persisted cache or weight file carries an unusable layout
#[derive(Error, Debug)]
pub enum Error {
    /// A caller violated an API precondition.
    ///
    /// These are the only failures the scoring and assignment layer treats as unrecoverable,
    /// e.g. passing a ragged score matrix to the generic bipartite assigner.
    #[error("contract violation: {0}")]
    Contract(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors from the injected load/save capabilities of the corpus
    /// weight store and the feature cache.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A persisted file carries an unusable layout.
    ///
    /// Raised when a cache file exceeds the bounded read size. A plain magic-header mismatch
    /// is not an error; it is treated as an empty cache.
    #[error("unusable persisted data: {0}")]
    CacheFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Contract("ragged matrix".to_string());
        assert_eq!(err.to_string(), "contract violation: ragged matrix");

        let err = Error::CacheFormat("cache exceeds read bound".to_string());
        assert_eq!(err.to_string(), "unusable persisted data: cache exceeds read bound");
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::FileError(_)));
    }
}
