//! Error types for PDF generation.

/// Result type alias for PDF generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while generating a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The output file could not be created. This is fatal for the run.
    #[error("unable to create {path}: {source}")]
    Create {
        /// Path of the output file
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A listing, text, or attachment input could not be opened.
    ///
    /// Callers skip the failing directive and continue with the rest of
    /// the document.
    #[error("unable to open {path}: {source}")]
    SourceFile {
        /// Path of the input file
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// An image collaborator failed to produce pixel data.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// IO error while writing the output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
