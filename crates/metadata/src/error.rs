use thiserror::Error;

/// Result type for metadata document operations
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors raised while reading a metadata document
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The file could not be opened or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be decoded
    #[error("Attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// A structurally required element is absent
    #[error("Missing element <{name}> under <{parent}>")]
    MissingElement { parent: String, name: String },

    /// Element left open at end of input, or closed without being opened
    #[error("Unbalanced element <{0}>")]
    Unbalanced(String),

    /// The document has no root element
    #[error("Document has no root element")]
    Empty,
}

impl MetadataError {
    /// Create a missing element error
    pub fn missing(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingElement {
            parent: parent.into(),
            name: name.into(),
        }
    }
}
