use thiserror::Error;
use trace_metadata::MetadataError;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Vertex not found: {0}")]
    VertexNotFound(String),

    /// A source reference that still has no vertex after reconciliation
    #[error("Unresolved source reference {oid} (required by {target})")]
    UnresolvedReference { oid: String, target: String },

    #[error("Deep trace failed for {oid}: {reason}")]
    TraceFailed { oid: String, reason: String },

    #[error("Export error: {0}")]
    Export(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
