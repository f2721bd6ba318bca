//! # Trace Metadata
//!
//! Namespace-aware element trees for the study metadata documents consumed by
//! the trace graph builders.
//!
//! ## Architecture
//!
//! ```text
//! ODM-XML / Define-XML file
//!     │
//!     ├──> quick-xml NsReader (namespace resolution)
//!     │
//!     └──> MetadataDocument
//!            ├─ MetadataElement tree (namespace URI + local name)
//!            ├─ attribute lookup (plain and namespaced)
//!            └─ child lookup by namespace and tag name
//! ```
//!
//! The builders never see XML events; they ask an element for an attribute
//! or for its children named `X` in namespace `N`.

mod document;
mod element;
mod error;

pub use document::{MetadataDocument, Namespaces, DEF_NS, ODM_NS, TRACE_NS};
pub use element::{MetadataAttribute, MetadataElement};
pub use error::{MetadataError, Result};
