use crate::error::Result;
use crate::reachability::UnmarkedNode;
use serde::{Serialize, Serializer};
use std::path::Path;

/// Unreachable vertex with the origin it was classified by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnreachableEntry {
    pub oid: String,
    pub origin: String,
}

impl UnreachableEntry {
    pub fn new(oid: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            origin: origin.into(),
        }
    }

    /// `oid (origin)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.oid, self.origin)
    }
}

impl From<&UnmarkedNode> for UnreachableEntry {
    fn from(node: &UnmarkedNode) -> Self {
        Self::new(
            node.oid.clone(),
            node.origin.as_ref().map_or("", |o| o.as_str()),
        )
    }
}

impl Serialize for UnreachableEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// Outcome of reachability analysis and re-classification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReachabilityReport {
    /// Traceable vertices still unreachable: defects in the metadata
    pub orphans: Vec<UnreachableEntry>,

    /// Vertices whose origin explains why nothing feeds them
    pub expected_unreachable: Vec<UnreachableEntry>,

    /// Terminal OIDs attached to root during re-classification
    pub added_to_root: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<Vec<String>>,
}

impl ReachabilityReport {
    /// No orphans were found
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }

    pub fn orphan_oids(&self) -> impl Iterator<Item = &str> {
        self.orphans.iter().map(|e| e.oid.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Tab-delimited `oid`, `origin`, `expected` table, orphans first
    pub fn to_text(&self) -> String {
        let mut out = String::from("oid\torigin\texpected\n");
        let rows = self
            .orphans
            .iter()
            .map(|e| (e, "no"))
            .chain(self.expected_unreachable.iter().map(|e| (e, "yes")));
        for (entry, expected) in rows {
            out.push_str(&format!("{}\t{}\t{}\n", entry.oid, entry.origin, expected));
        }
        out
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Reachability report written to {}", path.display());
        Ok(())
    }

    pub fn write_text(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}
