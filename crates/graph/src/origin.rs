use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Declared provenance of a data element (`def:Origin/@Type` plus the
/// Trace-XML additions `Method`, `Collection` and derived-without-sources)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Derived,
    Crf,
    Predecessor,
    /// Origin element present without a type ("None")
    NotCollected,
    Assigned,
    Protocol,
    Method,
    Collection,
    /// Derived, but flagged with `trc:NoTraceItems="Yes"`
    DerivedNoSource,
    /// Any tag outside the known set, kept verbatim
    Other(String),
}

/// Traceability expectation implied by an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traceability {
    /// Expected to resolve to upstream sources
    Traceable,
    /// Expected to terminate without upstream sources
    NotTraceable,
    /// Unknown or missing tag; handled as traceable
    Invalid,
}

impl Traceability {
    pub fn is_traceable(self) -> bool {
        !matches!(self, Traceability::NotTraceable)
    }
}

impl Origin {
    pub fn parse(tag: &str) -> Self {
        let known = [
            Origin::Derived,
            Origin::Crf,
            Origin::Predecessor,
            Origin::NotCollected,
            Origin::Assigned,
            Origin::Protocol,
            Origin::Method,
            Origin::Collection,
            Origin::DerivedNoSource,
        ];
        known
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(tag.trim()))
            .unwrap_or_else(|| Origin::Other(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Origin::Derived => "Derived",
            Origin::Crf => "CRF",
            Origin::Predecessor => "Predecessor",
            Origin::NotCollected => "None",
            Origin::Assigned => "Assigned",
            Origin::Protocol => "Protocol",
            Origin::Method => "Method",
            Origin::Collection => "Collection",
            Origin::DerivedNoSource => "Derived - no source arguments",
            Origin::Other(tag) => tag,
        }
    }

    /// Origins whose `def:Origin` must carry an explicit list of upstream
    /// `trc:TraceItem` references
    pub fn implies_source_items(&self) -> bool {
        matches!(self, Origin::Derived | Origin::Crf | Origin::Predecessor)
    }
}

/// Classify a vertex origin. Unknown and missing tags are logged and
/// treated as traceable.
pub fn classify_origin(origin: Option<&Origin>) -> Traceability {
    match origin {
        Some(Origin::Derived | Origin::Crf | Origin::Predecessor | Origin::NotCollected) => {
            Traceability::Traceable
        }
        Some(
            Origin::Assigned
            | Origin::Protocol
            | Origin::Method
            | Origin::Collection
            | Origin::DerivedNoSource,
        ) => Traceability::NotTraceable,
        Some(Origin::Other(tag)) => {
            log::warn!("Invalid origin type '{tag}', treating as traceable");
            Traceability::Invalid
        }
        None => {
            log::warn!("Missing origin type, treating as traceable");
            Traceability::Invalid
        }
    }
}

/// Classify a raw origin tag as reported by a deep trace
pub fn classify_tag(tag: &str) -> Traceability {
    if tag.is_empty() {
        classify_origin(None)
    } else {
        classify_origin(Some(&Origin::parse(tag)))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Origin::parse(&tag))
    }
}
