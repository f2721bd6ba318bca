use crate::origin::Origin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OID of the synthetic root vertex
pub const ROOT_OID: &str = "root";

/// Lifecycle phase of a data element, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// HL7 EHR data as eSource
    Ehr,
    /// Data collection in ODM-XML
    DataCollection,
    /// SDTM data tabulation in Define-XML
    Tabulation,
    /// ADaM data analysis in Define-XML
    Analysis,
    /// Analysis results in the Define-XML ARM extension
    AnalysisResults,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Ehr,
        Phase::DataCollection,
        Phase::Tabulation,
        Phase::Analysis,
        Phase::AnalysisResults,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Ehr => "EHR",
            Phase::DataCollection => "DATA_COLLECTION",
            Phase::Tabulation => "TABULATION",
            Phase::Analysis => "ANALYSIS",
            Phase::AnalysisResults => "ANALYSIS_RESULTS",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Phase::Ehr => "HL7 EHR data as eSource",
            Phase::DataCollection => "Data collection in ODM-XML",
            Phase::Tabulation => "SDTM data tabulation in Define-XML",
            Phase::Analysis => "ADaM data analysis in Define-XML",
            Phase::AnalysisResults => "Analysis results in the Define-XML ARM extension",
        }
    }

    /// CDISC standard carried by the phase's metadata document
    pub const fn standard(self) -> Option<&'static str> {
        match self {
            Phase::DataCollection => Some("ODM"),
            Phase::Tabulation => Some("SDTM"),
            Phase::Analysis => Some("ADaM"),
            Phase::Ehr | Phase::AnalysisResults => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown lifecycle phase: {s}"))
    }
}

/// Kind of metadata element a vertex stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    FormGroup,
    ItemGroup,
    Item,
    Method,
    Root,
}

impl ElementKind {
    /// Name of the source element, as written to exports
    pub const fn element_name(self) -> &'static str {
        match self {
            ElementKind::FormGroup => "FormDef",
            ElementKind::ItemGroup => "ItemGroupDef",
            ElementKind::Item => "ItemDef",
            ElementKind::Method => "MethodDef",
            ElementKind::Root => "Root",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// One data element in the provenance graph
///
/// Adjacency is not stored here; sources and targets are views over the
/// edge table owned by [`crate::Digraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub oid: String,

    /// Hierarchical path, e.g. `form:group:item`
    pub qualified_name: String,

    pub kind: ElementKind,

    /// Lifecycle phase (`None` only for the root)
    pub phase: Option<Phase>,

    /// Declared provenance; unset for structural nodes
    pub origin: Option<Origin>,

    pub name: String,
    pub description: String,

    /// `MethodDef/@Type` for method vertices
    pub method_type: Option<String>,
}

impl Vertex {
    pub fn new(oid: impl Into<String>, kind: ElementKind, phase: Phase) -> Self {
        let oid = oid.into();
        Self {
            qualified_name: oid.clone(),
            oid,
            kind,
            phase: Some(phase),
            origin: None,
            name: String::new(),
            description: String::new(),
            method_type: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self {
            oid: ROOT_OID.to_string(),
            qualified_name: ROOT_OID.to_string(),
            kind: ElementKind::Root,
            phase: None,
            origin: None,
            name: String::new(),
            description: String::new(),
            method_type: None,
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = qualified_name.into();
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.kind == ElementKind::Root
    }

    /// Origin tag text, empty when unset
    pub fn origin_tag(&self) -> &str {
        self.origin.as_ref().map_or("", Origin::as_str)
    }

    pub fn phase_name(&self) -> &'static str {
        self.phase.map_or("", Phase::as_str)
    }

    /// `oid (origin)` label used in reachability reports
    pub fn report_label(&self) -> String {
        format!("{} ({})", self.oid, self.origin_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_follows_lifecycle() {
        let mut phases = vec![Phase::Analysis, Phase::Ehr, Phase::Tabulation, Phase::DataCollection];
        phases.sort();
        assert_eq!(
            phases,
            vec![Phase::Ehr, Phase::DataCollection, Phase::Tabulation, Phase::Analysis]
        );
    }

    #[test]
    fn test_phase_round_trips_through_str() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert_eq!("tabulation".parse::<Phase>().unwrap(), Phase::Tabulation);
        assert!("SEND".parse::<Phase>().is_err());
    }

    #[test]
    fn test_report_label() {
        let v = Vertex::new("IT.AGE", ElementKind::Item, Phase::Tabulation).with_origin(Origin::Assigned);
        assert_eq!(v.report_label(), "IT.AGE (Assigned)");

        let group = Vertex::new("IG.DM", ElementKind::ItemGroup, Phase::DataCollection);
        assert_eq!(group.report_label(), "IG.DM ()");
    }
}
