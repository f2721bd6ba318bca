use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trace_graph::Phase;

/// Run configuration read from a TOML file
///
/// Relative paths are resolved against the directory holding the config
/// file; output file names are resolved against `output_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceConfig {
    /// ODM-XML data collection metadata
    pub data_collection_file: Option<PathBuf>,

    /// SDTM Define-XML
    pub data_tabulation_file: Option<PathBuf>,

    /// ADaM Define-XML
    pub data_analysis_file: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_graph_file")]
    pub graph_file: PathBuf,

    /// Optional JSON copy of the graph
    #[serde(default)]
    pub graph_json_file: Option<PathBuf>,

    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,

    #[serde(default = "default_report_text_file")]
    pub report_text_file: PathBuf,

    /// Add yEd graphics to the GraphML file
    #[serde(default)]
    pub yed: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_graph_file() -> PathBuf {
    PathBuf::from("trace-graph.graphml")
}

fn default_report_file() -> PathBuf {
    PathBuf::from("unreachable.json")
}

fn default_report_text_file() -> PathBuf {
    PathBuf::from("unreachable.txt")
}

impl TraceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&raw, base)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str, base: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.resolve(base);
        if config.phase_files().is_empty() {
            bail!("No metadata files configured (data_collection_file, data_tabulation_file, data_analysis_file)");
        }
        Ok(config)
    }

    fn resolve(&mut self, base: &Path) {
        let join = |p: &mut PathBuf, base: &Path| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for file in [
            &mut self.data_collection_file,
            &mut self.data_tabulation_file,
            &mut self.data_analysis_file,
        ]
        .into_iter()
        .flatten()
        {
            join(file, base);
        }
        join(&mut self.output_dir, base);

        let out = self.output_dir.clone();
        join(&mut self.graph_file, &out);
        join(&mut self.report_file, &out);
        join(&mut self.report_text_file, &out);
        if let Some(file) = self.graph_json_file.as_mut() {
            join(file, &out);
        }
    }

    /// Configured metadata files in lifecycle order
    pub fn phase_files(&self) -> Vec<(Phase, &Path)> {
        [
            (Phase::DataCollection, &self.data_collection_file),
            (Phase::Tabulation, &self.data_tabulation_file),
            (Phase::Analysis, &self.data_analysis_file),
        ]
        .into_iter()
        .filter_map(|(phase, file)| file.as_deref().map(|f| (phase, f)))
        .collect()
    }
}
