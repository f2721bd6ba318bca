use crate::element::{MetadataAttribute, MetadataElement};
use crate::error::{MetadataError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use std::path::{Path, PathBuf};

/// ODM 1.3 namespace, used when the root element carries none
pub const ODM_NS: &str = "http://www.cdisc.org/ns/odm/v1.3";

/// Define-XML 2.0 extension namespace (`def:`)
pub const DEF_NS: &str = "http://www.cdisc.org/ns/def/v2.0";

/// Trace-XML extension namespace (`trc:`)
pub const TRACE_NS: &str = "http://www.cdisc.org/ns/trace/v1.0";

/// Namespace URIs the builders look elements up in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub odm: String,
    pub def: String,
    pub trace: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            odm: ODM_NS.to_string(),
            def: DEF_NS.to_string(),
            trace: TRACE_NS.to_string(),
        }
    }
}

/// Parsed metadata document (ODM-XML or Define-XML)
#[derive(Debug, Clone)]
pub struct MetadataDocument {
    root: MetadataElement,
    namespaces: Namespaces,
    source: Option<PathBuf>,
}

impl MetadataDocument {
    /// Wrap an already-built element tree
    pub fn new(root: MetadataElement) -> Self {
        let odm = root.namespace.clone().unwrap_or_else(|| ODM_NS.to_string());
        Self {
            root,
            namespaces: Namespaces {
                odm,
                ..Namespaces::default()
            },
            source: None,
        }
    }

    /// Read and parse a document from disk
    pub fn open(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        let mut doc = Self::parse(&xml)?;
        log::debug!(
            "Parsed {} (root <{}>, {} children)",
            path.display(),
            doc.root.name,
            doc.root.children.len()
        );
        doc.source = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Parse a document from a string
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<MetadataElement> = Vec::new();
        let mut root: Option<MetadataElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = namespace_uri(resolved);

            match event {
                Event::Start(start) => {
                    stack.push(read_element(&reader, namespace, &start)?);
                }
                Event::Empty(start) => {
                    let element = read_element(&reader, namespace, &start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(end) => {
                    let element = stack.pop().ok_or_else(|| {
                        MetadataError::Unbalanced(
                            String::from_utf8_lossy(end.local_name().as_ref()).into_owned(),
                        )
                    })?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(MetadataError::Unbalanced(open.name));
        }

        root.map(Self::new).ok_or(MetadataError::Empty)
    }

    pub fn root(&self) -> &MetadataElement {
        &self.root
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Path the document was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// `Study/MetaDataVersion`, the container of all definitions
    pub fn metadata_version(&self) -> Result<&MetadataElement> {
        let ns = &self.namespaces.odm;
        let study = self
            .root
            .child(ns, "Study")
            .ok_or_else(|| MetadataError::missing(&self.root.name, "Study"))?;
        study
            .child(ns, "MetaDataVersion")
            .ok_or_else(|| MetadataError::missing("Study", "MetaDataVersion"))
    }
}

fn namespace_uri(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn read_element<R>(
    reader: &NsReader<R>,
    namespace: Option<String>,
    start: &BytesStart,
) -> Result<MetadataElement> {
    let mut element = MetadataElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..MetadataElement::default()
    };

    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        element.attributes.push(MetadataAttribute {
            namespace: namespace_uri(resolved),
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: attr
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned(),
        });
    }

    Ok(element)
}

fn attach(
    stack: &mut [MetadataElement],
    root: &mut Option<MetadataElement>,
    element: MetadataElement,
) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                log::warn!("Ignoring extra top-level element <{}>", element.name);
            } else {
                *root = Some(element);
            }
        }
    }
}
