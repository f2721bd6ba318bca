/// Attribute of a metadata element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAttribute {
    /// Resolved namespace URI (`None` for unprefixed attributes)
    pub namespace: Option<String>,

    /// Local attribute name (e.g. "OID", "NoTraceItems")
    pub name: String,

    /// Unescaped attribute value
    pub value: String,
}

/// Element of a metadata document with its resolved namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataElement {
    /// Resolved namespace URI of the element
    pub namespace: Option<String>,

    /// Local element name (e.g. "ItemGroupDef")
    pub name: String,

    /// Attributes in document order, namespace declarations excluded
    pub attributes: Vec<MetadataAttribute>,

    /// Child elements in document order
    pub children: Vec<MetadataElement>,

    /// Concatenated character data directly under this element
    pub text: String,
}

impl MetadataElement {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter, mostly useful for fixtures
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(MetadataAttribute {
            namespace: None,
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Builder-style namespaced attribute setter
    pub fn with_attr_ns(mut self, namespace: &str, name: &str, value: &str) -> Self {
        self.attributes.push(MetadataAttribute {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: MetadataElement) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style text setter
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Value of an unprefixed attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of an unprefixed attribute, `None` when absent or empty
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.is_empty())
    }

    /// Value of a namespace-qualified attribute
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// First child with the given namespace and local name
    pub fn child<'a>(&'a self, namespace: &str, name: &str) -> Option<&'a MetadataElement> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    /// All children with the given namespace and local name, in document order
    ///
    /// The yielded elements borrow only `self`; the lookup keys need to live
    /// just as long as the iterator.
    pub fn children<'a, 'k>(
        &'a self,
        namespace: &'k str,
        name: &'k str,
    ) -> impl Iterator<Item = &'a MetadataElement> + 'k
    where
        'a: 'k,
    {
        self.children
            .iter()
            .filter(move |c| c.is(namespace, name))
    }

    /// Whether this element has the given namespace and local name
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Character data with whitespace runs collapsed to single spaces
    pub fn text_normalized(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Normalized `Description/TranslatedText` content, if present
    pub fn translated_text(&self, namespace: &str) -> Option<String> {
        self.child(namespace, "Description")
            .and_then(|desc| desc.child(namespace, "TranslatedText"))
            .map(MetadataElement::text_normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    #[test]
    fn test_attribute_lookup_respects_namespace() {
        let el = MetadataElement::new(Some(NS), "Origin")
            .with_attr("Type", "Derived")
            .with_attr_ns("urn:trace", "NoTraceItems", "Yes");

        assert_eq!(el.attr("Type"), Some("Derived"));
        assert_eq!(el.attr("NoTraceItems"), None);
        assert_eq!(el.attr_ns("urn:trace", "NoTraceItems"), Some("Yes"));
    }

    #[test]
    fn test_children_filter_by_namespace_and_name() {
        let el = MetadataElement::new(Some(NS), "ItemGroupDef")
            .with_child(MetadataElement::new(Some(NS), "ItemRef").with_attr("ItemOID", "A"))
            .with_child(MetadataElement::new(Some("urn:other"), "ItemRef"))
            .with_child(MetadataElement::new(Some(NS), "ItemRef").with_attr("ItemOID", "B"));

        let oids: Vec<_> = el
            .children(NS, "ItemRef")
            .filter_map(|c| c.attr("ItemOID"))
            .collect();
        assert_eq!(oids, vec!["A", "B"]);
    }

    fn lookup_with_temporary_keys<'a>(el: &'a MetadataElement, group: &str) -> Vec<&'a MetadataElement> {
        let ns = String::from(NS);
        let name = format!("{group}Ref");
        el.children(&ns, &name).collect()
    }

    #[test]
    fn test_found_elements_outlive_lookup_keys() {
        let el = MetadataElement::new(Some(NS), "FormDef")
            .with_child(MetadataElement::new(Some(NS), "ItemGroupRef").with_attr("ItemGroupOID", "IG.DM"))
            .with_child(MetadataElement::new(Some(NS), "ItemGroupRef").with_attr("ItemGroupOID", "IG.VS"));

        let refs = lookup_with_temporary_keys(&el, "ItemGroup");
        assert_eq!(refs.len(), 2);

        let first = {
            let ns = NS.to_string();
            el.child(&ns, "ItemGroupRef")
        };
        assert_eq!(first.and_then(|r| r.attr("ItemGroupOID")), Some("IG.DM"));
    }

    #[test]
    fn test_translated_text_is_normalized() {
        let el = MetadataElement::new(Some(NS), "ItemDef").with_child(
            MetadataElement::new(Some(NS), "Description").with_child(
                MetadataElement::new(Some(NS), "TranslatedText").with_text("  Systolic \n  pressure "),
            ),
        );

        assert_eq!(el.translated_text(NS).as_deref(), Some("Systolic pressure"));
        assert_eq!(el.translated_text("urn:other"), None);
    }
}
