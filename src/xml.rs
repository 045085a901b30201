//! Owned XML element tree used by the XML container.

use crate::{Error, Result};
use std::collections::BTreeMap;

/// An XML element with its attributes, text and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    /// Concatenated direct text content, trimmed.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeFailed`] for non-UTF-8 input or malformed XML.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::decode(format!("XML is not valid UTF-8: {}", e)))?;
        let document = roxmltree::Document::parse(text)
            .map_err(|e| Error::decode(format!("invalid XML: {}", e)))?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Self::from_node(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }

        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            text: text.trim().to_string(),
            children,
        }
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All child elements named `name`, in document order.
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// The value of attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDESHOW: &str = r#"<slideshow title="Sample Slide Show" author="Yours Truly">
    <slide type="all">
        <title>Wake up to WonderWidgets!</title>
    </slide>
    <slide type="all">
        <title>Overview</title>
        <item>Why <em>WonderWidgets</em> are great</item>
    </slide>
</slideshow>"#;

    #[test]
    fn test_parse_tree() {
        let root = XmlElement::parse(SLIDESHOW.as_bytes()).unwrap();
        assert_eq!(root.name, "slideshow");
        assert_eq!(root.attribute("title"), Some("Sample Slide Show"));
        assert_eq!(root.children_named("slide").count(), 2);

        let second = root.children_named("slide").nth(1).unwrap();
        assert_eq!(second.child("title").unwrap().text, "Overview");
        assert_eq!(second.child("item").unwrap().text, "Why  are great");
        assert_eq!(second.child("item").unwrap().child("em").unwrap().text, "WonderWidgets");
    }

    #[test]
    fn test_malformed_xml() {
        let result = XmlElement::parse(b"<open><unclosed></open>");
        assert!(matches!(result, Err(Error::DecodeFailed { .. })));
    }
}
