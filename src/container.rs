//! Format-tagged intermediate containers for model decoding.
//!
//! Raw response bytes are parsed into a [`DataContainer`] for the model's
//! [`Format`], narrowed to the requested path, and then handed to the model.
//! Every format supports the same three operations: path descent, splitting
//! into children for array decoding, and an empty value for data that does
//! not exist.

use crate::path::{self, Segment};
use crate::xml::XmlElement;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Wire format a model is decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
    /// UTF-8 text; paths are ignored.
    Text,
    /// `true`/`1` (case-insensitive) are true, anything else false; paths are ignored.
    Bool,
}

/// A parsed response body, narrowed to some location.
#[derive(Debug, Clone, PartialEq)]
pub enum DataContainer {
    Json(Value),
    /// The elements selected by the path. Repeated siblings form an array.
    Xml(Vec<XmlElement>),
    Text(String),
    Bool(bool),
}

impl DataContainer {
    /// Parses `bytes` as `format` and descends to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeFailed`] when the bytes are malformed or the
    /// path doesn't exist.
    pub fn parse(format: Format, bytes: &[u8], path: Option<&str>) -> Result<Self> {
        let path = path.filter(|p| !path::parse(p).is_empty());
        let container = match format {
            Format::Json => {
                let value = serde_json::from_slice(bytes)
                    .map_err(|e| Error::decode(format!("invalid JSON: {}", e)))?;
                DataContainer::Json(value)
            }
            Format::Xml => {
                let root = XmlElement::parse(bytes)?;
                match path {
                    // paths start above the root element, so `slideshow/slide` selects slides
                    Some(_) => DataContainer::Xml(vec![XmlElement {
                        children: vec![root],
                        ..XmlElement::default()
                    }]),
                    None => DataContainer::Xml(vec![root]),
                }
            }
            Format::Text => DataContainer::Text(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::decode(format!("text is not valid UTF-8: {}", e)))?,
            ),
            Format::Bool => {
                let text = String::from_utf8_lossy(bytes).trim().to_lowercase();
                DataContainer::Bool(text == "true" || text == "1")
            }
        };

        match path {
            Some(path) => container.at_path(path).map_err(|e| e.with_path(Some(path))),
            None => Ok(container),
        }
    }

    /// The empty value for `format`, used when data legitimately doesn't exist.
    pub fn empty(format: Format) -> Self {
        match format {
            Format::Json => DataContainer::Json(Value::Null),
            Format::Xml => DataContainer::Xml(Vec::new()),
            Format::Text => DataContainer::Text(String::new()),
            Format::Bool => DataContainer::Bool(false),
        }
    }

    /// The format of the parsed body.
    pub fn format(&self) -> Format {
        match self {
            DataContainer::Json(_) => Format::Json,
            DataContainer::Xml(_) => Format::Xml,
            DataContainer::Text(_) => Format::Text,
            DataContainer::Bool(_) => Format::Bool,
        }
    }

    /// Descends to `path`. Text and bool containers have no structure and
    /// are returned unchanged.
    pub fn at_path(self, path: &str) -> Result<Self> {
        let segments = path::parse(path);
        match self {
            DataContainer::Json(value) => segments
                .iter()
                .try_fold(value, json_segment)
                .map(DataContainer::Json),
            DataContainer::Xml(selection) => segments
                .iter()
                .try_fold(selection, xml_segment)
                .map(DataContainer::Xml),
            other => Ok(other),
        }
    }

    /// Splits the container into its elements for array decoding.
    ///
    /// Returns `None` when the container isn't iterable: non-array JSON and
    /// bools. Text splits into lines; XML yields each selected element.
    pub fn multiple(self) -> Option<Vec<DataContainer>> {
        match self {
            DataContainer::Json(Value::Array(items)) => {
                Some(items.into_iter().map(DataContainer::Json).collect())
            }
            DataContainer::Json(_) => None,
            DataContainer::Xml(selection) => Some(
                selection
                    .into_iter()
                    .map(|element| DataContainer::Xml(vec![element]))
                    .collect(),
            ),
            DataContainer::Text(text) => Some(
                text.lines()
                    .map(|line| DataContainer::Text(line.to_string()))
                    .collect(),
            ),
            DataContainer::Bool(_) => None,
        }
    }

    /// The JSON value, or an error for other formats.
    pub fn into_json(self) -> Result<Value> {
        match self {
            DataContainer::Json(value) => Ok(value),
            other => Err(mismatch(Format::Json, &other)),
        }
    }

    /// The first selected XML element.
    pub fn into_xml(self) -> Result<XmlElement> {
        match self {
            DataContainer::Xml(selection) => selection
                .into_iter()
                .next()
                .ok_or_else(|| Error::decode("no XML element selected")),
            other => Err(mismatch(Format::Xml, &other)),
        }
    }

    /// The text, or an error for other formats.
    pub fn into_text(self) -> Result<String> {
        match self {
            DataContainer::Text(text) => Ok(text),
            other => Err(mismatch(Format::Text, &other)),
        }
    }

    /// The parsed flag, or an error for other formats.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            DataContainer::Bool(value) => Ok(value),
            other => Err(mismatch(Format::Bool, &other)),
        }
    }

    /// Deserializes a JSON container with serde.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet::{DataContainer, Format};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Player { first_name: String }
    ///
    /// let body = br#"{"json": {"data": {"first_name": "Vasya"}}}"#;
    /// let container = DataContainer::parse(Format::Json, body, Some("json/data")).unwrap();
    /// let player: Player = container.deserialize().unwrap();
    /// assert_eq!(player.first_name, "Vasya");
    /// ```
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.into_json()?).map_err(|e| Error::decode(e.to_string()))
    }
}

fn mismatch(expected: Format, actual: &DataContainer) -> Error {
    Error::decode(format!(
        "expected a {:?} container, found {:?}",
        expected,
        actual.format()
    ))
}

fn json_segment(value: Value, segment: &Segment) -> Result<Value> {
    let mut value = if segment.key.is_empty() {
        value
    } else {
        match value {
            Value::Object(mut map) => map
                .remove(&segment.key)
                .ok_or_else(|| Error::decode(format!("can't find key \"{}\"", segment.key)))?,
            other => {
                return Err(Error::decode(format!(
                    "can't find key \"{}\" in non-object {}",
                    segment.key,
                    kind(&other)
                )))
            }
        }
    };

    for &index in &segment.indices {
        value = match value {
            Value::Array(mut items) if index < items.len() => items.swap_remove(index),
            Value::Array(items) => {
                return Err(Error::decode(format!(
                    "index {} out of bounds for \"{}\" with {} elements",
                    index,
                    segment.key,
                    items.len()
                )))
            }
            other => {
                return Err(Error::decode(format!(
                    "\"{}\" is {}, not an array",
                    segment.key,
                    kind(&other)
                )))
            }
        };
    }

    Ok(value)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn xml_segment(selection: Vec<XmlElement>, segment: &Segment) -> Result<Vec<XmlElement>> {
    let mut selection = if segment.key.is_empty() {
        selection
    } else {
        let parent = selection
            .into_iter()
            .next()
            .ok_or_else(|| Error::decode(format!("can't find element <{}>", segment.key)))?;
        let matched: Vec<XmlElement> = parent
            .children
            .into_iter()
            .filter(|child| child.name == segment.key)
            .collect();
        if matched.is_empty() {
            return Err(Error::decode(format!(
                "can't find element <{}> in <{}>",
                segment.key, parent.name
            )));
        }
        matched
    };

    // the first selector picks among the matched siblings, later ones among children
    for (position, &index) in segment.indices.iter().enumerate() {
        let candidates = if position == 0 {
            selection
        } else {
            selection
                .into_iter()
                .next()
                .map(|element| element.children)
                .unwrap_or_default()
        };
        let count = candidates.len();
        let element = candidates.into_iter().nth(index).ok_or_else(|| {
            Error::decode(format!(
                "index {} out of bounds for <{}> with {} elements",
                index, segment.key, count
            ))
        })?;
        selection = vec![element];
    }

    Ok(selection)
}
