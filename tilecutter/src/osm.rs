//! OpenStreetMap XML extracts.
//!
//! Reads the subset of the OSM XML format the renderer draws (nodes and ways
//! with their tags) and rewrites node coordinates for the scale pre-pass.
//! Relations are skipped.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::attributes::{AttrError, Attribute};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reading or rewriting an OSM extract.
#[derive(Debug, Error)]
pub enum OsmError {
    #[error("Failed to access OSM file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed OSM XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed OSM attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("Malformed OSM attribute value: {0}")]
    Value(String),

    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> has an invalid {attribute} '{value}'")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("Failed to write OSM file {path}: {message}")]
    Write { path: PathBuf, message: String },
}

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: i64,
    pub refs: Vec<i64>,
    pub tags: Tags,
}

impl Way {
    /// A ring: at least three distinct nodes, ending where it starts.
    pub fn is_closed(&self) -> bool {
        self.refs.len() >= 4 && self.refs.first() == self.refs.last()
    }
}

/// Nodes and ways of one extract, in document order.
#[derive(Debug, Clone, Default)]
pub struct OsmDocument {
    nodes: Vec<Node>,
    index: HashMap<i64, usize>,
    ways: Vec<Way>,
}

enum Pending {
    None,
    Node(Node),
    Way(Way),
    Other,
}

impl Pending {
    /// Attaches a `<tag>` or `<nd>` to the open element.
    fn child(&mut self, e: &BytesStart<'_>) -> Result<(), OsmError> {
        match e.name().as_ref() {
            b"tag" => {
                let (key, value) = parse_tag(e)?;
                match self {
                    Pending::Node(node) => {
                        node.tags.insert(key, value);
                    }
                    Pending::Way(way) => {
                        way.tags.insert(key, value);
                    }
                    Pending::None | Pending::Other => {}
                }
            }
            b"nd" => {
                if let Pending::Way(way) = self {
                    way.refs.push(number_attr(e, "nd", "ref")?);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl OsmDocument {
    pub fn open(path: &Path) -> Result<Self, OsmError> {
        let file = File::open(path).map_err(|source| OsmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Self::parse(BufReader::new(file))?;
        info!(
            path = %path.display(),
            nodes = doc.nodes.len(),
            ways = doc.ways.len(),
            "Loaded OSM data"
        );
        Ok(doc)
    }

    pub fn parse<R: BufRead>(input: R) -> Result<Self, OsmError> {
        let mut reader = Reader::from_reader(input);
        let mut doc = OsmDocument::default();
        let mut pending = Pending::None;
        let mut skipped = 0usize;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"node" => pending = Pending::Node(parse_node(&e)?),
                    b"way" => pending = Pending::Way(parse_way(&e)?),
                    b"relation" => {
                        skipped += 1;
                        pending = Pending::Other;
                    }
                    // `<tag ...></tag>` and `<nd ...></nd>` carry no content
                    _ => pending.child(&e)?,
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"node" => doc.push_node(parse_node(&e)?),
                    b"way" => doc.ways.push(parse_way(&e)?),
                    _ => pending.child(&e)?,
                },
                Event::End(e) => match e.name().as_ref() {
                    b"node" | b"way" | b"relation" => {
                        match std::mem::replace(&mut pending, Pending::None) {
                            Pending::Node(node) => doc.push_node(node),
                            Pending::Way(way) => doc.ways.push(way),
                            Pending::None | Pending::Other => {}
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if skipped > 0 {
            debug!(relations = skipped, "Ignoring relations");
        }
        Ok(doc)
    }

    fn push_node(&mut self, node: Node) {
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    pub fn node(&self, id: i64) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Nodes of `way` that are present in the extract, in order.
    pub fn way_nodes<'a>(&'a self, way: &'a Way) -> impl Iterator<Item = &'a Node> + 'a {
        way.refs.iter().filter_map(|id| self.node(*id))
    }
}

fn parse_node(e: &BytesStart<'_>) -> Result<Node, OsmError> {
    Ok(Node {
        id: number_attr(e, "node", "id")?,
        lat: number_attr(e, "node", "lat")?,
        lon: number_attr(e, "node", "lon")?,
        tags: Tags::new(),
    })
}

fn parse_way(e: &BytesStart<'_>) -> Result<Way, OsmError> {
    Ok(Way {
        id: number_attr(e, "way", "id")?,
        refs: Vec::new(),
        tags: Tags::new(),
    })
}

fn parse_tag(e: &BytesStart<'_>) -> Result<(String, String), OsmError> {
    let key = string_attr(e, "k")?.ok_or(OsmError::MissingAttribute {
        element: "tag",
        attribute: "k",
    })?;
    let value = string_attr(e, "v")?.unwrap_or_default();
    Ok((key, value))
}

fn attr_value(attr: &Attribute<'_>) -> Result<String, OsmError> {
    let raw = std::str::from_utf8(&attr.value).map_err(|e| OsmError::Value(e.to_string()))?;
    let value = quick_xml::escape::unescape(raw).map_err(|e| OsmError::Value(e.to_string()))?;
    Ok(value.into_owned())
}

fn string_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, OsmError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return attr_value(&attr).map(Some);
        }
    }
    Ok(None)
}

fn number_attr<T: std::str::FromStr>(
    e: &BytesStart<'_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<T, OsmError> {
    let value = string_attr(e, attribute)?.ok_or(OsmError::MissingAttribute { element, attribute })?;
    value.trim().parse().map_err(|_| OsmError::InvalidNumber {
        element,
        attribute,
        value,
    })
}

/// Copies `input` to `output`, multiplying every node's `lat` and `lon` by
/// `factor`. Coordinates are written with 18 decimals; everything else passes
/// through untouched. Returns the number of rewritten nodes.
pub fn rescale(input: &Path, output: &Path, factor: f64) -> Result<usize, OsmError> {
    let source = File::open(input).map_err(|source| OsmError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let target = File::create(output).map_err(|source| OsmError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    let mut reader = Reader::from_reader(BufReader::new(source));
    let mut writer = Writer::new(BufWriter::new(target));
    let write_error = |e: &dyn std::fmt::Display| OsmError::Write {
        path: output.to_path_buf(),
        message: e.to_string(),
    };

    let mut rewritten = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"node" => {
                let scaled = scale_node(&e, factor)?;
                writer
                    .write_event(Event::Start(scaled))
                    .map_err(|e| write_error(&e))?;
                rewritten += 1;
            }
            Event::Empty(e) if e.name().as_ref() == b"node" => {
                let scaled = scale_node(&e, factor)?;
                writer
                    .write_event(Event::Empty(scaled))
                    .map_err(|e| write_error(&e))?;
                rewritten += 1;
            }
            Event::Eof => break,
            event => writer.write_event(event).map_err(|e| write_error(&e))?,
        }
        buf.clear();
    }

    writer
        .into_inner()
        .flush()
        .map_err(|source| OsmError::Io {
            path: output.to_path_buf(),
            source,
        })?;

    info!(
        output = %output.display(),
        nodes = rewritten,
        factor,
        "Rescaled OSM coordinates"
    );
    Ok(rewritten)
}

fn scale_node(e: &BytesStart<'_>, factor: f64) -> Result<BytesStart<'static>, OsmError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut scaled = BytesStart::new(name);

    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"lat" || key == b"lon" {
            let attribute = if key == b"lat" { "lat" } else { "lon" };
            let raw = attr_value(&attr)?;
            let value: f64 = raw.trim().parse().map_err(|_| OsmError::InvalidNumber {
                element: "node",
                attribute,
                value: raw.clone(),
            })?;
            let formatted = format!("{:.18}", value * factor);
            scaled.push_attribute((key, formatted.as_bytes()));
        } else {
            scaled.push_attribute((key, attr.value.as_ref()));
        }
    }
    Ok(scaled)
}
