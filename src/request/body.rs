//! Body processing for buffered and structured requests

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Turns a fully buffered success body into a request's raw result
pub trait BodyProcessor: Send {
    type Output: Send;

    fn process(&self, body: Bytes) -> Result<Self::Output>;
}

/// Hands back the body bytes unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Buffered;

impl BodyProcessor for Buffered {
    type Output = Bytes;

    fn process(&self, body: Bytes) -> Result<Bytes> {
        Ok(body)
    }
}

/// Byte to structured-object parse step
pub trait ResponseParser: Send {
    type Output: Send;

    fn parse(&self, bytes: &[u8]) -> Result<Self::Output>;
}

/// Runs a [`ResponseParser`] over the body; parse failures are errors
#[derive(Debug, Clone, Default)]
pub struct Structured<P>(pub P);

impl<P: ResponseParser> BodyProcessor for Structured<P> {
    type Output = P::Output;

    fn process(&self, body: Bytes) -> Result<P::Output> {
        self.0.parse(&body)
    }
}

/// Generic XML element tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with this name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

/// quick-xml based parser producing the document's root [`XmlNode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl ResponseParser for XmlParser {
    type Output = XmlNode;

    fn parse(&self, bytes: &[u8]) -> Result<XmlNode> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut stack: Vec<XmlNode> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(XmlNode {
                        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    });
                }
                Event::Empty(e) => {
                    let node = XmlNode {
                        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Text(e) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::Parse("Unbalanced closing tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Eof => {
                    return Err(Error::Parse("Document has no root element".to_string()));
                }
                _ => {}
            }
        }
    }
}
