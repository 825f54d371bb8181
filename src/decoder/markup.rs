//! XML and HTML text.
//!
//! The document is converted to a JSON tree, then decoded like JSON with the
//! query's root selector. Conversion rules:
//!
//! - attributes become `@name` keys
//! - repeated child elements become arrays
//! - an element with only text becomes a string
//! - text next to attributes or children is kept under `#text`
//!
//! HTML is read leniently: unclosed void elements, mismatched end tags and
//! unknown entities do not fail the decode.

use super::json::frame_from_value;
use crate::error::Result;
use crate::frame::Frame;
use crate::query::{Query, QueryType};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Decode XML or HTML text into a frame named after the query.
///
/// # Examples
///
/// ```
/// use query_frames::decoder::markup;
/// use query_frames::query::{ParserMode, Query, QueryType};
///
/// let query = Query::builder(QueryType::Xml, "https://example.com/feed.xml")
///     .parser(ParserMode::Backend)
///     .root_selector("catalog.book")
///     .build()
///     .unwrap();
/// let xml = r#"<catalog><book id="1"><title>Dune</title></book><book id="2"><title>Emma</title></book></catalog>"#;
/// let frame = markup::decode(xml, &query).unwrap();
/// assert_eq!(frame.row_count(), 2);
/// ```
pub fn decode(text: &str, query: &Query) -> Result<Frame> {
    let lenient = query.kind() == QueryType::Html;
    let document = to_json(text, lenient)?;
    frame_from_value(
        query.kind().as_str(),
        &document,
        query.root_selector(),
        query.columns(),
        query.ref_id(),
    )
}

#[derive(Default)]
struct Node {
    name: String,
    attributes: Vec<(String, Value)>,
    children: Vec<(String, Value)>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>, lenient: bool) -> Result<Self> {
        let mut node = Node {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };
        let attributes = if lenient {
            start.html_attributes()
        } else {
            start.attributes()
        };
        for attr in attributes {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(e) if !lenient => return Err(e.into()),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            node.attributes.push((key, Value::String(value)));
        }
        Ok(node)
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn into_value(self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return Value::String(self.text);
        }
        let mut map = Map::new();
        for (key, value) in self.attributes {
            map.insert(key, value);
        }
        group_children(&mut map, self.children);
        if !self.text.is_empty() {
            map.insert("#text".to_string(), Value::String(self.text));
        }
        Value::Object(map)
    }
}

/// Insert children, turning repeated names into arrays.
///
/// Element values are only strings or objects, so an existing array means the
/// name has already repeated.
fn group_children(map: &mut Map<String, Value>, children: Vec<(String, Value)>) {
    for (name, value) in children {
        match map.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(name, value);
            }
        }
    }
}

/// Convert markup to a JSON tree keyed by the top-level element names.
pub fn to_json(text: &str, lenient: bool) -> Result<Value> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    reader.check_end_names(!lenient);

    // stack[0] is a nameless document node.
    let mut stack: Vec<Node> = vec![Node::default()];
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let node = Node::open(&start, lenient)?;
                let name = node.name.to_ascii_lowercase();
                if lenient && VOID_ELEMENTS.contains(&name.as_str()) {
                    attach(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Event::Empty(start) => {
                let node = Node::open(&start, lenient)?;
                attach(&mut stack, node);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                close(&mut stack, &name);
            }
            Event::Text(t) => {
                let text = match t.unescape() {
                    Ok(s) => s.into_owned(),
                    Err(e) if !lenient => return Err(e.into()),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                if let Some(top) = stack.last_mut() {
                    top.push_text(&text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.push_text(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unclosed elements are folded into their parents.
    while stack.len() > 1 {
        if let Some(node) = stack.pop() {
            attach(&mut stack, node);
        }
    }
    let document = stack.pop().unwrap_or_default();
    let mut map = Map::new();
    group_children(&mut map, document.children);
    Ok(Value::Object(map))
}

fn attach(stack: &mut [Node], node: Node) {
    if let Some(parent) = stack.last_mut() {
        let name = node.name.clone();
        parent.children.push((name, node.into_value()));
    }
}

/// Pop up to and including the innermost open element named `name`.
/// Stray end tags are ignored.
fn close(stack: &mut Vec<Node>, name: &str) {
    let Some(pos) = stack.iter().rposition(|n| n.name == name) else {
        return;
    };
    if pos == 0 {
        return;
    }
    while stack.len() > pos {
        if let Some(node) = stack.pop() {
            attach(stack, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::query::ParserMode;
    use serde_json::json;

    fn query(kind: QueryType, root: &str) -> Query {
        Query::builder(kind, "https://example.com")
            .ref_id("A")
            .parser(ParserMode::Backend)
            .root_selector(root)
            .build()
            .unwrap()
    }

    #[test]
    fn test_xml_tree_shape() {
        let tree = to_json(
            r#"<root version="2"><item>a</item><item>b</item><note lang="en">hi</note></root>"#,
            false,
        )
        .unwrap();
        assert_eq!(
            tree,
            json!({"root": {
                "@version": "2",
                "item": ["a", "b"],
                "note": {"@lang": "en", "#text": "hi"}
            }})
        );
    }

    #[test]
    fn test_three_repeats_stay_one_array() {
        let tree = to_json("<r><i>1</i><i>2</i><i>3</i></r>", false).unwrap();
        assert_eq!(tree, json!({"r": {"i": ["1", "2", "3"]}}));
    }

    #[test]
    fn test_xml_rows() {
        let xml = r#"<catalog>
            <book id="1"><title>Dune</title><price>9.5</price></book>
            <book id="2"><title>Emma</title><price>4</price></book>
        </catalog>"#;
        let frame = decode(xml, &query(QueryType::Xml, "catalog.book")).unwrap();
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.field("@id").unwrap().values, vec![json!("1"), json!("2")]);
        assert_eq!(frame.field("title").unwrap().values, vec![json!("Dune"), json!("Emma")]);
    }

    #[test]
    fn test_cdata_and_entities() {
        let tree = to_json("<a><b><![CDATA[x < y]]></b><c>&amp;</c></a>", false).unwrap();
        assert_eq!(tree, json!({"a": {"b": "x < y", "c": "&"}}));
    }

    #[test]
    fn test_malformed_xml_fails() {
        let err = to_json("<a><b></a>", false).unwrap_err();
        assert!(matches!(err, FrameError::Xml(_)));
    }

    #[test]
    fn test_html_is_lenient() {
        let html = r#"<html><body><ul><li>one<br></li><li>two&nbsp;</li></ul></body></html>"#;
        let tree = to_json(html, true).unwrap();
        let items = &tree["html"]["body"]["ul"]["li"];
        assert!(items.is_array());
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_html_unclosed_tags() {
        let tree = to_json("<div><p>a<p>b</div>", true).unwrap();
        assert!(tree["div"].is_object());
    }

    #[test]
    fn test_missing_root_names_format() {
        let err = decode("<a/>", &query(QueryType::Xml, "b")).unwrap_err();
        assert!(matches!(err, FrameError::Decode { format: "xml", .. }));
    }
}
