//! Upstream response decoder
//!
//! The provider answers in XML or JSON depending on request headers, key type
//! and mood. The payload is classified once into [`Payload`] and each variant
//! is lowered into the same generic document tree, so record extraction has a
//! single code path.
//!
//! XML lowering rules:
//! - element text only, attributes ignored, text trimmed
//! - an element with children becomes an object keyed by child name
//! - repeated sibling names become an array, a single child stays an object
//! - an element without children becomes its text (empty string if none)

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::RawRecord;
use crate::error::ServiceError;

/// Result codes the provider uses for a normal response
const OK_RESULT_CODES: [&str; 2] = ["00", "000"];

/// Result codes meaning "no sales this month"; decoded as an empty list
const NO_DATA_RESULT_CODES: [&str; 1] = ["03"];

/// Classified upstream payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Xml(&'a str),
    Json(&'a str),
}

impl<'a> Payload<'a> {
    /// Classify by the first non-whitespace character: `<` means XML
    pub fn sniff(raw: &'a str) -> Self {
        let body = raw.trim_start_matches('\u{feff}').trim_start();
        if body.starts_with('<') {
            Payload::Xml(body)
        } else {
            Payload::Json(body)
        }
    }

    /// Parse into a generic document tree
    pub fn into_document(self) -> Result<Value, ServiceError> {
        match self {
            Payload::Xml(text) => xml_to_document(text),
            Payload::Json(text) => serde_json::from_str(text)
                .map_err(|e| ServiceError::format(format!("Malformed JSON payload: {}", e), text)),
        }
    }
}

/// Extract raw records from an upstream payload
///
/// A well-formed document without `response.body.items.item` decodes to an
/// empty list: that is how the provider reports a month without sales.
pub fn decode(raw: &str) -> Result<Vec<RawRecord>, ServiceError> {
    let document = Payload::sniff(raw).into_document()?;
    check_error_envelope(&document, raw)?;
    Ok(extract_items(&document))
}

fn extract_items(document: &Value) -> Vec<RawRecord> {
    match document.pointer("/response/body/items/item") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned().map(RawRecord::new))
            .collect(),
        Some(Value::Object(item)) => vec![RawRecord::new(item.clone())],
        _ => Vec::new(),
    }
}

/// Reject the provider's error envelopes
///
/// Gateway failures (bad key, quota) come back as `OpenAPI_ServiceResponse`;
/// service failures set `response.header.resultCode`.
fn check_error_envelope(document: &Value, raw: &str) -> Result<(), ServiceError> {
    if let Some(envelope) = document.get("OpenAPI_ServiceResponse") {
        let header = envelope.get("cmmMsgHeader");
        let message = ["returnAuthMsg", "errMsg"]
            .iter()
            .find_map(|k| header.and_then(|h| h.get(*k)).and_then(text_of))
            .unwrap_or_else(|| "unknown gateway error".to_string());
        return Err(ServiceError::format(
            format!("Upstream gateway error: {}", message),
            raw,
        ));
    }

    if let Some(code) = document.pointer("/response/header/resultCode").and_then(text_of) {
        let code = code.as_str();
        if !OK_RESULT_CODES.contains(&code) && !NO_DATA_RESULT_CODES.contains(&code) {
            let message = document
                .pointer("/response/header/resultMsg")
                .and_then(text_of)
                .unwrap_or_default();
            return Err(ServiceError::format(
                format!("Upstream result code {}: {}", code, message),
                raw,
            ));
        }
    }

    Ok(())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Element under construction
struct OpenElement {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn close(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::String(self.text.trim().to_string())
        } else {
            Value::Object(self.children)
        };
        (self.name, value)
    }
}

fn xml_to_document(text: &str) -> Result<Value, ServiceError> {
    let malformed = |detail: String| ServiceError::format(format!("Malformed XML payload: {}", detail), text);

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut open: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let closed = match reader.read_event() {
            Ok(Event::Start(start)) => {
                open.push(OpenElement::new(element_name(start.name().as_ref(), text)?));
                None
            }
            Ok(Event::Empty(start)) => Some((
                element_name(start.name().as_ref(), text)?,
                Value::String(String::new()),
            )),
            Ok(Event::End(_)) => {
                let element = open
                    .pop()
                    .ok_or_else(|| malformed("unexpected closing tag".to_string()))?;
                Some(element.close())
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|e| malformed(e.to_string()))?;
                match open.last_mut() {
                    Some(element) => element.text.push_str(&value),
                    None if value.trim().is_empty() => {}
                    None => return Err(malformed("text outside the root element".to_string())),
                }
                None
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                match open.last_mut() {
                    Some(element) => element.text.push_str(&value),
                    None => return Err(malformed("CDATA outside the root element".to_string())),
                }
                None
            }
            Ok(Event::Eof) => break,
            Ok(_) => None,
            Err(e) => {
                return Err(malformed(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )))
            }
        };

        if let Some((name, value)) = closed {
            match open.last_mut() {
                Some(parent) => parent.add_child(name, value),
                None if root.is_none() => root = Some((name, value)),
                None => return Err(malformed("multiple root elements".to_string())),
            }
        }
    }

    if let Some(element) = open.last() {
        return Err(malformed(format!("unclosed element <{}>", element.name)));
    }

    let (name, value) = root.ok_or_else(|| malformed("no root element".to_string()))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn element_name(raw_name: &[u8], text: &str) -> Result<String, ServiceError> {
    std::str::from_utf8(raw_name)
        .map(str::to_string)
        .map_err(|e| ServiceError::format(format!("Malformed XML payload: element name {}", e), text))
}
