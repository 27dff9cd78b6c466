//! SOAP 1.2 envelope writing and response parsing

use super::normalize::{normalize, RemoteValue};
use super::transport::Credentials;
use crate::error::Fault;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;

/// Namespace of the Retail Express web store service
pub const SERVICE_NAMESPACE: &str = "http://retailexpress.com.au/";

/// Name of the authentication header element
pub const HEADER_NAME: &str = "ClientHeader";

const SOAP12_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Class given to the synthetic root of a parsed document
pub const DOCUMENT_CLASS: &str = "#document";

/// Build the full request envelope for one call
pub fn build_envelope(
    operation: &str,
    credentials: &Credentials,
    payload: &Value,
) -> Result<String, Fault> {
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("soap12:Envelope").with_attributes([
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xmlns:soap12", SOAP12_NAMESPACE),
        ])),
    )?;

    write(&mut writer, Event::Start(BytesStart::new("soap12:Header")))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new(HEADER_NAME).with_attributes([("xmlns", SERVICE_NAMESPACE)])),
    )?;
    write_text_element(&mut writer, "clientId", &credentials.client_id)?;
    write_text_element(&mut writer, "username", &credentials.username)?;
    write_text_element(&mut writer, "password", &credentials.password)?;
    write(&mut writer, Event::End(BytesEnd::new(HEADER_NAME)))?;
    write(&mut writer, Event::End(BytesEnd::new("soap12:Header")))?;

    write(&mut writer, Event::Start(BytesStart::new("soap12:Body")))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new(operation).with_attributes([("xmlns", SERVICE_NAMESPACE)])),
    )?;
    match payload {
        Value::Object(map) => {
            for (name, value) in map {
                write_value(&mut writer, name, value)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                write_value(&mut writer, "item", item)?;
            }
        }
        scalar => write_value(&mut writer, "item", scalar)?,
    }
    write(&mut writer, Event::End(BytesEnd::new(operation)))?;
    write(&mut writer, Event::End(BytesEnd::new("soap12:Body")))?;
    write(&mut writer, Event::End(BytesEnd::new("soap12:Envelope")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| Fault::new("Client", format!("request is not valid UTF-8: {}", e)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), Fault> {
    writer
        .write_event(event)
        .map_err(|e| Fault::new("Client", format!("failed to write request: {}", e)))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), Fault> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write_value(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), Fault> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                write_value(writer, name, item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            for (child, value) in map {
                write_value(writer, child, value)?;
            }
            write(writer, Event::End(BytesEnd::new(name)))
        }
        Value::Bool(b) => write_text_element(writer, name, if *b { "true" } else { "false" }),
        Value::Number(n) => write_text_element(writer, name, &n.to_string()),
        Value::String(s) => write_text_element(writer, name, s),
    }
}

struct Frame {
    name: String,
    fields: Vec<(String, RemoteValue)>,
    text: String,
    nil: bool,
}

impl Frame {
    fn new(name: String, nil: bool) -> Self {
        Self {
            name,
            fields: Vec::new(),
            text: String::new(),
            nil,
        }
    }

    fn into_value(self) -> (String, RemoteValue) {
        let value = if self.nil {
            RemoteValue::Null
        } else if self.fields.is_empty() {
            RemoteValue::String(self.text)
        } else {
            RemoteValue::Object {
                class: self.name.clone(),
                fields: self.fields,
            }
        };
        (self.name, value)
    }
}

fn element_frame(start: &BytesStart<'_>) -> Result<Frame, String> {
    let name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();
    let nil = start.attributes().flatten().any(|attr| {
        attr.key.local_name().as_ref() == b"nil" && attr.value.as_ref() == b"true"
    });
    Ok(Frame::new(name, nil))
}

/// Parse an XML document into a raw value tree
///
/// Elements with children become `Object`s (namespace prefixes dropped),
/// leaf elements become strings, `xsi:nil` elements become null. The result
/// is an `Object` of class [`DOCUMENT_CLASS`] holding the root element.
pub fn parse_document(xml: &str) -> Result<RemoteValue, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack = vec![Frame::new(DOCUMENT_CLASS.to_string(), false)];

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => stack.push(element_frame(&start)?),
            Event::Empty(start) => {
                let (name, value) = element_frame(&start)?.into_value();
                if let Some(parent) = stack.last_mut() {
                    parent.fields.push((name, value));
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err("unbalanced closing tag".to_string());
                }
                let frame = stack.pop().ok_or("unbalanced closing tag")?;
                let (name, value) = frame.into_value();
                if let Some(parent) = stack.last_mut() {
                    parent.fields.push((name, value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("unexpected end of document".to_string());
    }
    let document = stack.pop().ok_or("empty document")?;
    if document.fields.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(RemoteValue::Object {
        class: DOCUMENT_CLASS.to_string(),
        fields: document.fields,
    })
}

fn field<'a>(value: &'a RemoteValue, name: &str) -> Option<&'a RemoteValue> {
    match value {
        RemoteValue::Object { fields, .. } => fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, v)| v),
        _ => None,
    }
}

fn text_of(value: Option<&RemoteValue>) -> Option<String> {
    match value? {
        RemoteValue::String(s) => Some(s.clone()),
        RemoteValue::Null => None,
        // SOAP 1.2 nests the text: Code/Value, Reason/Text
        nested @ RemoteValue::Object { fields, .. } => match fields.first() {
            Some((_, RemoteValue::String(s))) if fields.len() == 1 => Some(s.clone()),
            _ => Some(normalize(nested.clone()).to_string()),
        },
        other => Some(normalize(other.clone()).to_string()),
    }
}

fn parse_fault(fault: &RemoteValue) -> Fault {
    let code = text_of(field(fault, "Code").or_else(|| field(fault, "faultcode")))
        .unwrap_or_else(|| "Server".to_string());
    let message = text_of(field(fault, "Reason").or_else(|| field(fault, "faultstring")))
        .unwrap_or_else(|| "unknown fault".to_string());
    let detail = text_of(field(fault, "Detail").or_else(|| field(fault, "detail")));

    Fault {
        code,
        message,
        detail,
    }
}

/// Interpret a SOAP response for the given operation
///
/// Returns the raw result tree, or the fault carried in the body.
pub fn parse_response(xml: &str, operation: &str) -> Result<RemoteValue, Fault> {
    let document = parse_document(xml)
        .map_err(|e| Fault::new("Client", format!("invalid XML response: {}", e)))?;

    let body = field(&document, "Envelope")
        .and_then(|envelope| field(envelope, "Body"))
        .ok_or_else(|| Fault::new("Client", "response has no SOAP body"))?;

    if let Some(fault) = field(body, "Fault") {
        return Err(parse_fault(fault));
    }

    let response_name = format!("{}Response", operation);
    let result_name = format!("{}Result", operation);

    let response = match field(body, &response_name) {
        Some(response) => response.clone(),
        None => match body {
            RemoteValue::Object { fields, .. } => fields
                .first()
                .map(|(_, v)| v.clone())
                .unwrap_or(RemoteValue::Null),
            _ => RemoteValue::Null,
        },
    };

    let result = match &response {
        RemoteValue::Object { fields, .. }
            if fields.len() == 1 && fields[0].0.eq_ignore_ascii_case(&result_name) =>
        {
            fields[0].1.clone()
        }
        _ => response,
    };

    Ok(expand_embedded_document(result))
}

/// Results are frequently XML documents returned as escaped strings
fn expand_embedded_document(value: RemoteValue) -> RemoteValue {
    match value {
        RemoteValue::String(text) if text.trim_start().starts_with('<') => {
            parse_document(&text).unwrap_or(RemoteValue::String(text))
        }
        other => other,
    }
}
