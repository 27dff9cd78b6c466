//! Outgoing customer payload assembly and response interpretation

use super::address::{display_name, AddressFields};
use crate::error::{ConnectorError, ConnectorResult};
use crate::store::SyncEntity;
use serde_json::{json, Map, Value};

/// Remote operation creating or updating customers
pub const CUSTOMER_CALL: &str = "CustomerCreateUpdate";

pub const PASSWORD_FIELD: &str = "Password";
pub const REMOTE_ID_FIELD: &str = "CustomerId";

/// Attributes the backend needs on every write
pub const ALWAYS_RELEVANT: [&str; 2] = ["first_name", "last_name"];

/// Remote field -> local address attribute, billing role
const BILLING_FIELDS: [(&str, &str); 7] = [
    ("BillFirstName", "first_name"),
    ("BillLastName", "last_name"),
    ("BillCompany", "company"),
    ("BillPhone", "telephone"),
    ("BillPostCode", "postcode"),
    ("BillState", "region"),
    ("BillCountry", "country_code"),
];

/// Remote field -> local address attribute, delivery role
const SHIPPING_FIELDS: [(&str, &str); 4] = [
    ("DelCompany", "company"),
    ("DelPhone", "telephone"),
    ("DelPostCode", "postcode"),
    ("DelCountry", "country_code"),
];

fn default_fields() -> Map<String, Value> {
    let mut fields = Map::new();
    for name in ["DelAddress", "DelPostCode", "DelSuburb", "DelState"] {
        fields.insert(name.to_string(), Value::Null);
    }
    fields.insert("ReceivesNews".to_string(), json!(0));
    fields
}

fn is_set(fields: &Map<String, Value>, name: &str) -> bool {
    fields.get(name).is_some_and(|v| !v.is_null())
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// Changed attributes plus the always-relevant ones, first occurrence wins
pub fn relevant_attributes(changed: &[String]) -> Vec<String> {
    let mut attributes: Vec<String> = Vec::with_capacity(changed.len() + ALWAYS_RELEVANT.len());
    for attribute in changed
        .iter()
        .map(String::as_str)
        .chain(ALWAYS_RELEVANT.iter().copied())
    {
        if !attributes.iter().any(|a| a == attribute) {
            attributes.push(attribute.to_string());
        }
    }
    attributes
}

/// Payload fields plus the attributes no rule recognized
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadDraft {
    pub fields: Map<String, Value>,
    pub unrecognized: Vec<String>,
}

/// Assemble the customer payload, without identity fields
///
/// When only one of the two addresses is given it serves both roles.
pub fn build_customer_fields(
    customer: &SyncEntity,
    attributes: &[String],
    billing: Option<&SyncEntity>,
    shipping: Option<&SyncEntity>,
) -> PayloadDraft {
    let mut fields = default_fields();
    fields.insert("BillEmail".to_string(), json!(customer.unique_id));

    let (billing, shipping) = match (billing, shipping) {
        (None, Some(shipping)) => (Some(shipping), Some(shipping)),
        (Some(billing), None) => (Some(billing), Some(billing)),
        pair => pair,
    };

    if let Some(billing) = billing {
        let derived = AddressFields::derive(billing);
        fields.insert("BillAddress".into(), optional(derived.line1));
        fields.insert("BillAddress2".into(), optional(derived.line2));
        fields.insert("BillSuburb".into(), optional(derived.suburb));

        for (remote, local) in BILLING_FIELDS {
            if let Some(value) = billing.get_string(local) {
                fields.insert(remote.into(), Value::String(value));
            }
        }
    }

    if let Some(shipping) = shipping {
        let first = shipping.get_string("first_name");
        let middle = shipping.get_string("middle_name");
        let last = shipping.get_string("last_name");
        let name = display_name([first.as_deref(), middle.as_deref(), last.as_deref()]);
        fields.insert("DelName".into(), optional(name));

        let derived = AddressFields::derive(shipping);
        fields.insert("DelAddress".into(), optional(derived.line1));
        fields.insert("DelAddress2".into(), optional(derived.line2));
        fields.insert("DelSuburb".into(), optional(derived.suburb));
        fields.insert("DelState".into(), optional(derived.state));

        for (remote, local) in SHIPPING_FIELDS {
            if let Some(value) = shipping.get_string(local) {
                fields.insert(remote.into(), Value::String(value));
            }
        }
    }

    let mut unrecognized = Vec::new();
    let mut name_parts: [Option<String>; 3] = [None, None, None];
    let delivery_name_set = is_set(&fields, "DelName");

    for attribute in attributes {
        let value = customer.get_string(attribute);
        match attribute.as_str() {
            "enable_newsletter" => {
                let subscribed = matches!(value.as_deref(), Some("1") | Some("true"));
                fields.insert("ReceivesNews".into(), json!(if subscribed { 1 } else { 0 }));
            }
            "first_name" => {
                if !is_set(&fields, "BillFirstName") {
                    if let Some(first) = &value {
                        fields.insert("BillFirstName".into(), json!(first));
                    }
                }
                name_parts[0] = value;
            }
            "middle_name" => name_parts[1] = value,
            "last_name" => {
                if !is_set(&fields, "BillLastName") {
                    if let Some(last) = &value {
                        fields.insert("BillLastName".into(), json!(last));
                    }
                }
                name_parts[2] = value;
            }
            "date_of_birth" | "newslettersubscription" => {}
            _ => unrecognized.push(attribute.clone()),
        }
    }

    if !delivery_name_set {
        if let Some(name) = display_name(name_parts.iter().map(|part| part.as_deref())) {
            fields.insert("DelName".into(), json!(name));
        }
    }

    PayloadDraft {
        fields,
        unrecognized,
    }
}

/// Finish the payload for a create (password) or an update (remote id)
pub fn apply_identity(fields: &mut Map<String, Value>, remote_id: Option<&str>, password: String) {
    match remote_id {
        None => {
            fields.remove(REMOTE_ID_FIELD);
            fields.insert(PASSWORD_FIELD.to_string(), Value::String(password));
        }
        Some(remote_id) => {
            fields.remove(PASSWORD_FIELD);
            fields.insert(REMOTE_ID_FIELD.to_string(), json!(remote_id));
        }
    }
}

/// Protocol envelope around one customer record
pub fn customer_envelope(fields: Map<String, Value>) -> Value {
    json!({"CustomerXML": {"Customers": {"Customer": Value::Object(fields)}}})
}

/// First node called `name`, searched depth-first
pub fn find_record<'a>(value: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(name) {
                match found {
                    Value::Object(record) => return Some(record),
                    Value::Array(items) => {
                        if let Some(Value::Object(record)) = items.first() {
                            return Some(record);
                        }
                    }
                    _ => {}
                }
            }
            map.values().find_map(|child| find_record(child, name))
        }
        Value::Array(items) => items.iter().find_map(|item| find_record(item, name)),
        _ => None,
    }
}

/// Outcome reported by the backend for one customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerOutcome {
    pub success: bool,
    pub remote_id: Option<String>,
    pub status: Option<String>,
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extract the customer result from a normalized response
pub fn interpret_response(response: &Value) -> ConnectorResult<CustomerOutcome> {
    let empty = match response {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ConnectorError::Sync(format!(
            "No valid response on {}",
            CUSTOMER_CALL
        )));
    }

    let record = find_record(response, "Customer").ok_or_else(|| {
        ConnectorError::Sync(format!("{} response has no Customer record", CUSTOMER_CALL))
    })?;

    let status = scalar_text(record.get("Result"));
    let success = status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("success"));
    let remote_id = if success {
        scalar_text(record.get(REMOTE_ID_FIELD))
    } else {
        None
    };

    Ok(CustomerOutcome {
        success,
        remote_id,
        status,
    })
}
