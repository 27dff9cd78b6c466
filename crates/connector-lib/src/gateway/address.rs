//! Decomposition of local address records into remote address fields

use crate::store::SyncEntity;

/// Structured fields derived from one address record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
}

fn street_lines(address: &SyncEntity) -> Vec<String> {
    address
        .get_string("street")
        .map(|street| {
            street
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl AddressFields {
    pub fn derive(address: &SyncEntity) -> Self {
        let mut lines = street_lines(address).into_iter();
        let line1 = lines.next();
        let rest: Vec<String> = lines.collect();

        Self {
            line1,
            line2: if rest.is_empty() {
                None
            } else {
                Some(rest.join(", "))
            },
            suburb: address
                .get_string("suburb")
                .or_else(|| address.get_string("city")),
            state: address.get_string("region"),
        }
    }
}

/// Display name from first, middle and last name, single-spaced
pub fn display_name<'a, I>(parts: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let name = parts
        .into_iter()
        .flatten()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
