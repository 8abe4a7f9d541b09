//! Attribute helpers shared by the XML readers.

use std::str::FromStr;

use quick_xml::events::{BytesStart, BytesText};

use super::XmlReadError;

/// Raw attribute value, `None` when absent
pub(crate) fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>, XmlReadError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlReadError::XmlError(quick_xml::Error::from(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = std::str::from_utf8(&attr.value)?.to_string();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Attribute parsed into `T`, `None` when absent
pub(crate) fn parse_attribute<T: FromStr>(
    e: &BytesStart,
    name: &'static str,
) -> Result<Option<T>, XmlReadError> {
    match get_attribute(e, name)? {
        Some(raw) => parse_value(name, &raw).map(Some),
        None => Ok(None),
    }
}

/// Attribute parsed into `T`, failing when absent
pub(crate) fn required_attribute<T: FromStr>(
    e: &BytesStart,
    element: &'static str,
    name: &'static str,
) -> Result<T, XmlReadError> {
    parse_attribute(e, name)?.ok_or(XmlReadError::MissingAttribute {
        element,
        attribute: name,
    })
}

/// Parse a trimmed text value
pub(crate) fn parse_value<T: FromStr>(field: &'static str, raw: &str) -> Result<T, XmlReadError> {
    raw.trim().parse().map_err(|_| XmlReadError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}

/// Unescaped content of a text node
pub(crate) fn text_content(t: &BytesText) -> Result<String, XmlReadError> {
    Ok(t.unescape()?.into_owned())
}

/// Strip an OpenMS style id prefix (`f_`, `e_`) and parse the numeric part
pub(crate) fn parse_prefixed_id(
    field: &'static str,
    raw: &str,
    prefix: &str,
) -> Result<u64, XmlReadError> {
    let digits = raw.strip_prefix(prefix).unwrap_or(raw);
    parse_value(field, digits)
}
