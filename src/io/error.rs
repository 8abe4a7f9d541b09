/// Errors that can occur while reading external tool results
#[derive(Debug, thiserror::Error)]
pub enum XmlReadError {
    /// Underlying XML parser failure
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// I/O error while opening or reading a result file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Attribute or text is not valid UTF-8
    #[error("UTF-8 encoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Decharge result document could not be (de)serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A required attribute is absent
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        /// Element name
        element: &'static str,
        /// Attribute name
        attribute: &'static str,
    },

    /// An attribute or text node could not be parsed
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue {
        /// Attribute or element the value came from
        field: &'static str,
        /// Raw value
        value: String,
    },

    /// Document ended inside an element
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),
}
