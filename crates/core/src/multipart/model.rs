use std::collections::HashMap;

/// Content types that carry the payload
pub(super) const PAYLOAD_TYPES: &[&str] = &["application/octet-stream", "text/xml"];
/// Content type of the argument part
pub(super) const TEXT_TYPE: &str = "text/plain";

/// A single part of a multipart message
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Part {
    /// Headers in the order they were received
    pub headers: Vec<(String, String)>,
    /// Everything after the blank line that ends the headers
    pub body: Vec<u8>,
}

/// How a part is treated by the receiver
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PartKind {
    /// `text/plain` arguments
    Text,
    /// The binary or XML payload
    Payload,
    /// Anything else, which is skipped
    Unknown,
}

/// The payload of a request along with the file name it was sent as
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attachment {
    /// The original file name from the `name="..."` attribute
    pub name: String,
    /// Decoded payload bytes
    pub data: Vec<u8>,
}

/// A parsed inbound request
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct MultipartRequest {
    /// The `name=value` arguments of all text parts
    pub arguments: HashMap<String, String>,
    /// The payload if one was sent
    pub attachment: Option<Attachment>,
}

impl Part {
    /// Looks up a header ignoring the case of its name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The media type of the part in lower case without its parameters
    pub fn content_type(&self) -> Option<String> {
        self.header("Content-Type").map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Classifies the part by its content type
    pub fn kind(&self) -> PartKind {
        match self.content_type() {
            Some(ct) if ct == TEXT_TYPE => PartKind::Text,
            Some(ct) if PAYLOAD_TYPES.contains(&ct.as_str()) => PartKind::Payload,
            _ => PartKind::Unknown,
        }
    }

    /// True when the body is sent with `Content-Transfer-Encoding: base64`
    pub fn is_base64(&self) -> bool {
        self.header("Content-Transfer-Encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("base64"))
            .unwrap_or(false)
    }

    /// The file name of the part
    ///
    /// This is the `name` attribute of the disposition header, falling back to `filename`
    /// and finally to a `name` attribute on any other header.
    pub fn file_name(&self) -> Option<String> {
        let disposition = self.header("Content-Disposition");
        disposition
            .and_then(|v| header_param(v, "name"))
            .or_else(|| disposition.and_then(|v| header_param(v, "filename")))
            .or_else(|| {
                self.headers
                    .iter()
                    .find_map(|(_, v)| header_param(v, "name"))
            })
    }
}

impl MultipartRequest {
    /// Gets a single argument from the text part
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(|v| v.as_str())
    }

    /// The attachment's file name if there is a payload
    pub fn file_name(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.name.as_str())
    }
}

/// Extracts a `key="value"` parameter from a header value
///
/// Parameters are separated by `;`, the key is case insensitive and surrounding quotes
/// are removed from the value. Empty values count as missing.
pub(crate) fn header_param(value: &str, key: &str) -> Option<String> {
    value
        .split(';')
        .filter_map(|param| param.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}
