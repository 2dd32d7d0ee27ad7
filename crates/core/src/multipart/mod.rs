//! The receiver worker is handed a MIME multipart message by the PHIN-MS transport.
//!
//! The message is a header block naming the boundary followed by a body of parts,
//! each part starting with `--boundary` and the whole closed by `--boundary--`
//!
//! ```text
//! Content-Type: multipart/related; boundary="X"
//!
//! --X
//! Content-Type: text/plain
//!
//! service=Router&action=send&from=sender
//! --X
//! Content-Type: Application/Octet-Stream
//! Content-Transfer-Encoding: base64
//! Content-Disposition: attachment; name="msg.hl7"
//!
//! TVNIfF5+XCZ8...
//! --X--
//! ```
//!
//! ---
//!
//! # Parts
//!
//! ## Text part
//! A `text/plain` part holds a single line of `name=value` arguments joined by `&`.
//! Neither names nor values can hold `&` or `=`, and a pair with an empty value is
//! not read back
//!
//! ## Payload part
//! An `application/octet-stream` or `text/xml` part holds the payload. It is optionally
//! base64 encoded and must carry the payload's file name in a `name="..."` attribute
//!
//! All other parts are ignored
//!

/// Contains the structure of the request parts and the parsed request
pub mod model;

/// Contains code related to parsing an inbound request
pub mod de;
/// Contains code related to building a response
pub mod ser;

pub use de::Error;
pub use model::{Attachment, MultipartRequest, Part, PartKind};
