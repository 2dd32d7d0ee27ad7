//! A minimal model of bar delimited HL7 v2 messages
//!
//! A message is a list of segments, each a nested list of fields, repetitions,
//! components and subcomponents. Values are addressed with paths such as `MSH-9-1`,
//! `OBX:2-5:3-1-2` (second OBX, field 5, third repetition, component 1, subcomponent 2).
//!
//! ```text
//! MSH|^~\&|SENDER|FACILITY|RECEIVER|FACILITY|20240101000000||ORU^R01|1|P|2.3
//! PID|1||12345
//! ```
//!
//! `MSH`, `FHS` and `BHS` segments carry the delimiters in the five characters that
//! follow their name. These apply to every following segment until the next such segment.
//!
//! This is not a general purpose HL7 parser. There is no knowledge of segment or field
//! definitions, only of the delimiter structure.
//!

use err_derive::Error;

/// Acknowledgment generation
pub mod ack;
/// Parsing wire text into a message
pub mod de;
/// Escape sequences and delimiter sets
pub mod escape;
/// The message model
pub mod model;
/// The path grammar
pub mod path;
/// Formatting a message to wire text
pub mod ser;

pub use escape::Delimiters;
pub use model::{Hl7Msg, Index};

/// The error types of the HL7 layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A line does not start with a segment name and field delimiter
    #[error(display = "Invalid segment at line {}: {}", line, text)]
    InvalidSegment {
        /// One based line number
        line: usize,
        /// The offending line
        text: String,
    },
    /// A segment name does not match `[A-Z][A-Z][A-Z0-9]`
    #[error(display = "Invalid segment name {:?}", _0)]
    InvalidSegmentName(String),
    /// Fewer than five delimiter characters were given
    #[error(display = "Invalid delimiters {:?}", _0)]
    InvalidDelimiters(String),
    /// The path does not follow the grammar or names nothing in the message
    #[error(display = "Invalid path {:?}", _0)]
    InvalidPath(String),
}
