#![warn(missing_docs)]
//! # PhinmsX-Core
//!
//! PhinmsX-Core is the message transport core of the PhinmsX gateway. It understands the
//! multipart messages a PHIN-MS receiver hands to its worker, the XML encryption envelope
//! used for payloads and a minimal HL7 v2 model used to acknowledge clinical messages.
//!
//! Most callers only need the [`receiver`] module
//!
//! ```no_run
//! use phinmsx_core::receiver::{Receiver, Settings};
//! # let content_type = "multipart/related; boundary=\"X\"";
//! # let body: Vec<u8> = vec![];
//! let receiver = Receiver::new(Settings::default());
//! let received = receiver.process(content_type, &body);
//! let response_bytes = received.response.to_bytes()?;
//! # Ok::<(), phinmsx_core::Error>(())
//! ```
//!
//! The lower level pieces can be used on their own
//!
//! ```no_run
//! use phinmsx_core::hl7::{ack, Hl7Msg};
//! let msg = Hl7Msg::parse("MSH|^~\\&|A|B|C|D|20240101000000||ORU|1|P|2.3\r").unwrap();
//! let reply = ack::build_ack(&msg, ack::ACK_ACCEPT, ack::ACK_COMMENT).unwrap();
//! println!("{}", reply.format().unwrap());
//! ```
//!

/// Contains the PBE credential store and the XML payload encryption envelope
pub mod crypt;
/// Contains the minimal HL7 message model and bar delimited codec
pub mod hl7;
/// Contains the multipart request parser and response builder
pub mod multipart;
/// Contains the request pipeline and its payload helpers
pub mod receiver;

mod errors;

/// This is the top level error structure of the library
///
/// Most operations will either return their `Ok(result)` or this `Err(Error)`
pub use errors::Error;

/// Result type used by the high level operations of this library
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) type NomErrorType<'a> = nom::error::VerboseError<&'a [u8]>;
