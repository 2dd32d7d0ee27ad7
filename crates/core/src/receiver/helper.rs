use super::response::ResponseEnvelope;
use crate::hl7::{ack, Hl7Msg};
use crate::{Error, Result};
use log::*;
use std::str::FromStr;

/// Post-processes a received payload and fills in the reply
///
/// A helper that fails should leave a failure response in `env` before returning the
/// error.
pub trait PayloadHelper {
    /// Handles the (decrypted) payload that arrived as `name`
    fn process(&self, env: &mut ResponseEnvelope, name: &str, data: &[u8]) -> Result<()>;
}

/// The helpers a receiver can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperKind {
    /// Store the payload and reply with the default response
    None,
    /// Reply with an HL7 acknowledgment of the payload
    Hl7Ack,
}

impl Default for HelperKind {
    fn default() -> Self {
        HelperKind::None
    }
}

impl HelperKind {
    /// The configuration name of this helper
    pub fn name(&self) -> &'static str {
        match self {
            HelperKind::None => "none",
            HelperKind::Hl7Ack => "hl7ack",
        }
    }

    /// Builds the helper, if any, with the acknowledgment settings
    pub fn build(&self, ack_code: &str, ack_comment: &str) -> Option<Box<dyn PayloadHelper>> {
        match self {
            HelperKind::None => None,
            HelperKind::Hl7Ack => Some(Box::new(Hl7AckHelper::new(ack_code, ack_comment))),
        }
    }
}

impl FromStr for HelperKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(HelperKind::None),
            "hl7ack" => Ok(HelperKind::Hl7Ack),
            other => Err(Error::Helper(format!("Unknown helper {}", other))),
        }
    }
}

/// Answers an HL7 payload with its acknowledgment
///
/// The reply carries the first acknowledgment as its application data and the
/// acknowledgments for every message in the payload as `<file>.ack`.
#[derive(Debug, Clone)]
pub struct Hl7AckHelper {
    code: String,
    comment: String,
}

impl Default for Hl7AckHelper {
    fn default() -> Self {
        Self::new(ack::ACK_ACCEPT, ack::ACK_COMMENT)
    }
}

impl Hl7AckHelper {
    /// Acknowledges with `code` (`AA`, `AE` or `AR`) and `comment`
    pub fn new(code: &str, comment: &str) -> Self {
        Self {
            code: code.to_string(),
            comment: comment.to_string(),
        }
    }

    fn reject(env: &mut ResponseEnvelope) {
        env.set("application processing error", "failed", "invalid HL7 message");
    }
}

impl PayloadHelper for Hl7AckHelper {
    fn process(&self, env: &mut ResponseEnvelope, name: &str, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data);
        let msg = match Hl7Msg::parse(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("{} is not an HL7 message: {}", name, e);
                Self::reject(env);
                return Err(e.into());
            }
        };

        let reply = ack::build_ack(&msg, &self.code, &self.comment)?;
        if reply.segment_count() == 0 {
            warn!("{} has no MSH segment", name);
            Self::reject(env);
            return Err(Error::Helper(format!("{} has no MSH segment", name)));
        }
        let reply = reply.format()?;

        // One MSH and its MSA
        let first: String = reply.split_inclusive('\r').take(2).collect();
        env.response = first.replace('&', "_");
        env.set_payload(format!("{}.ack", name), reply.into_bytes());
        debug!("Acknowledged {}", name);
        Ok(())
    }
}
