//! The receiver handles one request handed over by the transport
//!
//! Each request runs through the same stages, any of which can end it early with a
//! failure reply
//!
//! 1. The multipart body is split into its arguments and payload
//! 2. An encrypted payload is opened with the keystore
//! 3. The configured [`PayloadHelper`] looks at the payload and fills in the reply
//! 4. The reply is written back as a multipart message
//!
//! | Stage failing | status | error | appdata |
//! |---------------|--------|-------|---------|
//! | multipart | `aborted` | `bad mime format` | `failure` |
//! | decryption | `abnormal` | `can not decrypt payload` | `warning` |
//! | helper | `aborted` | `application processing error` | the helper's message |
//!
//! A request that gets through with no helper is answered with
//! `success` / `none` / `InsertSucceeded`. The cause of a decryption failure only goes
//! to the log.

/// Contains the payload helpers and their registry
pub mod helper;
/// Contains the reply sent back for a request
pub mod response;

pub use helper::{HelperKind, Hl7AckHelper, PayloadHelper};
pub use response::ResponseEnvelope;

use crate::crypt::{self, is_encrypted};
use crate::hl7::ack;
use crate::multipart;
use log::*;
use std::collections::HashMap;
use std::path::PathBuf;

/// How a [`Receiver`] opens payloads and which helper it runs
#[derive(Clone)]
pub struct Settings {
    /// Keystore holding the private keys payloads are encrypted for
    pub keystore: Option<PathBuf>,
    /// Password of the keystore itself
    pub store_password: Option<String>,
    /// Password of the private keys, the store password when not given
    pub key_password: Option<String>,
    /// Helper run on every payload
    pub helper: HelperKind,
    /// Acknowledgment code used by the HL7 helper
    pub ack_code: String,
    /// Acknowledgment comment used by the HL7 helper
    pub ack_comment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keystore: None,
            store_password: None,
            key_password: None,
            helper: HelperKind::None,
            ack_code: ack::ACK_ACCEPT.to_string(),
            ack_comment: ack::ACK_COMMENT.to_string(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("keystore", &self.keystore)
            .field("store_password", &self.store_password.as_ref().map(|_| "***"))
            .field("key_password", &self.key_password.as_ref().map(|_| "***"))
            .field("helper", &self.helper)
            .field("ack_code", &self.ack_code)
            .field("ack_comment", &self.ack_comment)
            .finish()
    }
}

/// Everything learned from one request
///
/// Storing the payload is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct Received {
    /// Arguments of the text part, such as `service`, `action` and `from`
    pub arguments: HashMap<String, String>,
    /// The file name the payload was sent as
    pub file_name: Option<String>,
    /// Last extension of the file name, used as the process ID
    pub file_suffix: Option<String>,
    /// The payload, decrypted when it arrived encrypted
    ///
    /// This is `None` when there was no payload or it could not be decrypted
    pub payload: Option<Vec<u8>>,
    /// True if the payload arrived in an encryption envelope
    pub encrypted: bool,
    /// The reply for the transport
    pub response: ResponseEnvelope,
}

/// Runs requests through the receive pipeline
pub struct Receiver {
    settings: Settings,
    helper: Option<Box<dyn PayloadHelper>>,
}

impl Receiver {
    /// Creates a receiver, building its helper from the settings
    pub fn new(settings: Settings) -> Self {
        let helper = settings
            .helper
            .build(&settings.ack_code, &settings.ack_comment);
        Self { settings, helper }
    }

    /// Creates a receiver that runs a helper of the caller's own
    pub fn with_helper(settings: Settings, helper: Box<dyn PayloadHelper>) -> Self {
        Self {
            settings,
            helper: Some(helper),
        }
    }

    /// The settings this receiver was created with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handles a request given its `Content-Type` header and body
    ///
    /// This never fails, problems are reported through the reply in
    /// [`Received::response`].
    pub fn process(&self, content_type: &str, body: &[u8]) -> Received {
        self.process_request(multipart::de::parse(content_type, body))
    }

    /// Handles a request and returns only the reply bytes
    pub fn respond(&self, content_type: &str, body: &[u8]) -> crate::Result<Vec<u8>> {
        self.process(content_type, body).response.to_bytes()
    }

    /// Handles a request captured with its header block, as written by the transport
    pub fn process_stream(&self, data: &[u8]) -> Received {
        self.process_request(multipart::de::parse_stream(data))
    }

    fn process_request(
        &self,
        request: std::result::Result<multipart::MultipartRequest, multipart::Error>,
    ) -> Received {
        let mut received = Received::default();

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                error!("Parsing multipart request: {}", e);
                received.response.set("aborted", "bad mime format", "failure");
                return received;
            }
        };
        debug!(
            "Request service={:?} action={:?} from={:?}",
            request.argument("service"),
            request.argument("action"),
            request.argument("from")
        );
        received.arguments = request.arguments;

        let attachment = match request.attachment {
            Some(attachment) => attachment,
            None => {
                info!("Request has no payload");
                received.response.set("success", "none", "InsertSucceeded");
                return received;
            }
        };
        received.file_suffix = file_suffix(&attachment.name);
        received.file_name = Some(attachment.name.clone());

        let data = if is_encrypted(&attachment.data) {
            debug!("Payload is encrypted");
            received.encrypted = true;
            match self.decrypt(&attachment.data) {
                Ok(data) => data,
                Err(e) => {
                    error!("Unable to decrypt {}: {}", attachment.name, e);
                    received
                        .response
                        .set("abnormal", "can not decrypt payload", "warning");
                    return received;
                }
            }
        } else {
            debug!("Payload is not encrypted");
            attachment.data
        };

        received.response.set("success", "none", "InsertSucceeded");
        if let Some(helper) = &self.helper {
            debug!("Running helper {}", self.settings.helper.name());
            if let Err(e) = helper.process(&mut received.response, &attachment.name, &data) {
                error!("Helper failed on {}: {}", attachment.name, e);
                if received.response.is_success() {
                    received
                        .response
                        .set("aborted", "application processing error", e.to_string());
                }
            }
        }
        received.payload = Some(data);

        info!(
            "File: {} Response: {} Error: {}",
            attachment.name, received.response.response, received.response.error
        );
        received
    }

    fn decrypt(&self, envelope: &[u8]) -> std::result::Result<Vec<u8>, crypt::Error> {
        let keystore = self
            .settings
            .keystore
            .as_ref()
            .ok_or_else(|| crypt::Error::Keystore("no keystore configured".to_string()))?;
        let store_password = self.settings.store_password.as_deref().unwrap_or_default();
        let key_password = self
            .settings
            .key_password
            .as_deref()
            .unwrap_or(store_password);
        crypt::decrypt(keystore, store_password, key_password, envelope)
    }
}

/// The last extension of a file name, if it has a non empty one
fn file_suffix(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, suffix)| suffix)
        .filter(|suffix| !suffix.is_empty())
        .map(|suffix| suffix.to_string())
}
