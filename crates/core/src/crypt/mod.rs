//! Payload and credential cryptography
//!
//! Payloads travel inside an XML Encryption envelope: the data is encrypted with a fresh
//! 3DES key and that key is wrapped with the receiver's RSA public key. The receiver
//! resolves its private key from a [`keystore::Keystore`] by the distinguished name
//! carried in the envelope.
//!
//! The keystore password itself is kept in a credential store, an XML document encrypted
//! with PBEWithMD5AndDES under a password that is derived from a numeric seed and a key.
//!

use err_derive::Error;
use std::sync::Arc;

/// The XML envelope wire format
pub mod envelope;
/// The TOML keystore holding certificates and encrypted private keys
pub mod keystore;
/// Encrypted credential store and the seed/key password derivation
pub mod passwords;
/// Hybrid RSA and 3DES payload encryption
pub mod payload;

mod pbe;

pub use envelope::is_encrypted;
pub use keystore::Keystore;
pub use passwords::{derive_password, derive_seed, CredentialStore};
pub use payload::{decrypt, encrypt};

/// The error types raised by the crypto layer
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The envelope is not well formed XML of the expected shape
    #[error(display = "Malformed envelope: {}", _0)]
    MalformedEnvelope(String),
    /// A required envelope element is absent or empty
    #[error(display = "Envelope is missing {}", field)]
    EnvelopeFieldMissing {
        /// Name of the missing element
        field: &'static str,
    },
    /// No keystore entry has a matching subject whose key opens with the password
    #[error(display = "Key not found for {}", name)]
    KeyNotFound {
        /// The distinguished name that was searched for
        name: String,
    },
    /// The wrapped symmetric key could not be recovered
    #[error(display = "Key unwrap failed: {}", _0)]
    KeyUnwrapFailed(String),
    /// The payload could not be decrypted with the unwrapped key
    #[error(display = "Payload decrypt failed: {}", _0)]
    PayloadDecryptFailed(String),
    /// The keystore could not be read or its password is wrong
    #[error(display = "Keystore error: {}", _0)]
    Keystore(String),
    /// A certificate could not be decoded
    #[error(display = "Certificate error: {}", _0)]
    Certificate(String),
    /// Raised when building an envelope fails
    #[error(display = "Encrypt failed: {}", _0)]
    Encrypt(String),
    /// The seed is not a sequence of three digit groups or the key is empty
    #[error(display = "Bad seed or key for the credential store")]
    BadSeed,
    /// The credential store cipher failed, usually a wrong password
    #[error(display = "Credential cipher failed: {}", _0)]
    Cipher(String),
    /// The decrypted credential store is not the expected XML
    #[error(display = "Malformed credential store: {}", _0)]
    MalformedStore(String),
    /// Raised when a file cannot be read or written
    #[error(display = "IO Error: {}", _0)]
    Io(#[error(source)] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(k: std::io::Error) -> Self {
        Error::Io(Arc::new(k))
    }
}
