#![allow(non_snake_case)]

use super::Error;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[cfg(test)]
use indoc::indoc;

/// Namespace of XML Encryption elements
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";
/// Namespace of XML Signature elements, used for `KeyInfo`
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// Payload cipher
pub const TRIPLEDES_CBC: &str = "http://www.w3.org/2001/04/xmlenc#tripledes-cbc";
/// Key transport
pub const RSA_1_5: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
const ELEMENT_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// Text that marks a payload as an envelope
const DETECTOR: &str = "<EncryptedData";

/// True if the payload looks like an encryption envelope
pub fn is_encrypted(payload: &[u8]) -> bool {
    payload
        .windows(DETECTOR.len())
        .any(|w| w == DETECTOR.as_bytes())
}

/// The root `EncryptedData` element
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename = "EncryptedData", default)]
pub struct EncryptedData {
    /// Always `ed1` in envelopes we write
    #[serde(rename = "@Id")]
    pub id: String,
    /// Type of the encrypted content
    #[serde(rename = "@Type")]
    pub type_: String,
    /// Default namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// The payload cipher
    #[serde(rename = "EncryptionMethod")]
    pub encryption_method: EncryptionMethod,
    /// Contains the wrapped key
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
    /// The encrypted payload
    #[serde(rename = "CipherData")]
    pub cipher_data: CipherData,
}

/// Names an algorithm by URI
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptionMethod {
    /// The algorithm URI
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

/// `KeyInfo` of the data element
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyInfo {
    /// Namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// The wrapped symmetric key
    #[serde(rename = "EncryptedKey")]
    pub encrypted_key: EncryptedKey,
}

/// The symmetric key encrypted with the receiver's public key
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptedKey {
    /// Namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// The key transport algorithm
    #[serde(rename = "EncryptionMethod")]
    pub encryption_method: EncryptionMethod,
    /// Names the receiver's key
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyName,
    /// The wrapped key bytes
    #[serde(rename = "CipherData")]
    pub cipher_data: CipherData,
}

/// `KeyInfo` of the key element
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyName {
    /// Namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Distinguished name of the certificate the key was wrapped for
    #[serde(rename = "KeyName")]
    pub key_name: String,
}

/// Base64 cipher text
#[derive(PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CipherData {
    /// The base64 value
    #[serde(rename = "CipherValue")]
    pub cipher_value: String,
}

impl EncryptedData {
    /// Makes an envelope with the fixed algorithms and namespaces
    pub fn new(key_name: &str, wrapped_key: String, cipher_value: String) -> Self {
        Self {
            id: "ed1".to_string(),
            type_: ELEMENT_TYPE.to_string(),
            xmlns: XMLENC_NS.to_string(),
            encryption_method: EncryptionMethod {
                algorithm: TRIPLEDES_CBC.to_string(),
            },
            key_info: KeyInfo {
                xmlns: XMLDSIG_NS.to_string(),
                encrypted_key: EncryptedKey {
                    xmlns: XMLENC_NS.to_string(),
                    encryption_method: EncryptionMethod {
                        algorithm: RSA_1_5.to_string(),
                    },
                    key_info: KeyName {
                        xmlns: XMLDSIG_NS.to_string(),
                        key_name: key_name.to_string(),
                    },
                    cipher_data: CipherData {
                        cipher_value: wrapped_key,
                    },
                },
            },
            cipher_data: CipherData { cipher_value },
        }
    }

    /// Parses an envelope
    pub fn try_parse(payload: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| Error::MalformedEnvelope(e.to_string()))?;
        quick_xml::de::from_str(text).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }

    /// Writes the envelope with an XML declaration
    pub fn serialize<W: Write>(&self, mut w: W) -> Result<W, Error> {
        let mut writer = quick_xml::writer::Writer::new(&mut w);
        writer
            .write_event(quick_xml::events::Event::Decl(
                quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None),
            ))
            .map_err(|e| Error::Encrypt(e.to_string()))?;
        writer
            .write_serializable("EncryptedData", &self)
            .map_err(|e| Error::Encrypt(e.to_string()))?;
        Ok(w)
    }

    /// The distinguished name of the receiver key
    pub fn key_name(&self) -> Result<&str, Error> {
        non_empty(
            &self.key_info.encrypted_key.key_info.key_name,
            "KeyName",
        )
    }

    /// The base64 wrapped key
    pub fn wrapped_key(&self) -> Result<&str, Error> {
        non_empty(
            &self.key_info.encrypted_key.cipher_data.cipher_value,
            "EncryptedKey CipherValue",
        )
    }

    /// The base64 payload cipher text
    pub fn cipher_value(&self) -> Result<&str, Error> {
        non_empty(&self.cipher_data.cipher_value, "EncryptedData CipherValue")
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, Error> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::EnvelopeFieldMissing { field })
    } else {
        Ok(value)
    }
}

#[test]
fn test_envelope_sample() {
    let sample = include_bytes!("samples/envelope_sample.xml");
    assert!(is_encrypted(&sample[..]));

    let envelope = EncryptedData::try_parse(&sample[..]).unwrap();
    assert_eq!(envelope.id, "ed1");
    assert_eq!(envelope.encryption_method.algorithm, TRIPLEDES_CBC);
    assert_eq!(
        envelope.key_info.encrypted_key.encryption_method.algorithm,
        RSA_1_5
    );
    assert_eq!(envelope.key_name().unwrap(), "CN=phinmsx test,O=PhinmsX,C=US");
    assert!(envelope.wrapped_key().unwrap().starts_with("PraBTm8/"));
    assert!(envelope.cipher_value().unwrap().ends_with("tvjlDJ"));
}

#[test]
fn test_envelope_round_trip() {
    let envelope = EncryptedData::new("CN=test", "a2V5".to_string(), "ZGF0YQ==".to_string());
    let written = envelope.serialize(vec![]).unwrap();
    let text = String::from_utf8(written).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><EncryptedData"));
    assert!(text.contains("Id=\"ed1\""));
    assert!(text.contains("<KeyName>CN=test</KeyName>"));

    assert_eq!(EncryptedData::try_parse(text.as_bytes()).unwrap(), envelope);
}

#[test]
fn test_missing_fields() {
    let sample = indoc! {r#"
        <EncryptedData xmlns="http://www.w3.org/2001/04/xmlenc#">
          <KeyInfo>
            <EncryptedKey>
              <KeyInfo><KeyName>CN=test</KeyName></KeyInfo>
            </EncryptedKey>
          </KeyInfo>
          <CipherData><CipherValue>ZGF0YQ==</CipherValue></CipherData>
        </EncryptedData>
    "#};
    let envelope = EncryptedData::try_parse(sample.as_bytes()).unwrap();
    assert_eq!(envelope.key_name().unwrap(), "CN=test");
    assert!(matches!(
        envelope.wrapped_key(),
        Err(Error::EnvelopeFieldMissing {
            field: "EncryptedKey CipherValue"
        })
    ));
    assert_eq!(envelope.cipher_value().unwrap(), "ZGF0YQ==");
}

#[test]
fn test_not_an_envelope() {
    assert!(!is_encrypted(b"MSH|^~\\&|A"));
    assert!(matches!(
        EncryptedData::try_parse(b"<EncryptedData><KeyInfo>"),
        Err(Error::MalformedEnvelope(_))
    ));
}
