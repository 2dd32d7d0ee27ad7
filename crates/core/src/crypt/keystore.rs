use super::Error;
use hmac::{Hmac, Mac};
use log::*;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

type HmacSha256 = Hmac<Sha256>;

/// A keystore entry pairing a certificate with its encrypted private key
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyEntry {
    /// Name of the entry
    pub alias: String,
    /// PEM encoded X.509 certificate
    pub certificate: String,
    /// PEM encoded PKCS#8 private key, encrypted with the key password
    #[serde(default)]
    pub private_key: String,
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("alias", &self.alias)
            .field("private_key", &!self.private_key.is_empty())
            .finish()
    }
}

#[derive(Deserialize, Serialize)]
struct KeystoreFile {
    mac: String,
    #[serde(default, rename = "entry")]
    entries: Vec<KeyEntry>,
}

/// A set of key entries authenticated by the store password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystore {
    entries: Vec<KeyEntry>,
}

impl Keystore {
    /// Makes a keystore from entries
    pub fn new(entries: Vec<KeyEntry>) -> Self {
        Self { entries }
    }

    /// Opens a keystore file, checking it against the store password
    pub fn load<P: AsRef<Path>>(path: P, store_password: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Keystore(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text, store_password)
    }

    /// Parses a keystore, checking it against the store password
    pub fn from_toml(text: &str, store_password: &str) -> Result<Self, Error> {
        let file: KeystoreFile =
            toml::from_str(text).map_err(|e| Error::Keystore(e.to_string()))?;
        let expected =
            hex::decode(file.mac.trim()).map_err(|e| Error::Keystore(format!("mac: {}", e)))?;
        mac(store_password, &file.entries)?
            .verify_slice(&expected)
            .map_err(|_| {
                warn!("Keystore integrity check failed");
                Error::Keystore("keystore was tampered with, or password was incorrect".to_string())
            })?;
        debug!("Opened keystore with {} entries", file.entries.len());
        Ok(Self {
            entries: file.entries,
        })
    }

    /// Writes the keystore with a MAC under the store password
    pub fn to_toml(&self, store_password: &str) -> Result<String, Error> {
        let file = KeystoreFile {
            mac: hex::encode(mac(store_password, &self.entries)?.finalize().into_bytes()),
            entries: self.entries.clone(),
        };
        toml::to_string(&file).map_err(|e| Error::Keystore(e.to_string()))
    }

    /// The entries in file order
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Certificate of the first entry
    pub fn first_certificate(&self) -> Result<Certificate, Error> {
        let entry = self
            .entries
            .first()
            .ok_or_else(|| Error::Keystore("keystore has no entries".to_string()))?;
        read_certificate(entry.certificate.as_bytes())
    }

    /// Finds the private key of the first entry whose subject is `key_name` and whose key
    /// opens with `key_password`
    ///
    /// Names are compared without the blanks around their attribute separators, so
    /// `CN=a, O=b` finds `CN=a,O=b`
    pub fn private_key(&self, key_name: &str, key_password: &str) -> Result<RsaPrivateKey, Error> {
        let wanted = normalize_name(key_name);
        for entry in &self.entries {
            let subject = match read_certificate(entry.certificate.as_bytes()) {
                Ok(cert) => subject_name(&cert),
                Err(e) => {
                    warn!("Skipping keystore entry {}: {}", entry.alias, e);
                    continue;
                }
            };
            if normalize_name(&subject) != wanted || entry.private_key.is_empty() {
                continue;
            }
            match RsaPrivateKey::from_pkcs8_encrypted_pem(&entry.private_key, key_password) {
                Ok(key) => {
                    debug!("Using key entry {}", entry.alias);
                    return Ok(key);
                }
                Err(e) => debug!("Key entry {} did not open: {}", entry.alias, e),
            }
        }
        Err(Error::KeyNotFound {
            name: key_name.to_string(),
        })
    }
}

fn mac(store_password: &str, entries: &[KeyEntry]) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(store_password.as_bytes())
        .map_err(|e| Error::Keystore(e.to_string()))?;
    for entry in entries {
        for part in &[&entry.alias, &entry.certificate, &entry.private_key] {
            mac.update(part.as_bytes());
            mac.update(b"\n");
        }
    }
    Ok(mac)
}

/// Reads a certificate in PEM or DER form
pub fn read_certificate(data: &[u8]) -> Result<Certificate, Error> {
    let pem_start = b"-----BEGIN";
    let is_pem = data
        .windows(pem_start.len())
        .any(|w| w == &pem_start[..]);
    if is_pem {
        Certificate::from_pem(data).map_err(|e| Error::Certificate(e.to_string()))
    } else {
        Certificate::from_der(data).map_err(|e| Error::Certificate(e.to_string()))
    }
}

/// The subject distinguished name in RFC 4514 form, most specific attribute first
pub fn subject_name(cert: &Certificate) -> String {
    cert.tbs_certificate.subject.to_string()
}

/// Drops blanks around the unescaped `,` and `+` separators of a distinguished name
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.trim().chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            ',' | '+' => {
                let kept = out.trim_end_matches(' ').len();
                out.truncate(kept);
                out.push(c);
                chars = chars.as_str().trim_start_matches(' ').chars();
            }
            _ => out.push(c),
        }
    }
    out
}

/// The RSA public key of a certificate
pub fn public_key(cert: &Certificate) -> Result<RsaPublicKey, Error> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| Error::Certificate(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const KEYSTORE: &str = include_str!("samples/test_keystore.toml");

    #[test]
    fn test_open_keystore() {
        let keystore = Keystore::from_toml(KEYSTORE, "storepass").unwrap();
        let aliases: Vec<_> = keystore.entries().iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(aliases, vec!["other", "phinms"]);
        assert_eq!(
            subject_name(&keystore.first_certificate().unwrap()),
            "CN=other"
        );
    }

    #[test]
    fn test_wrong_store_password() {
        assert_matches!(
            Keystore::from_toml(KEYSTORE, "nope"),
            Err(Error::Keystore(_))
        );
    }

    #[test]
    fn test_tampered_keystore() {
        let tampered = KEYSTORE.replacen("alias = \"other\"", "alias = \"evil\"", 1);
        assert_matches!(
            Keystore::from_toml(&tampered, "storepass"),
            Err(Error::Keystore(_))
        );
    }

    #[test]
    fn test_private_key_lookup() {
        let keystore = Keystore::from_toml(KEYSTORE, "storepass").unwrap();
        let name = "CN=phinmsx test,O=PhinmsX,C=US";
        assert!(keystore.private_key(name, "keypass").is_ok());
        assert_matches!(
            keystore.private_key(name, "otherpass"),
            Err(Error::KeyNotFound { .. })
        );
        assert_matches!(
            keystore.private_key("CN=nobody", "keypass"),
            Err(Error::KeyNotFound { .. })
        );

        // As written by other toolkits
        assert!(keystore
            .private_key("CN=phinmsx test, O=PhinmsX, C=US", "keypass")
            .is_ok());
        assert!(keystore
            .private_key(" CN=phinmsx test ,O=PhinmsX ,  C=US", "keypass")
            .is_ok());
        assert_matches!(
            keystore.private_key("CN=phinmsxtest,O=PhinmsX,C=US", "keypass"),
            Err(Error::KeyNotFound { .. })
        );
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("CN=a, O=b + OU=c"), "CN=a,O=b+OU=c");
        assert_eq!(normalize_name("CN=Doe\\, John, O=x"), "CN=Doe\\, John,O=x");
        assert_eq!(normalize_name("CN=two  words"), "CN=two  words");
    }

    #[test]
    fn test_certificate_forms() {
        let pem = read_certificate(include_bytes!("samples/test_cert.pem")).unwrap();
        let der = read_certificate(include_bytes!("samples/test_cert.der")).unwrap();
        assert_eq!(pem, der);
        assert_eq!(subject_name(&pem), "CN=phinmsx test,O=PhinmsX,C=US");
        assert!(public_key(&pem).is_ok());
        assert_matches!(read_certificate(b"junk"), Err(Error::Certificate(_)));
    }

    #[test]
    fn test_rewrite_keystore() {
        let keystore = Keystore::from_toml(KEYSTORE, "storepass").unwrap();
        let written = keystore.to_toml("newpass").unwrap();
        assert_eq!(Keystore::from_toml(&written, "newpass").unwrap(), keystore);
    }
}
