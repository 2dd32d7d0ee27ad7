use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use log::*;
use phinmsx_core::crypt::CredentialStore;
use phinmsx_core::receiver::Settings;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};
use validator_derive::Validate;

lazy_static! {
    static ref RE_HELPER: Regex = Regex::new(r"^(none|hl7ack)$").unwrap();
    static ref RE_ACK_CODE: Regex = Regex::new(r"^(AA|AE|AR)$").unwrap();
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[validate(schema(function = "validate_config"))]
pub(crate) struct Config {
    pub(crate) keystore: Option<PathBuf>,

    pub(crate) keystore_password: Option<String>,

    pub(crate) key_password: Option<String>,

    pub(crate) password_file: Option<PathBuf>,

    pub(crate) seed: Option<String>,

    pub(crate) key: Option<String>,

    #[serde(default = "default_keystore_password_name")]
    pub(crate) keystore_password_name: String,

    #[serde(default = "default_helper")]
    #[validate(regex(path = "RE_HELPER", message = "Unknown helper", code = "helper"))]
    pub(crate) helper: String,

    #[serde(default = "default_ack_code")]
    #[validate(regex(
        path = "RE_ACK_CODE",
        message = "Acknowledgment code must be AA, AE or AR",
        code = "ack_code"
    ))]
    pub(crate) ack_code: String,

    #[serde(default = "default_ack_comment")]
    pub(crate) ack_comment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keystore: None,
            keystore_password: None,
            key_password: None,
            password_file: None,
            seed: None,
            key: None,
            keystore_password_name: default_keystore_password_name(),
            helper: default_helper(),
            ack_code: default_ack_code(),
            ack_comment: default_ack_comment(),
        }
    }
}

fn default_keystore_password_name() -> String {
    "keyStorePasswd".to_string()
}

fn default_helper() -> String {
    "none".to_string()
}

fn default_ack_code() -> String {
    "AA".to_string()
}

fn default_ack_comment() -> String {
    "MSG OK".to_string()
}

fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if let Some(seed) = &config.seed {
        if seed.is_empty() || seed.len() % 3 != 0 || !seed.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(
                "Seed must be digits in groups of three",
            ));
        }
    }
    if config.password_file.is_some() && (config.seed.is_none() || config.key.is_none()) {
        return Err(ValidationError::new(
            "A password file needs both a seed and a key",
        ));
    }
    Ok(())
}

impl Config {
    /// Reads and validates a config file
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let config = Self::from_toml(
            &fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?,
        )
        .with_context(|| format!("Failed to load the {:?} config file", path))?;
        debug!("Loaded config {:?}", path);
        Ok(config)
    }

    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Failed to parse the config")?;
        config.validate().context("Failed to validate the config")?;
        Ok(config)
    }

    /// Opens the credential store named by `password_file`, if there is one
    pub(crate) fn credentials(&self) -> Result<Option<CredentialStore>> {
        let path = match &self.password_file {
            Some(path) => path,
            None => return Ok(None),
        };
        let (seed, key) = self.seed_and_key()?;
        let store = CredentialStore::load_file(path, seed, key)
            .with_context(|| format!("Failed to open the credential store {:?}", path))?;
        Ok(Some(store))
    }

    pub(crate) fn seed_and_key(&self) -> Result<(&str, &str)> {
        match (&self.seed, &self.key) {
            (Some(seed), Some(key)) => Ok((seed.as_str(), key.as_str())),
            _ => Err(anyhow!("Both a seed and a key must be configured")),
        }
    }

    /// The keystore password, given directly or looked up in the credential store
    pub(crate) fn store_password(&self) -> Result<Option<String>> {
        if let Some(password) = &self.keystore_password {
            return Ok(Some(password.clone()));
        }
        match self.credentials()? {
            Some(store) => store
                .get(&self.keystore_password_name)
                .map(|p| Some(p.to_string()))
                .with_context(|| {
                    format!(
                        "The credential store has no {}",
                        self.keystore_password_name
                    )
                }),
            None => Ok(None),
        }
    }

    /// Receiver settings with all passwords resolved
    pub(crate) fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            keystore: self.keystore.clone(),
            store_password: self.store_password()?,
            key_password: self.key_password.clone(),
            helper: self.helper.parse()?,
            ack_code: self.ack_code.clone(),
            ack_comment: self.ack_comment.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use phinmsx_core::receiver::HelperKind;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.helper, "none");
        assert_eq!(config.ack_code, "AA");
        assert_eq!(config.ack_comment, "MSG OK");
        assert_eq!(config.keystore_password_name, "keyStorePasswd");

        let settings = config.settings().unwrap();
        assert_eq!(settings.helper, HelperKind::None);
        assert_eq!(settings.store_password, None);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(indoc! {r#"
            keystore = "keys/phinms.toml"
            keystore_password = "storepass"
            key_password = "keypass"
            helper = "hl7ack"
            ack_code = "AE"
            ack_comment = "check"
        "#})
        .unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.keystore, Some(PathBuf::from("keys/phinms.toml")));
        assert_eq!(settings.store_password.as_deref(), Some("storepass"));
        assert_eq!(settings.key_password.as_deref(), Some("keypass"));
        assert_eq!(settings.helper, HelperKind::Hl7Ack);
        assert_eq!(settings.ack_code, "AE");
        assert_eq!(settings.ack_comment, "check");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_toml(r#"helper = "fesi""#).is_err());
        assert!(Config::from_toml(r#"ack_code = "OK""#).is_err());
        assert!(Config::from_toml(r#"seed = "0101""#).is_err());
        assert!(Config::from_toml(r#"seed = "01a""#).is_err());
        assert!(Config::from_toml(indoc! {r#"
            password_file = "passwords.bin"
            seed = "010"
        "#})
        .is_err());
        assert!(Config::from_toml(r#"seed = "010""#).is_ok());
    }

    #[test]
    fn test_missing_password_file() {
        let config = Config::from_toml(indoc! {r#"
            password_file = "/nonexistent/passwords.bin"
            seed = "010"
            key = "A"
        "#})
        .unwrap();
        assert!(config.store_password().is_err());
    }
}
