///
/// # PhinmsX Passwords
///
/// This module handles the passwords subcommand
///
/// Credential stores are PBE encrypted XML documents. Their password is never written
/// down, only a seed that gives the password back when combined with a key.
///
/// # Usage
///
/// ```bash
/// # Make a seed for a new password
/// phinmsx passwords seed secret mykey
/// # Edit the configured store
/// phinmsx passwords decrypt --config=config.toml -o passwords.xml
/// phinmsx passwords encrypt --config=config.toml passwords.xml
/// ```
///
use anyhow::{anyhow, Context, Result};
use log::*;

mod cmdline;

use super::config::Config;
use super::utils::{either, read_input, write_output};
use cmdline::{PasswordsCommand, Secret};
pub(crate) use cmdline::Opt;
use phinmsx_core::crypt::{derive_password, derive_seed, CredentialStore};

/// Entry point for the passwords subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, config: Config) -> Result<()> {
    match opt.cmd {
        PasswordsCommand::Seed { password, key } => {
            let seed = derive_seed(&password, &key);
            write_output(None, format!("{}\n", seed).as_bytes())?;
        }
        PasswordsCommand::Password { seed, key } => {
            let password = derive_password(&seed, &key)
                .ok_or_else(|| anyhow!("The seed must be digits in groups of three"))?;
            write_output(None, format!("{}\n", password).as_bytes())?;
        }
        PasswordsCommand::Decrypt {
            secret,
            input,
            output,
        } => {
            let password = store_password(&secret, &config)?;
            let input = either(input, &config.password_file);
            let data = read_input(input.as_deref())?;
            let store = CredentialStore::load(&data, &password)
                .context("Failed to decrypt the credential store")?;
            info!("Credential store holds {} entries", store.names().count());
            write_output(output.as_deref(), &store.to_xml()?)?;
        }
        PasswordsCommand::Encrypt {
            secret,
            input,
            output,
        } => {
            let password = store_password(&secret, &config)?;
            let xml = read_input(input.as_deref())?;
            let xml = String::from_utf8(xml).context("Credentials must be UTF-8 XML")?;
            let store =
                CredentialStore::from_xml(&xml).context("Failed to read the credentials")?;
            let data = store
                .save(&password)
                .context("Failed to encrypt the credential store")?;
            let output = either(output, &config.password_file);
            write_output(output.as_deref(), &data)?;
        }
    }
    Ok(())
}

/// The password from the command line, or derived from the seed and key
fn store_password(secret: &Secret, config: &Config) -> Result<String> {
    if let Some(password) = &secret.password {
        return Ok(password.clone());
    }
    let seed = either(secret.seed.clone(), &config.seed)
        .context("Must supply --seed or --password, or a seed in the config")?;
    let key = either(secret.key.clone(), &config.key)
        .context("Must supply --key or a key in the config")?;
    derive_password(&seed, &key).ok_or_else(|| anyhow!("The seed must be digits in groups of three"))
}
