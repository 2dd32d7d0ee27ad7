///
/// # PhinmsX Payload
///
/// This module handles the payload subcommand
///
/// The subcommand wraps a file in an encryption envelope for a certificate or keystore,
/// or opens an envelope with the private key from a keystore.
///
/// # Usage
///
/// ```bash
/// phinmsx payload encrypt --cert=partner.pem message.hl7 > message.xml
/// phinmsx payload decrypt --config=config.toml message.xml
/// ```
///
use anyhow::{Context, Result};
use log::*;

mod cmdline;

use super::config::Config;
use super::utils::{either, read_input, write_output};
use cmdline::PayloadCommand;
pub(crate) use cmdline::Opt;
use phinmsx_core::crypt;

/// Entry point for the payload subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, config: Config) -> Result<()> {
    match opt.cmd {
        PayloadCommand::Encrypt {
            cert,
            password,
            input,
            output,
        } => {
            let cert = either(cert, &config.keystore)
                .context("Must supply --cert or a keystore in the config")?;
            let payload = read_input(input.as_deref())?;
            let (envelope, key_name) = crypt::encrypt(&cert, password.as_deref(), &payload)
                .with_context(|| format!("Failed to encrypt for {:?}", cert))?;
            info!("Encrypted {} bytes for {}", payload.len(), key_name);
            write_output(output.as_deref(), &envelope)?;
        }
        PayloadCommand::Decrypt {
            keystore,
            store_password,
            key_password,
            input,
            output,
        } => {
            let keystore = either(keystore, &config.keystore)
                .context("Must supply --keystore or a keystore in the config")?;
            let store_password = match store_password {
                Some(password) => password,
                None => config
                    .store_password()?
                    .context("Must supply --store-password or a keystore password in the config")?,
            };
            let key_password = either(key_password, &config.key_password)
                .unwrap_or_else(|| store_password.clone());

            let envelope = read_input(input.as_deref())?;
            let payload = crypt::decrypt(&keystore, &store_password, &key_password, &envelope)
                .with_context(|| format!("Failed to decrypt with {:?}", keystore))?;
            info!("Decrypted {} bytes", payload.len());
            write_output(output.as_deref(), &payload)?;
        }
    }
    Ok(())
}
