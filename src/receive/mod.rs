///
/// # PhinmsX Receive
///
/// This module handles the receive subcommand
///
/// The subcommand runs a request saved to a file through the receiver, storing the
/// payload and writing the reply the transport would be sent.
///
/// # Usage
///
/// ```bash
/// phinmsx receive --config=config.toml --payload-dir=incoming request.txt
/// ```
///
use anyhow::{anyhow, Context, Result};
use log::*;
use std::fs;
use std::path::{Path, PathBuf};

mod cmdline;

use super::config::Config;
use super::utils::{read_input, write_output};
use phinmsx_core::receiver::{Received, Receiver};
pub(crate) use cmdline::Opt;

/// Entry point for the receive subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, config: Config) -> Result<()> {
    let receiver = Receiver::new(config.settings()?);
    let data = read_input(opt.input.as_deref())?;

    let received = match &opt.content_type {
        Some(content_type) => receiver.process(content_type, &data),
        None => receiver.process_stream(&data),
    };
    for (name, value) in received.arguments.iter() {
        debug!("Argument {}={}", name, value);
    }

    if let Some(dir) = &opt.payload_dir {
        if let Some(path) = store_payload(dir, &received)? {
            info!("Stored payload as {:?}", path);
        }
    }

    let reply = received
        .response
        .to_bytes()
        .context("Failed to build the reply")?;
    write_output(opt.output.as_deref(), &reply)?;
    Ok(())
}

/// Writes the payload under its own file name, refusing to replace an existing file
fn store_payload(dir: &Path, received: &Received) -> Result<Option<PathBuf>> {
    let (name, data) = match (&received.file_name, &received.payload) {
        (Some(name), Some(data)) => (name, data),
        _ => return Ok(None),
    };
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| anyhow!("Unusable payload file name {:?}", name))?;
    let path = dir.join(file_name);
    if path.exists() {
        return Err(anyhow!("Payload file {:?} already exists", path));
    }
    fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(Some(path))
}
