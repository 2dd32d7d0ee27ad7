#![warn(missing_docs)]
//!
//! # PhinmsX
//!
//! PhinmsX is the worker side of a PHIN-MS receiver. It takes the multipart requests the
//! transport hands over, opens encrypted payloads, acknowledges HL7 messages and writes
//! the multipart reply.
//!
//! It also carries the tools needed to run one: payload encryption, the credential
//! store and HL7 inspection.
//!
use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::*;

mod cmdline;
mod config;
mod hl7;
mod passwords;
mod payload;
mod receive;
mod utils;

use cmdline::{Command, Opt};
use config::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!(
        "PhinmsX {} {}",
        env!("PHINMSX_VERSION"),
        env!("PHINMSX_PROFILE")
    );

    let opt = Opt::parse();

    let config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match opt.cmd {
        Command::Receive(opts) => {
            receive::main(opts, config)?;
        }
        Command::Payload(opts) => {
            payload::main(opts, config)?;
        }
        Command::Passwords(opts) => {
            passwords::main(opts, config)?;
        }
        Command::Hl7(opts) => {
            hl7::main(opts)?;
        }
    }

    Ok(())
}
