use clap::{crate_authors, crate_version, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// A PHIN-MS receiver worker and its tools
///
/// PhinmsX is free software released under the GNU GPL v3.
#[derive(Parser, Debug)]
#[command(name = "phinmsx", arg_required_else_help = true, version = crate_version!(), author = crate_authors!("\n"))]
pub struct Opt {
    #[arg(short, long, global = true, value_parser = PathBuf::from_str)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Receive(super::receive::Opt),
    Payload(super::payload::Opt),
    Passwords(super::passwords::Opt),
    Hl7(super::hl7::Opt),
}
