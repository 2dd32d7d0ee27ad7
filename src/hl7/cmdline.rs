use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The hl7 command inspects and acknowledges HL7 messages
#[derive(Parser, Debug)]
pub struct Opt {
    #[command(subcommand)]
    pub cmd: Hl7Command,
}

#[derive(Subcommand, Debug)]
pub enum Hl7Command {
    /// Prints the values at one or more paths, such as MSH-9-1 or OBX:2-5
    Get {
        /// The message. Use - for stdin
        input: PathBuf,
        /// Paths to look up
        #[arg(required = true)]
        paths: Vec<String>,
        /// Print how many elements are below each path instead of its value
        #[arg(long)]
        size: bool,
    },
    /// Prints the acknowledgment for every message in a file
    Ack {
        /// Reads stdin if not given
        input: Option<PathBuf>,
        /// The acknowledgment code
        #[arg(long, default_value = "AA", value_parser = ["AA", "AE", "AR"])]
        code: String,
        /// The comment sent back
        #[arg(long, default_value = "MSG OK")]
        comment: String,
        /// Writes to stdout if not given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
