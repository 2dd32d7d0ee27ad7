///
/// # PhinmsX HL7
///
/// This module handles the hl7 subcommand
///
/// # Usage
///
/// ```bash
/// phinmsx hl7 get message.hl7 MSH-9-1 PID-3
/// phinmsx hl7 ack --code=AE --comment="bad PID" message.hl7
/// ```
///
use anyhow::{Context, Result};
use log::*;
use std::path::Path;

mod cmdline;

use super::utils::{read_input, write_output};
use cmdline::Hl7Command;
pub(crate) use cmdline::Opt;
use phinmsx_core::hl7::{ack, Hl7Msg};

/// Entry point for the hl7 subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt) -> Result<()> {
    match opt.cmd {
        Hl7Command::Get { input, paths, size } => {
            let input = Some(input.as_path()).filter(|p| *p != Path::new("-"));
            let msg = read_message(input)?;
            write_output(None, lookup(&msg, &paths, size).as_bytes())?;
        }
        Hl7Command::Ack {
            input,
            code,
            comment,
            output,
        } => {
            let msg = read_message(input.as_deref())?;
            let reply = ack::build_ack(&msg, &code, &comment)?;
            if reply.segment_count() == 0 {
                warn!("No MSH segment to acknowledge");
            }
            write_output(output.as_deref(), reply.format()?.as_bytes())?;
        }
    }
    Ok(())
}

fn read_message(input: Option<&Path>) -> Result<Hl7Msg> {
    let data = read_input(input)?;
    Hl7Msg::parse(&String::from_utf8_lossy(&data)).context("Failed to parse the message")
}

/// One `path=value` line per path, paths that resolve to nothing are left empty
fn lookup(msg: &Hl7Msg, paths: &[String], size: bool) -> String {
    paths
        .iter()
        .map(|path| {
            let value = if size {
                msg.size(path).to_string()
            } else {
                msg.get(path).unwrap_or_default().to_string()
            };
            format!("{}={}\n", path, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let msg = Hl7Msg::parse("MSH|^~\\&|A|B|C|D|t||ORU^R01|1|P|2.3\rOBX|1\rOBX|2|ST\r").unwrap();
        let paths = vec!["MSH-9-2".to_string(), "OBX:2-2".to_string(), "PID-3".to_string()];
        assert_eq!(lookup(&msg, &paths, false), "MSH-9-2=R01\nOBX:2-2=ST\nPID-3=\n");
        let paths = vec!["MSH-9:1".to_string(), "PID".to_string()];
        assert_eq!(lookup(&msg, &paths, true), "MSH-9:1=2\nPID=0\n");
    }
}
