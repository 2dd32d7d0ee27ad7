//! Contains code that is not specific to any of the subcommands
//!
use anyhow::{Context, Result};
use log::*;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Reads the whole input file, or stdin when no file is given
pub(crate) fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read {:?}", path)),
        None => {
            let mut data = vec![];
            io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            Ok(data)
        }
    }
}

/// Writes to the output file, or stdout when no file is given
pub(crate) fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("Failed to write {:?}", path))?;
            debug!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data).context("Failed to write stdout")?;
            stdout.flush().context("Failed to write stdout")?;
        }
    }
    Ok(())
}

/// Picks the command line value over the configured one
pub(crate) fn either<T: Clone>(given: Option<T>, configured: &Option<T>) -> Option<T> {
    given.or_else(|| configured.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_either() {
        assert_eq!(either(Some(1), &Some(2)), Some(1));
        assert_eq!(either(None, &Some(2)), Some(2));
        assert_eq!(either::<u8>(None, &None), None);
    }
}
