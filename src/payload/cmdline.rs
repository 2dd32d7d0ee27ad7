use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The payload command encrypts and decrypts payload envelopes
#[derive(Parser, Debug)]
pub struct Opt {
    #[command(subcommand)]
    pub cmd: PayloadCommand,
}

#[derive(Subcommand, Debug)]
pub enum PayloadCommand {
    /// Wraps a payload in an encryption envelope
    Encrypt {
        /// A certificate (PEM or DER) or, with a password, a keystore to encrypt for.
        /// Defaults to the configured keystore
        #[arg(long)]
        cert: Option<PathBuf>,
        /// The keystore password. Without one the file is read as a certificate
        #[arg(short, long)]
        password: Option<String>,
        /// Reads stdin if not given
        input: Option<PathBuf>,
        /// Writes to stdout if not given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Opens an encryption envelope
    Decrypt {
        /// The keystore holding the private key. Defaults to the configured keystore
        #[arg(short, long)]
        keystore: Option<PathBuf>,
        /// The keystore password. Defaults to the configured one
        #[arg(short = 'p', long)]
        store_password: Option<String>,
        /// The private key password. Defaults to the keystore password
        #[arg(long)]
        key_password: Option<String>,
        /// Reads stdin if not given
        input: Option<PathBuf>,
        /// Writes to stdout if not given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
