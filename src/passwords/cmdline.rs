use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The passwords command manages the credential store and its seeds
#[derive(Parser, Debug)]
pub struct Opt {
    #[command(subcommand)]
    pub cmd: PasswordsCommand,
}

/// How the credential store password is found
#[derive(Args, Debug)]
pub struct Secret {
    /// The seed the password is derived from. Defaults to the configured seed
    #[arg(short, long)]
    pub seed: Option<String>,
    /// The key the password is derived with. Defaults to the configured key
    #[arg(short, long)]
    pub key: Option<String>,
    /// Use this password directly instead of a seed and key
    #[arg(short, long, conflicts_with = "seed")]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PasswordsCommand {
    /// Prints the seed that stands for a password under a key
    Seed {
        /// The password to hide
        password: String,
        /// The key to hide it with
        key: String,
    },
    /// Prints the password a seed stands for under a key
    Password {
        /// The seed to recover the password from
        seed: String,
        /// The key it was made with
        key: String,
    },
    /// Decrypts a credential store to XML
    Decrypt {
        #[command(flatten)]
        secret: Secret,
        /// The credential store. Defaults to the configured password file
        input: Option<PathBuf>,
        /// Writes to stdout if not given
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Encrypts XML into a credential store
    Encrypt {
        #[command(flatten)]
        secret: Secret,
        /// The XML to protect. Reads stdin if not given
        input: Option<PathBuf>,
        /// Defaults to the configured password file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
