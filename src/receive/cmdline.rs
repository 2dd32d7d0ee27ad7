use clap::Parser;
use std::path::PathBuf;

/// The receive command runs one captured request through the receiver
#[derive(Parser, Debug)]
pub struct Opt {
    /// The request body. When no content type is given it must start with the request
    /// headers. Reads stdin if not given
    pub input: Option<PathBuf>,
    /// The Content-Type header of the request, when the input is the bare body
    #[arg(long)]
    pub content_type: Option<String>,
    /// Where to write the multipart reply. Writes to stdout if not given
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Directory to store the received payload in
    #[arg(long)]
    pub payload_dir: Option<PathBuf>,
}
