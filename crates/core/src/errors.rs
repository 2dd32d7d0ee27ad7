use err_derive::Error;

/// This is the primary error type of the library
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when the multipart request is not understood
    #[error(display = "Multipart error: {}", _0)]
    Multipart(#[error(source)] super::multipart::Error),

    /// Raised when the response could not be written
    #[error(display = "Response error: {}", _0)]
    Response(#[error(source)] super::multipart::ser::Error),

    /// Raised by the payload envelope or the credential store
    #[error(display = "Crypto error: {}", _0)]
    Crypt(#[error(source)] super::crypt::Error),

    /// Raised when an HL7 message cannot be parsed or formatted
    #[error(display = "HL7 error: {}", _0)]
    Hl7(#[error(source)] super::hl7::Error),

    /// Raised by a payload helper that rejected the payload
    #[error(display = "Helper error: {}", _0)]
    Helper(String),
}
