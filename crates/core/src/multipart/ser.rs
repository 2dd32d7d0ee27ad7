use base64::{engine::general_purpose::STANDARD, Engine as _};
use cookie_factory::bytes::*;
use cookie_factory::sequence::tuple;
use cookie_factory::{combinator::*, gen};
use cookie_factory::{GenError, SerializeFn, WriteContext};
use err_derive::Error;
use log::*;
use std::borrow::Cow;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The error types used during serialisation
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// A Cookie Factory GenError
    #[error(display = "Cookie GenError")]
    GenError(#[error(source)] std::sync::Arc<GenError>),
}

impl From<GenError> for Error {
    fn from(k: GenError) -> Self {
        Error::GenError(std::sync::Arc::new(k))
    }
}

static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Content ID of the text part, also named by `start=` in the header
const TEXT_PART_ID: &str = "textmimepart";
const PAYLOAD_PART_ID: &str = "payloadmimepart";

/// Makes a boundary that is never repeated within this process
pub fn new_boundary() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("phinmsx_{}_{}_boundary", millis, seq)
}

/// Builds a complete response, header block included
///
/// The payload part is only written when both `payload` and `payload_name` are given.
/// `&` and `=` would break the argument line apart, so they are sent as `_`.
pub fn build_response(
    status: &str,
    error: &str,
    appdata: &str,
    payload: Option<&[u8]>,
    payload_name: Option<&str>,
) -> Result<Vec<u8>, Error> {
    let boundary = new_boundary();
    let attachment = match (payload, payload_name) {
        (Some(data), Some(name)) => Some((STANDARD.encode(data), name)),
        _ => None,
    };

    // The header needs the body length so the body goes first
    let (body_buf, _) = gen(
        tuple((
            marker(&boundary),
            text_part(status, error, appdata),
            opt_ref(&attachment, |(encoded, name)| {
                tuple((marker(&boundary), payload_part(encoded, name)))
            }),
            string(format!("--{}--", boundary)),
        )),
        vec![],
    )
    .map_err(|e| {
        error!("Response serialization error: {}", e);
        e
    })?;

    let (buf, _) = gen(
        tuple((response_header(&boundary, body_buf.len()), slice(body_buf))),
        vec![],
    )?;
    trace!("Built response of {} bytes", buf.len());
    Ok(buf)
}

fn marker<W: Write>(boundary: &str) -> impl SerializeFn<W> {
    string(format!("--{}\n", boundary))
}

fn response_header<W: Write>(boundary: &str, body_len: usize) -> impl SerializeFn<W> {
    string(format!(
        "Content-Type: multipart/related; type=\"text/xml\"; boundary=\"{}\"; start=\"{}\"\nContent-Length: {}\n\n",
        boundary, TEXT_PART_ID, body_len
    ))
}

fn text_part<W: Write>(status: &str, error: &str, appdata: &str) -> impl SerializeFn<W> {
    tuple((
        string(format!("Content-ID: <{}>\n", TEXT_PART_ID)),
        string("Content-Type: text/plain\n\n"),
        string(format!(
            "status={}&error={}&appdata={}\n",
            argument_value(status),
            argument_value(error),
            argument_value(appdata)
        )),
    ))
}

fn argument_value(value: &str) -> Cow<'_, str> {
    if value.contains(|c: char| c == '&' || c == '=') {
        debug!("Replacing argument separators in {:?}", value);
        Cow::Owned(value.replace(|c: char| c == '&' || c == '=', "_"))
    } else {
        Cow::Borrowed(value)
    }
}

fn payload_part<'a, W: Write + 'a>(encoded: &'a str, name: &'a str) -> impl SerializeFn<W> + 'a {
    tuple((
        string(format!("Content-ID: <{}>\n", PAYLOAD_PART_ID)),
        string("Content-Type: Application/Octet-Stream\n"),
        string("Content-Transfer-Encoding: base64\n"),
        string(format!("Content-Disposition: attachment; name=\"{}\"\n\n", name)),
        string(encoded),
        be_u8(b'\n'),
    ))
}

fn opt_ref<'a, W, T, F, S>(opt: &'a Option<T>, ser: S) -> impl SerializeFn<W> + 'a
where
    F: SerializeFn<W>,
    W: Write,
    S: Fn(&'a T) -> F + 'a,
{
    move |buf: WriteContext<W>| {
        if let Some(ref val) = opt {
            ser(val)(buf)
        } else {
            do_nothing()(buf)
        }
    }
}

/// A serializer combinator that does nothing with its input
fn do_nothing<W>() -> impl SerializeFn<W> {
    Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::de;
    use std::collections::HashSet;

    fn split_header(response: &[u8]) -> (String, String) {
        let text = String::from_utf8(response.to_vec()).unwrap();
        let (header, body) = text.split_once("\n\n").unwrap();
        (header.to_string(), body.to_string())
    }

    #[test]
    fn test_text_only_response() {
        let response = build_response("success", "none", "InsertSucceeded", None, None).unwrap();
        let (header, body) = split_header(&response);

        let boundary = de::boundary(&header).unwrap();
        assert!(boundary.starts_with("phinmsx_"));
        assert!(boundary.ends_with("_boundary"));
        assert!(header.contains("start=\"textmimepart\""));
        assert!(header.ends_with(&format!("Content-Length: {}", body.len())));

        assert_eq!(
            body,
            format!(
                "--{b}\nContent-ID: <textmimepart>\nContent-Type: text/plain\n\nstatus=success&error=none&appdata=InsertSucceeded\n--{b}--",
                b = boundary
            )
        );
    }

    #[test]
    fn test_payload_needs_a_name() {
        let response = build_response("success", "none", "ok", Some(b"data"), None).unwrap();
        assert!(!String::from_utf8_lossy(&response).contains("payloadmimepart"));
    }

    #[test]
    fn test_response_reads_back() {
        let response = build_response(
            "success",
            "none",
            "MSH|^~\\_|A",
            Some(b"MSH|^~\\&|A\r"),
            Some("msg.hl7.ack"),
        )
        .unwrap();
        let request = de::parse_stream(&response).unwrap();
        assert_eq!(request.argument("status"), Some("success"));
        assert_eq!(request.argument("error"), Some("none"));
        assert_eq!(request.argument("appdata"), Some("MSH|^~\\_|A"));
        let attachment = request.attachment.unwrap();
        assert_eq!(attachment.name, "msg.hl7.ack");
        assert_eq!(attachment.data, b"MSH|^~\\&|A\r");
    }

    #[test]
    fn test_arguments_read_back() {
        // (sent, read back)
        let values = [
            ("InsertSucceeded", Some("InsertSucceeded")),
            ("bad mime format", Some("bad mime format")),
            ("  padded  ", Some("padded")),
            ("Key not found for CN=a,O=b", Some("Key not found for CN_a,O_b")),
            ("this&that", Some("this_that")),
            ("a=b&c=d", Some("a_b_c_d")),
            ("MSH|^~\\&|A\rMSA|AA|1\r", Some("MSH|^~\\_|A\rMSA|AA|1")),
            ("", None),
        ];
        for (sent, expected) in &values {
            let response = build_response("abnormal", sent, sent, None, None).unwrap();
            let request = de::parse_stream(&response).unwrap();
            assert_eq!(request.argument("status"), Some("abnormal"));
            assert_eq!(request.argument("error"), *expected, "error={:?}", sent);
            assert_eq!(request.argument("appdata"), *expected, "appdata={:?}", sent);
            assert_eq!(request.arguments.len(), 1 + 2 * expected.is_some() as usize);
        }
    }

    #[test]
    fn test_boundaries_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| new_boundary()).collect::<Vec<_>>()))
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for boundary in handle.join().unwrap() {
                assert!(seen.insert(boundary));
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
