use super::model::*;
use crate::NomErrorType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use err_derive::Error;
use log::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until},
    character::complete::char,
    combinator::opt,
    error::context as error_context,
    sequence::delimited,
};
use std::collections::HashMap;

type IResult<I, O, E = nom::error::VerboseError<I>> = Result<(I, O), nom::Err<E>>;

/// The error types used while parsing a request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The content type has no quoted `boundary="..."` attribute
    #[error(display = "Request multipart boundary not specified or not quoted")]
    BoundaryMissing,
    /// The closing `--boundary--` was never found
    #[error(display = "Request multipart missing closing boundary")]
    UnterminatedMultipart,
    /// A part has no blank line between its headers and its body
    #[error(display = "Malformed multipart part: {}", _0)]
    MalformedPart(String),
    /// The payload part has no `name="..."` attribute
    #[error(display = "Request multipart payload missing name")]
    AttachmentNameMissing,
    /// The payload part claims base64 but does not decode
    #[error(display = "Payload is not valid base64: {}", _0)]
    InvalidBase64(String),
}

/// Parses a request given the value of its `Content-Type` header and the body
pub fn parse(content_type: &str, body: &[u8]) -> Result<MultipartRequest, Error> {
    let boundary = boundary(content_type)?;
    parse_with_boundary(&boundary, body)
}

/// Parses a request captured together with its header block
///
/// The boundary is taken from the first `boundary="..."` found in the data
pub fn parse_stream(data: &[u8]) -> Result<MultipartRequest, Error> {
    let text = String::from_utf8_lossy(data);
    let boundary = boundary(&text)?;
    parse_with_boundary(&boundary, data)
}

/// Extracts the boundary token from a `Content-Type` header
pub fn boundary(content_type: &str) -> Result<String, Error> {
    match boundary_param(content_type) {
        Ok((_, b)) if !b.is_empty() => Ok(b.to_string()),
        _ => {
            error!("Request multipart boundary not specified");
            Err(Error::BoundaryMissing)
        }
    }
}

fn boundary_param(buf: &str) -> IResult<&str, &str> {
    let (buf, _) = take_until("boundary=")(buf)?;
    let (buf, _) = tag("boundary=")(buf)?;
    error_context(
        "Boundary not quoted",
        delimited(char('"'), take_until("\""), char('"')),
    )(buf)
}

/// Parses the body of a request using a known boundary
///
/// Lines may end in LF or CRLF. Part bodies are kept byte for byte apart from the line
/// break in front of the next boundary.
pub fn parse_with_boundary(boundary: &str, body: &[u8]) -> Result<MultipartRequest, Error> {
    let marker = format!("--{}", boundary).into_bytes();

    let mut request = MultipartRequest::default();
    for part in split_parts(&marker, body)? {
        match part.kind() {
            PartKind::Text => {
                let args = parse_arguments(&String::from_utf8_lossy(&part.body));
                trace!("Arguments: {:?}", args);
                request.arguments.extend(args);
            }
            PartKind::Payload => {
                let name = part.file_name().ok_or_else(|| {
                    error!("Request multipart payload missing name");
                    Error::AttachmentNameMissing
                })?;
                let data = payload_data(&part)?;
                debug!("Payload {} of {} bytes", name, data.len());
                request.attachment = Some(Attachment { name, data });
            }
            PartKind::Unknown => {
                debug!("Ignoring part of type {:?}", part.content_type());
            }
        }
    }
    Ok(request)
}

/// Splits a body into its parts
pub fn split_parts(marker: &[u8], body: &[u8]) -> Result<Vec<Part>, Error> {
    let (mut buf, _) = next_marker(marker, body).map_err(|_| {
        error!("Request multipart has no boundary in its body");
        Error::UnterminatedMultipart
    })?;

    let mut parts = vec![];
    loop {
        // `--boundary--` ends the message
        if buf.starts_with(b"--") {
            break;
        }
        let (rest, raw) = multipart_part(marker, buf).map_err(|_| {
            error!("Request multipart missing closing boundary");
            Error::UnterminatedMultipart
        })?;
        parts.push(part(raw)?);
        buf = rest;
    }
    Ok(parts)
}

fn next_marker<'a>(marker: &[u8], buf: &'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
    let (buf, preamble) = take_until(marker)(buf)?;
    let (buf, _) = tag(marker)(buf)?;
    Ok((buf, preamble))
}

fn multipart_part<'a>(marker: &[u8], buf: &'a [u8]) -> IResult<&'a [u8], &'a [u8]> {
    // Rest of the boundary line
    let (buf, _) = take_till(|c| c == b'\n')(buf)?;
    let (buf, _) = opt(char('\n'))(buf)?;
    let (buf, raw) = next_marker(marker, buf)?;
    Ok((buf, strip_line_break(raw)))
}

fn strip_line_break(raw: &[u8]) -> &[u8] {
    match raw.strip_suffix(b"\n") {
        Some(raw) => raw.strip_suffix(b"\r").unwrap_or(raw),
        None => raw,
    }
}

fn blank_line(buf: &[u8]) -> IResult<&[u8], &[u8], NomErrorType<'_>> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..])))(buf)
}

/// Splits a part at the first empty line into its header block and body
fn part_sections(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    buf.iter()
        .enumerate()
        .filter(|(_, c)| **c == b'\n')
        .find_map(|(i, _)| {
            blank_line(&buf[i + 1..])
                .ok()
                .map(|(body, _)| (&buf[..i], body))
        })
}

fn part(raw: &[u8]) -> Result<Part, Error> {
    // A part with no headers at all starts straight with its blank line
    let (header_block, body) = match blank_line(raw) {
        Ok((body, _)) => (&b""[..], body),
        Err(_) => part_sections(raw)
            .ok_or_else(|| Error::MalformedPart("no blank line after the headers".to_string()))?,
    };

    let headers = String::from_utf8_lossy(header_block)
        .lines()
        .filter_map(|line| {
            let header = line.split_once(':');
            if header.is_none() {
                debug!("Skipping header line without a colon: {:?}", line);
            }
            header
        })
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Ok(Part {
        headers,
        body: body.to_vec(),
    })
}

/// Parses a `name=value&name=value` argument line
///
/// Names and values are trimmed. Empty fields at the end of a pair are dropped before
/// counting, and a pair is kept only when exactly a name and a value remain, so `name=`
/// and `name` are both skipped while `a=b=` reads as `a` = `b`.
pub fn parse_arguments(line: &str) -> HashMap<String, String> {
    line.trim()
        .split('&')
        .filter_map(|arg| {
            let mut fields: Vec<&str> = arg.split('=').collect();
            while fields.len() > 1 && fields.last().map_or(false, |f| f.is_empty()) {
                fields.pop();
            }
            match fields.as_slice() {
                [k, v] => Some((k.trim().to_string(), v.trim().to_string())),
                _ => None,
            }
        })
        .collect()
}

fn payload_data(part: &Part) -> Result<Vec<u8>, Error> {
    let body = part.body.trim_ascii();
    if part.is_base64() {
        let encoded: Vec<u8> = body
            .iter()
            .copied()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidBase64(e.to_string()))
    } else {
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use indoc::indoc;

    const HL7: &str = "MSH|^~\\&|A|B|C|D|20240101000000||ACK|1|P|2.3\rMSA|AA|1\r";

    #[test]
    fn test_boundary() {
        assert_eq!(
            boundary("multipart/related; type=\"text/xml\"; boundary=\"abc_123\"; start=\"x\""),
            Ok("abc_123".to_string())
        );
        assert_matches!(boundary("multipart/related"), Err(Error::BoundaryMissing));
        assert_matches!(
            boundary("multipart/related; boundary=abc"),
            Err(Error::BoundaryMissing)
        );
        assert_matches!(
            boundary("multipart/related; boundary="),
            Err(Error::BoundaryMissing)
        );
        assert_matches!(
            boundary("multipart/related; boundary=\"\""),
            Err(Error::BoundaryMissing)
        );
    }

    #[test]
    fn test_parse_text_and_octet_stream() {
        let body = format!(
            "--X\nContent-Type: text/plain\n\nname=foo&service=bar\n--X\nContent-Type: Application/Octet-Stream\nContent-Disposition: attachment; name=\"msg.hl7\"\n\n{}\n--X--",
            HL7
        );
        let request = parse("multipart/related; boundary=\"X\"", body.as_bytes()).unwrap();
        assert_eq!(request.argument("name"), Some("foo"));
        assert_eq!(request.argument("service"), Some("bar"));
        let attachment = request.attachment.unwrap();
        assert_eq!(attachment.name, "msg.hl7");
        assert_eq!(attachment.data, HL7.trim().as_bytes());
    }

    #[test]
    fn test_parse_crlf_and_base64() {
        let body = indoc! {"
            preamble is ignored
            --phinms_boundary
            Content-ID: <textmimepart>
            Content-Type: text/plain

            service=Router&action=send&manifest=&broken&a=b=c
            --phinms_boundary
            Content-Type: text/xml
            Content-Transfer-Encoding: base64
            Content-Disposition: attachment; name=\"payload.xml\"

            PEVuY3J5cHRl
            ZERhdGEvPg==
            --phinms_boundary--
        "}
        .replace('\n', "\r\n");
        let request = parse(
            "multipart/related; boundary=\"phinms_boundary\"",
            body.as_bytes(),
        )
        .unwrap();
        assert_eq!(request.argument("service"), Some("Router"));
        assert_eq!(request.argument("action"), Some("send"));
        assert_eq!(request.argument("manifest"), None);
        assert_eq!(request.argument("broken"), None);
        assert_eq!(request.argument("a"), None);
        assert_eq!(
            request.attachment,
            Some(Attachment {
                name: "payload.xml".to_string(),
                data: b"<EncryptedData/>".to_vec(),
            })
        );
    }

    #[test]
    fn test_raw_payload_keeps_its_bytes() {
        let payload = b"a\r\nb\nc\r\0\xff\r\nd";
        for newline in &["\n", "\r\n"] {
            let mut body = [
                "--B",
                "Content-Type: text/plain",
                "",
                "from=sender",
                "--B",
                "Content-Type: application/octet-stream",
                "Content-Disposition: attachment; name=\"blob.bin\"",
                "",
                "",
            ]
            .join(newline)
            .into_bytes();
            body.extend_from_slice(payload);
            body.extend_from_slice(format!("{}--B--{}", newline, newline).as_bytes());

            let request = parse("multipart/related; boundary=\"B\"", &body).unwrap();
            assert_eq!(request.argument("from"), Some("sender"));
            assert_eq!(request.attachment.unwrap().data, payload.to_vec());
        }
    }

    #[test]
    fn test_part_without_headers() {
        let body = b"--B\r\n\r\nignored\r\n--B--";
        let parts = split_parts(b"--B", body).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].headers.is_empty());
        assert_eq!(parts[0].body, b"ignored");
    }

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments(" a = 1 &b=&c&=d&e=f=g&h=i=&j==&k=l\r\n");
        let mut pairs: Vec<_> = args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        pairs.sort();
        assert_eq!(pairs, vec![("", "d"), ("a", "1"), ("h", "i"), ("k", "l")]);
    }

    #[test]
    fn test_unknown_parts_are_ignored() {
        let body = indoc! {"
            --B
            Content-Type: image/png

            not for us
            --B
            Content-Type: text/plain

            from=sender
            --B--"};
        let request = parse("multipart/related; boundary=\"B\"", body.as_bytes()).unwrap();
        assert_eq!(request.arguments.len(), 1);
        assert_eq!(request.attachment, None);
    }

    #[test]
    fn test_unterminated() {
        let body = "--B\nContent-Type: text/plain\n\nfrom=sender\n";
        assert_matches!(
            parse("multipart/related; boundary=\"B\"", body.as_bytes()),
            Err(Error::UnterminatedMultipart)
        );
        assert_matches!(
            parse("multipart/related; boundary=\"B\"", b"no parts here"),
            Err(Error::UnterminatedMultipart)
        );
    }

    #[test]
    fn test_attachment_name_missing() {
        let body = "--B\nContent-Type: Application/Octet-Stream\n\ndata\n--B--";
        assert_matches!(
            parse("multipart/related; boundary=\"B\"", body.as_bytes()),
            Err(Error::AttachmentNameMissing)
        );
    }

    #[test]
    fn test_malformed_part() {
        let body = "--B\nContent-Type: text/plain\nfrom=sender\n--B--";
        assert_matches!(
            parse("multipart/related; boundary=\"B\"", body.as_bytes()),
            Err(Error::MalformedPart(_))
        );
    }

    #[test]
    fn test_bad_base64() {
        let body = "--B\nContent-Type: text/xml\nContent-Transfer-Encoding: base64\nContent-Disposition: attachment; name=\"a\"\n\n!!!!\n--B--";
        assert_matches!(
            parse("multipart/related; boundary=\"B\"", body.as_bytes()),
            Err(Error::InvalidBase64(_))
        );
    }

    #[test]
    fn test_parse_stream_reads_header_block() {
        let data = indoc! {"
            Content-Type: multipart/related; type=\"text/xml\"; boundary=\"S\"
            Content-Length: 42

            --S
            Content-Type: text/plain

            status=success&error=none&appdata=ok
            --S--"};
        let request = parse_stream(data.as_bytes()).unwrap();
        assert_eq!(request.argument("status"), Some("success"));
        assert_eq!(request.argument("appdata"), Some("ok"));
    }
}
