use super::escape::{decode, Delimiters};
use super::model::{has_delimiters, is_segment_name, Hl7Msg, Index};
use super::Error;
use log::*;

/// Parses bar delimited text into a message
///
/// Either every line parses or nothing is returned.
pub fn parse(text: &str) -> Result<Hl7Msg, Error> {
    let mut msg = Hl7Msg::new();
    let mut delims = Delimiters::default();

    let text = text.replace('\n', "\r");
    for (number, line) in text.split('\r').filter(|l| !l.is_empty()).enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let invalid = || Error::InvalidSegment {
            line: number + 1,
            text: line.to_string(),
        };

        let line = if has_delimiters(line) {
            // Name, delimiters, then the fields from MSH-3 on
            let name: String = line.chars().take(3).collect();
            let found: String = line.chars().skip(3).take(5).collect();
            delims = Delimiters::parse(&found).map_err(|_| invalid())?;
            let rest: String = line.chars().skip(8).collect();
            format!("{}{}{}{}", name, delims.field, delims.field, rest)
        } else if starts_segment(line, delims.field) {
            line.to_string()
        } else {
            error!("Invalid segment at line {}", number + 1);
            return Err(invalid());
        };

        let fields = split(&line, delims.field);
        let segment = msg.segment_count();
        let name = fields.first().copied().unwrap_or_default();
        msg.add_segment(segment, name).map_err(|_| invalid())?;

        for (f, field) in fields.iter().enumerate().skip(1) {
            for (r, repetition) in split(field, delims.repetition).iter().enumerate() {
                for (c, component) in split(repetition, delims.component).iter().enumerate() {
                    for (s, sub) in split(component, delims.subcomponent).iter().enumerate() {
                        msg.set_at(&Index::leaf(segment, f, r, c, s), decode(sub, &delims));
                    }
                }
            }
        }
    }

    trace!("Parsed {} segments", msg.segment_count());
    Ok(msg)
}

/// A segment name followed by the field delimiter
fn starts_segment(line: &str, field: char) -> bool {
    match line.get(0..3) {
        Some(name) => is_segment_name(name) && line[3..].starts_with(field),
        None => false,
    }
}

/// Splits on a delimiter dropping trailing empty pieces
///
/// An empty string gives a single empty piece.
fn split(s: &str, delim: char) -> Vec<&str> {
    if s.is_empty() {
        return vec![""];
    }
    let mut pieces: Vec<&str> = s.split(delim).collect();
    while pieces.last() == Some(&"") {
        pieces.pop();
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_split() {
        assert_eq!(split("a|b||", '|'), vec!["a", "b"]);
        assert_eq!(split("|a", '|'), vec!["", "a"]);
        assert_eq!(split("", '|'), vec![""]);
        assert!(split("||", '|').is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let sample = include_str!("../crypt/samples/envelope_sample_plaintext.bin");
        let msg = parse(sample).unwrap();
        assert_eq!(msg.segment_count(), 2);
        assert_eq!(msg.get("MSH-3"), Some("A"));
        assert_eq!(msg.get("MSH-7"), Some("20240101000000"));
        assert_eq!(msg.get("MSH-9-2"), Some("R01"));
        assert_eq!(msg.get("MSH-12"), Some("2.3"));
        assert_eq!(msg.get("PID-3"), Some("12345"));
    }

    #[test]
    fn test_newlines_and_blank_lines() {
        let msg = parse("\nMSH|^~\\&|A\n\n   \r\nPID|1\r\n").unwrap();
        assert_eq!(msg.segment_count(), 2);
        assert_eq!(msg.get("PID-1"), Some("1"));
    }

    #[test]
    fn test_custom_delimiters_and_escapes() {
        let msg = parse("MSH#*$%@#A*B$C*D@E#x%F%y\rPID#1*2").unwrap();
        assert_eq!(msg.get("MSH-3"), Some("A"));
        assert_eq!(msg.get("MSH-3-2"), Some("B"));
        assert_eq!(msg.get("MSH-3:2"), Some("C"));
        assert_eq!(msg.get("MSH-3:2-2-2"), Some("E"));
        assert_eq!(msg.get("MSH-4"), Some("x#y"));
        assert_eq!(msg.get("PID-1-2"), Some("2"));
    }

    #[test]
    fn test_delimiters_change_mid_message() {
        let msg = parse("FHS|^~\\&|F\rBHS#*$%@#B\rMSH|^~\\&|M\rPID|1").unwrap();
        assert_eq!(msg.get("BHS-3"), Some("B"));
        assert_eq!(msg.get("PID-1"), Some("1"));
    }

    #[test]
    fn test_invalid_segments() {
        assert_matches!(
            parse("MSH|^~\\&|A\rPID\r"),
            Err(Error::InvalidSegment { line: 2, .. })
        );
        assert_matches!(
            parse("MSH|^~\\&|A\rpid|1\r"),
            Err(Error::InvalidSegment { line: 2, .. })
        );
        assert_matches!(
            parse("MSH|^~\\&|A\rPID^1\r"),
            Err(Error::InvalidSegment { line: 2, .. })
        );
        assert_matches!(parse("MSH|^~"), Err(Error::InvalidSegment { line: 1, .. }));
        assert_matches!(parse("garbage"), Err(Error::InvalidSegment { .. }));
    }
}
