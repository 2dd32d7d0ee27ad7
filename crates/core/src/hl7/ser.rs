use super::escape::{encode, Delimiters};
use super::model::{has_delimiters, is_segment_name, Field, Hl7Msg};
use super::Error;

/// Formats a message as bar delimited text, each segment ending with a carriage return
///
/// Trailing empty elements are left out at every level. Delimiter segments are written
/// with the delimiters after their name in place of their first two fields.
pub fn format(msg: &Hl7Msg, delims: &Delimiters) -> Result<String, Error> {
    let mut out = String::new();
    for (index, segment) in msg.segments().iter().enumerate() {
        let name = msg.segment_name(index).unwrap_or_default();
        if !is_segment_name(name) {
            return Err(Error::InvalidSegmentName(name.to_string()));
        }

        out.push_str(name);
        let first_field = if has_delimiters(name) {
            out.push_str(&delims.to_string());
            3
        } else {
            1
        };

        let fields = segment
            .iter()
            .skip(first_field)
            .map(|field| format_field(field, delims));
        for field in trimmed(fields) {
            out.push(delims.field);
            out.push_str(&field);
        }
        out.push('\r');
    }
    Ok(out)
}

fn format_field(field: &Field, delims: &Delimiters) -> String {
    let repetitions = field.iter().map(|repetition| {
        let components = repetition.iter().map(|component| {
            let subs = component
                .iter()
                .map(|sub| sub.as_deref().map(|s| encode(s, delims)).unwrap_or_default());
            trimmed(subs).join(&delims.subcomponent.to_string())
        });
        trimmed(components).join(&delims.component.to_string())
    });
    trimmed(repetitions).join(&delims.repetition.to_string())
}

/// Collects the pieces without the trailing empty ones
fn trimmed<I: Iterator<Item = String>>(pieces: I) -> Vec<String> {
    let mut pieces: Vec<String> = pieces.collect();
    while pieces.last().map_or(false, |p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hl7::Index;
    use assert_matches::assert_matches;

    #[test]
    fn test_round_trip() {
        let text = "MSH|^~\\&|A|B|C|D|20240101000000||ORU^R01|1|P|2.3\rPID|1||12345~678^^^MR||DOE^JOHN\\T\\JR\rOBX|1|ST|A&B\r";
        let msg = Hl7Msg::parse(text).unwrap();
        assert_eq!(msg.format().unwrap(), text);
    }

    #[test]
    fn test_trailing_empties_dropped() {
        let msg = Hl7Msg::parse("MSH|^~\\&|A||||\rPID|1^^~|||\r").unwrap();
        assert_eq!(msg.format().unwrap(), "MSH|^~\\&|A\rPID|1\r");
    }

    #[test]
    fn test_escapes_values() {
        let mut msg = Hl7Msg::new();
        msg.append_segment("NTE").unwrap();
        msg.set("NTE-3", "a|b^c").unwrap();
        assert_eq!(msg.format().unwrap(), "NTE|||a\\F\\b\\S\\c\r");
    }

    #[test]
    fn test_other_delimiters() {
        let msg = Hl7Msg::parse("MSH|^~\\&|A^B|C\rPID|1~2\r").unwrap();
        assert_eq!(
            msg.format_with("#*$%@").unwrap(),
            "MSH#*$%@#A*B#C\rPID#1$2\r"
        );
        assert_matches!(msg.format_with("#*$"), Err(Error::InvalidDelimiters(_)));
    }

    #[test]
    fn test_new_delimiter_segment() {
        let mut msg = Hl7Msg::new();
        msg.append_segment("MSH").unwrap();
        msg.set("MSH-9", "ACK").unwrap();
        assert_eq!(msg.format().unwrap(), "MSH|^~\\&|||||||ACK\r");
    }

    #[test]
    fn test_bad_segment_name() {
        let mut msg = Hl7Msg::new();
        msg.append_segment("PID").unwrap();
        msg.set_at(&Index::leaf(0, 0, 0, 0, 0), "pid");
        assert_matches!(msg.format(), Err(Error::InvalidSegmentName(_)));
    }
}
