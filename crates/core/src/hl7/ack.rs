use super::model::{hl7_now, Hl7Msg, Index};
use super::Error;
use log::*;

/// Application accept
pub const ACK_ACCEPT: &str = "AA";
/// Application error
pub const ACK_ERROR: &str = "AE";
/// Application reject
pub const ACK_REJECT: &str = "AR";
/// Comment sent with an accepted message
pub const ACK_COMMENT: &str = "MSG OK";

/// Header fields copied into the acknowledgment as (to, from)
///
/// Sending and receiving application and facility trade places.
const SWAPPED_FIELDS: [(usize, usize); 6] = [(3, 5), (4, 6), (5, 3), (6, 4), (11, 11), (12, 12)];

/// Builds an acknowledgment for every `MSH` in `msg`, stamped with the current time
///
/// Each gets an `MSH` with the routing fields swapped followed by an `MSA` carrying
/// `code`, the message control ID of the original and `comment`.
pub fn build_ack(msg: &Hl7Msg, code: &str, comment: &str) -> Result<Hl7Msg, Error> {
    build_ack_at(msg, code, comment, &hl7_now())
}

/// Like [`build_ack`] with a fixed timestamp
pub fn build_ack_at(
    msg: &Hl7Msg,
    code: &str,
    comment: &str,
    timestamp: &str,
) -> Result<Hl7Msg, Error> {
    let mut ack = Hl7Msg::new();
    let mut occurrence = 1;
    while let Some(source) = msg.find_segment("MSH", occurrence) {
        ack.append_segment("MSH")?;
        let header = ack.segment_count() - 1;
        for (to, from) in SWAPPED_FIELDS.iter() {
            if let Some(field) = msg.field(source, *from) {
                ack.set_field(header, *to, field.clone());
            }
        }
        ack.set_at(&Index::leaf(header, 7, 0, 0, 0), timestamp);
        ack.set_at(&Index::leaf(header, 9, 0, 0, 0), "ACK");

        ack.append_segment("MSA")?;
        let msa = ack.segment_count() - 1;
        ack.set_at(&Index::leaf(msa, 1, 0, 0, 0), code);
        if let Some(control_id) = msg.field(source, 10) {
            ack.set_field(msa, 2, control_id.clone());
        }
        ack.set_at(&Index::leaf(msa, 3, 0, 0, 0), comment);

        occurrence += 1;
    }
    debug!("Built {} acknowledgments", occurrence - 1);
    Ok(ack)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = "MSH|^~\\&|A|B|C|D|20240101000000||ACK|1|P|2.3\rMSA|AA|1\r";

    #[test]
    fn test_ack() {
        let msg = Hl7Msg::parse(MESSAGE).unwrap();
        let ack = build_ack_at(&msg, ACK_ACCEPT, ACK_COMMENT, "20250102030405").unwrap();
        assert_eq!(
            ack.format().unwrap(),
            "MSH|^~\\&|C|D|A|B|20250102030405||ACK||P|2.3\rMSA|AA|1|MSG OK\r"
        );
    }

    #[test]
    fn test_ack_copies_whole_fields() {
        let msg = Hl7Msg::parse(
            "MSH|^~\\&|APP^1.2&ISO~ALT|FAC|RCV|RFAC|20240101||ORU^R01|CTRL^X|P^T|2.5.1\r",
        )
        .unwrap();
        let ack = build_ack_at(&msg, ACK_ERROR, "bad", "20250102030405").unwrap();
        assert_eq!(ack.get("MSH-5"), Some("APP"));
        assert_eq!(ack.get("MSH-5-2-2"), Some("ISO"));
        assert_eq!(ack.get("MSH-5:2"), Some("ALT"));
        assert_eq!(ack.get("MSH-11-2"), Some("T"));
        assert_eq!(ack.get("MSA-1"), Some("AE"));
        assert_eq!(ack.get("MSA-2-2"), Some("X"));
        assert_eq!(ack.get("MSA-3"), Some("bad"));
    }

    #[test]
    fn test_ack_per_header() {
        let msg = Hl7Msg::parse(
            "FHS|^~\\&\rMSH|^~\\&|A1|B1|C1|D1|t||ADT|10|P|2.3\rPID|1\rMSH|^~\\&|A2|B2|C2|D2|t||ADT|20|P|2.3\r",
        )
        .unwrap();
        let ack = build_ack(&msg, ACK_ACCEPT, ACK_COMMENT).unwrap();
        assert_eq!(ack.segment_count(), 4);
        assert_eq!(ack.get("MSH:2-3"), Some("C2"));
        assert_eq!(ack.get("MSA:1-2"), Some("10"));
        assert_eq!(ack.get("MSA:2-2"), Some("20"));
        assert_eq!(ack.get("MSH-7").map(|t| t.len()), Some(14));
    }

    #[test]
    fn test_no_header_no_ack() {
        let msg = Hl7Msg::parse("PID|1\r").unwrap();
        let ack = build_ack(&msg, ACK_ACCEPT, ACK_COMMENT).unwrap();
        assert_eq!(ack.segment_count(), 0);
    }
}
