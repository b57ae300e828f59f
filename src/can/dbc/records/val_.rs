//! `VAL_ <id> <signal> <v1> "<text1>" <v2> "<text2>" ... ;` — enumerated
//! value tables. Recognized for record-kind bookkeeping (spec §4.3's
//! "extra data" state transition) but not retained: `SignalDescription`
//! carries no value-table field.

pub(crate) struct ValFields {
    pub message_id: u32,
    pub signal_name: String,
}

pub(crate) fn parse(line: &str) -> Option<ValFields> {
    let after = line.trim().trim_start_matches("VAL_").trim();
    let mut head = after.splitn(3, char::is_whitespace);
    let message_id: u32 = head.next()?.parse().ok()?;
    let signal_name = head.next()?.to_string();
    Some(ValFields {
        message_id,
        signal_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_id_and_signal_name() {
        let f = parse("VAL_ 100 Gear 0 \"Park\" 1 \"Drive\";").unwrap();
        assert_eq!(f.message_id, 100);
        assert_eq!(f.signal_name, "Gear");
    }
}
