//! `BO_ <id> <name>: <size> <transmitter>` — message declaration.
//!
//! Tokenizing grounded on the teacher's `dbc/support/bo_.rs`: split the
//! identifier off first, then find the name by locating the first `:`
//! rather than splitting on whitespace (message names never contain a
//! colon, but some DBC exporters leave no space before it).

use crate::can::message::MessageDescription;

pub(crate) struct BoFields {
    pub unique_id: u32,
    pub name: String,
    pub size: u16,
    pub transmitter: String,
}

/// Parses a `BO_` line's fields, or `None` if the record is malformed.
pub(crate) fn parse(line: &str) -> Option<BoFields> {
    let after = line.trim().trim_start_matches("BO_").trim();

    let mut split = after.splitn(2, char::is_whitespace);
    let id_str = split.next()?;
    let rest = split.next().unwrap_or("").trim();
    let unique_id: u32 = id_str.parse().ok()?;

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();
    if name.is_empty() {
        return None;
    }

    let mut tail = rest[colon_pos + 1..].trim().split_ascii_whitespace();
    let size: u16 = tail.next().and_then(|t| t.parse().ok())?;
    let transmitter = tail.next().unwrap_or("").trim_end_matches(';').to_string();

    Some(BoFields {
        unique_id,
        name,
        size,
        transmitter,
    })
}

pub(crate) fn decode(line: &str) -> Option<MessageDescription> {
    let fields = parse(line)?;
    let mut message = MessageDescription::new(fields.unique_id, fields.name, fields.size);
    message.transmitter = fields.transmitter;
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_line() {
        let m = decode("BO_ 100 EngineData: 8 ECU").unwrap();
        assert_eq!(m.unique_id, 100);
        assert_eq!(m.name, "EngineData");
        assert_eq!(m.size, 8);
        assert_eq!(m.transmitter, "ECU");
    }

    #[test]
    fn tolerates_no_space_before_colon() {
        let m = decode("BO_ 1 Foo:4 Vector__XXX").unwrap();
        assert_eq!(m.name, "Foo");
        assert_eq!(m.size, 4);
    }

    #[test]
    fn missing_colon_is_malformed() {
        assert!(decode("BO_ 1 Foo 4 Node").is_none());
    }
}
