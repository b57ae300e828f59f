//! `SIG_VALTYPE_ <id> <name> : <type>;` — overrides a signal's data format
//! to `Float` (1) or `Double` (2).

use crate::can::bitcodec::DataFormat;

pub(crate) struct SigValTypeFields {
    pub message_id: u32,
    pub signal_name: String,
    pub format: DataFormat,
}

pub(crate) fn parse(line: &str) -> Option<SigValTypeFields> {
    let after = line.trim().trim_start_matches("SIG_VALTYPE_").trim();
    let mut head = after.splitn(3, char::is_whitespace);
    let message_id: u32 = head.next()?.parse().ok()?;
    let signal_name = head.next()?.to_string();
    let rest = head.next().unwrap_or("");

    let colon_pos = rest.find(':')?;
    let type_str = rest[colon_pos + 1..].trim().trim_end_matches(';').trim();
    let format = match type_str {
        "1" => DataFormat::Float,
        "2" => DataFormat::Double,
        _ => return None,
    };

    Some(SigValTypeFields {
        message_id,
        signal_name,
        format,
    })
}
