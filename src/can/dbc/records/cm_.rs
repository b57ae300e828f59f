//! `CM_ BO_ <id> "text";` / `CM_ SG_ <id> <name> "text";` / `CM_ "text";`
//!
//! Only the message-level form is retained (`MessageDescription.comment`);
//! signal and database-level comments are consumed for grammar fidelity but
//! have no field to land in, per spec §3.

use crate::can::dbc::strings::first_quoted;

pub(crate) enum CmTarget {
    Message { message_id: u32, text: String },
    Signal { message_id: u32, signal_name: String, text: String },
    Database { text: String },
}

pub(crate) fn parse(line: &str) -> Option<CmTarget> {
    let after = line.trim().trim_start_matches("CM_").trim();

    if let Some(rest) = after.strip_prefix("BO_") {
        let rest = rest.trim();
        let mut head = rest.splitn(2, char::is_whitespace);
        let message_id: u32 = head.next()?.parse().ok()?;
        let text = first_quoted(head.next().unwrap_or(""))?;
        return Some(CmTarget::Message { message_id, text });
    }

    if let Some(rest) = after.strip_prefix("SG_") {
        let rest = rest.trim();
        let mut head = rest.splitn(3, char::is_whitespace);
        let message_id: u32 = head.next()?.parse().ok()?;
        let signal_name = head.next()?.to_string();
        let text = first_quoted(head.next().unwrap_or(""))?;
        return Some(CmTarget::Signal {
            message_id,
            signal_name,
            text,
        });
    }

    first_quoted(after).map(|text| CmTarget::Database { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_message_comment() {
        match parse("CM_ BO_ 100 \"engine data\";").unwrap() {
            CmTarget::Message { message_id, text } => {
                assert_eq!(message_id, 100);
                assert_eq!(text, "engine data");
            }
            _ => panic!("wrong target"),
        }
    }

    #[test]
    fn decodes_signal_comment() {
        match parse("CM_ SG_ 100 Speed \"vehicle speed\";").unwrap() {
            CmTarget::Signal {
                message_id,
                signal_name,
                text,
            } => {
                assert_eq!(message_id, 100);
                assert_eq!(signal_name, "Speed");
                assert_eq!(text, "vehicle speed");
            }
            _ => panic!("wrong target"),
        }
    }

    #[test]
    fn decodes_database_comment() {
        match parse("CM_ \"whole file\";").unwrap() {
            CmTarget::Database { text } => assert_eq!(text, "whole file"),
            _ => panic!("wrong target"),
        }
    }
}
