//! A unique-ID-keyed collection of [`SignalDescription`]s plus frame size.
//!
//! Grounded on the teacher's `MessageDBC`
//! (`examples/MarcoBelluDev-can_tools/src/dbc/types/message.rs`), simplified
//! to a plain `HashMap<String, SignalDescription>` per spec §3
//! ("name-keyed mapping of SignalDescription").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::can::signal::SignalDescription;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageDescription {
    pub unique_id: u32,
    pub name: String,
    pub size: u16,
    pub transmitter: String,
    pub comment: String,
    pub signals: HashMap<String, SignalDescription>,
}

impl MessageDescription {
    pub fn new(unique_id: u32, name: impl Into<String>, size: u16) -> Self {
        MessageDescription {
            unique_id,
            name: name.into(),
            size,
            transmitter: String::new(),
            comment: String::new(),
            signals: HashMap::new(),
        }
    }

    /// Valid only when non-empty and every signal is valid, per spec §3.
    pub fn is_valid(&self) -> bool {
        self.size <= 64 && !self.signals.is_empty() && self.signals.values().all(|s| s.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_invalid() {
        let m = MessageDescription::new(1, "m", 8);
        assert!(!m.is_valid());
    }

    #[test]
    fn message_with_one_valid_signal_is_valid() {
        let mut m = MessageDescription::new(1, "m", 8);
        m.signals
            .insert("s".to_string(), SignalDescription::new("s"));
        assert!(m.is_valid());
    }
}
