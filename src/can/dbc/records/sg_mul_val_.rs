//! `SG_MUL_VAL_ <id> <signal> <switch> <min1>-<max1>, <min2>-<max2>, ... ;`
//!
//! Overrides the implicit single-multiplexor default, naming the switch
//! signal explicitly and giving the inclusive value ranges that select
//! `signal`. Used for extended multiplexing (spec §4.3, §9 open question b).

pub(crate) struct SgMulValFields {
    pub message_id: u32,
    pub signal_name: String,
    pub switch_name: String,
    pub ranges: Vec<(i64, i64)>,
}

pub(crate) fn parse(line: &str) -> Option<SgMulValFields> {
    let after = line.trim().trim_start_matches("SG_MUL_VAL_").trim();
    let mut head = after.splitn(4, char::is_whitespace);
    let message_id: u32 = head.next()?.parse().ok()?;
    let signal_name = head.next()?.to_string();
    let switch_name = head.next()?.to_string();
    let ranges_str = head.next()?.trim().trim_end_matches(';');

    let mut ranges = Vec::new();
    for part in ranges_str.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (min_str, max_str) = part.split_once('-')?;
        let min: i64 = min_str.trim().parse().ok()?;
        let max: i64 = max_str.trim().parse().ok()?;
        ranges.push((min, max));
    }
    if ranges.is_empty() {
        return None;
    }

    Some(SgMulValFields {
        message_id,
        signal_name,
        switch_name,
        ranges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_multiple_ranges() {
        let f = parse("SG_MUL_VAL_ 100 Sub1 Mode 1-1, 3-5;").unwrap();
        assert_eq!(f.message_id, 100);
        assert_eq!(f.signal_name, "Sub1");
        assert_eq!(f.switch_name, "Mode");
        assert_eq!(f.ranges, vec![(1, 1), (3, 5)]);
    }

    #[test]
    fn decodes_single_range() {
        let f = parse("SG_MUL_VAL_ 1 S Sw 2-2;").unwrap();
        assert_eq!(f.ranges, vec![(2, 2)]);
    }
}
