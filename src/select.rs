// src/select.rs
//! Greedy duration-budget selection over an already ranked list.

use crate::model::VideoRecord;

/// Walk `records` in order and keep each one whose duration still fits.
///
/// Never reorders and never backtracks: a record longer than the remaining
/// budget is skipped, later shorter ones are still considered.
pub fn select_within_budget(records: &[VideoRecord], budget_seconds: u64) -> Vec<VideoRecord> {
    let mut used = 0u64;
    let mut out = Vec::new();
    for rec in records {
        let Some(total) = used.checked_add(rec.duration_seconds) else {
            continue;
        };
        if total <= budget_seconds {
            used = total;
            out.push(rec.clone());
        }
    }
    out
}

pub fn budget_from_minutes(minutes: u64) -> u64 {
    minutes.saturating_mul(60)
}

/// `MM:SS` to seconds; anything else (including `H:MM:SS` and values that
/// overflow) is 0.
pub fn parse_clock_duration(s: &str) -> u64 {
    let mut parts = s.trim().split(':');
    let (Some(m), Some(sec), None) = (parts.next(), parts.next(), parts.next()) else {
        return 0;
    };
    match (m.trim().parse::<u64>(), sec.trim().parse::<u64>()) {
        (Ok(m), Ok(sec)) => m
            .checked_mul(60)
            .and_then(|v| v.checked_add(sec))
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, secs: u64) -> VideoRecord {
        VideoRecord::new(id, id).unwrap().with_duration(secs)
    }

    #[test]
    fn oversized_record_is_skipped_but_later_ones_fit() {
        let recs = vec![rec("a", 100), rec("b", 1_000), rec("c", 200)];
        let out = select_within_budget(&recs, 400);
        let ids: Vec<_> = out.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn zero_budget_keeps_only_zero_length() {
        let recs = vec![rec("a", 0), rec("b", 1)];
        let out = select_within_budget(&recs, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].video_id, "a");
    }

    #[test]
    fn clock_durations() {
        assert_eq!(parse_clock_duration("01:30"), 90);
        assert_eq!(parse_clock_duration("0:0"), 0);
        assert_eq!(parse_clock_duration("10:00"), 600);
        assert_eq!(parse_clock_duration("abc"), 0);
        assert_eq!(parse_clock_duration("1:2:3"), 0);
        assert_eq!(parse_clock_duration("5"), 0);
        assert_eq!(parse_clock_duration(""), 0);
    }

    #[test]
    fn huge_clock_values_do_not_overflow() {
        assert_eq!(parse_clock_duration("400000000000000000:00"), 0);
        assert_eq!(parse_clock_duration("307445734561825860:59"), 0);
        assert_eq!(parse_clock_duration("0:18446744073709551615"), u64::MAX);
    }
}
