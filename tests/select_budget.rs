// tests/select_budget.rs
use rand::Rng;
use tube_curator::model::VideoRecord;
use tube_curator::select::{budget_from_minutes, select_within_budget};

fn rec(id: &str, secs: u64) -> VideoRecord {
    VideoRecord::new(id, id).unwrap().with_duration(secs)
}

#[test]
fn greedy_walk_skips_what_does_not_fit() {
    // 10 min budget: 4 + 5 fit, 3 would overflow, 1 still fits.
    let recs = vec![rec("a", 240), rec("b", 300), rec("c", 180), rec("d", 60)];
    let out = select_within_budget(&recs, budget_from_minutes(10));
    let ids: Vec<_> = out.iter().map(|r| r.video_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "d"]);
}

#[test]
fn exact_fit_is_included() {
    let recs = vec![rec("a", 300), rec("b", 300)];
    assert_eq!(select_within_budget(&recs, 600).len(), 2);
}

#[test]
fn three_five_minute_videos_in_seven_minutes_keep_the_first_two() {
    let recs = vec![rec("v1", 300), rec("v2", 300), rec("v3", 300)];
    let out = select_within_budget(&recs, 700);
    let ids: Vec<_> = out.iter().map(|r| r.video_id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2"]);
}

#[test]
fn empty_input_and_huge_durations() {
    assert!(select_within_budget(&[], 1_000).is_empty());
    let recs = vec![rec("huge", u64::MAX), rec("small", 10)];
    let out = select_within_budget(&recs, u64::MAX);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].video_id, "huge");
}

#[test]
fn random_lists_respect_budget_order_and_greediness() {
    let mut rng = rand::rng();
    for _ in 0..200 {
        let recs: Vec<VideoRecord> = (0..rng.random_range(0..15))
            .map(|i| rec(&format!("v{i}"), rng.random_range(0..900)))
            .collect();
        let budget: u64 = rng.random_range(0..3_000);
        let out = select_within_budget(&recs, budget);

        let total: u64 = out.iter().map(|r| r.duration_seconds).sum();
        assert!(total <= budget);

        // Output is a subsequence of the input.
        let mut it = recs.iter();
        for picked in &out {
            assert!(it.any(|r| r.video_id == picked.video_id));
        }

        // Every skipped record would have overflowed at the moment it was seen.
        let mut used = 0u64;
        for r in &recs {
            let taken = out.iter().any(|o| o.video_id == r.video_id);
            if taken {
                used += r.duration_seconds;
            } else {
                assert!(used + r.duration_seconds > budget);
            }
        }
    }
}
