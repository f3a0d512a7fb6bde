// tests/store_csv.rs
use std::fs;

use tube_curator::model::{ChannelRecord, VideoRecord};
use tube_curator::store::{read_unique_rows, Store, WatchLaterRow};

fn video(id: &str, secs: u64) -> VideoRecord {
    VideoRecord::new(id, format!("Title, with comma {id}"))
        .unwrap()
        .with_channel("Chan")
        .with_duration(secs)
        .with_views(99)
}

#[test]
fn subscription_cache_round_trips_and_is_optional() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("data"));
    assert_eq!(store.load_subscriptions().unwrap(), None);

    let subs = vec![
        ChannelRecord {
            channel_id: "UC1".into(),
            channel_name: "First".into(),
            description: "multi\nline, \"quoted\"".into(),
            total_video_count: 10,
            new_video_count: 2,
        },
        ChannelRecord {
            channel_id: "UC2".into(),
            channel_name: "Second".into(),
            description: String::new(),
            total_video_count: 0,
            new_video_count: 0,
        },
    ];
    store.save_subscriptions(&subs).unwrap();
    assert_eq!(store.load_subscriptions().unwrap(), Some(subs));

    let header = fs::read_to_string(store.subscriptions_path()).unwrap();
    assert!(header.starts_with("channel_name,channel_id,description,total_videos,new_videos"));
}

#[test]
fn watch_later_append_is_idempotent_and_remove_rewrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path());

    let a = WatchLaterRow::from_record(&video("a", 125), "summary a");
    let b = WatchLaterRow::from_record(&video("b", 3_600), "");
    assert_eq!(a.length, "02:05");
    assert_eq!(b.length, "60:00");
    assert_eq!(a.video_url, "https://www.youtube.com/watch?v=a");

    assert!(store.append_watch_later(&a).unwrap());
    assert!(!store.append_watch_later(&a).unwrap());
    assert!(store.append_watch_later(&b).unwrap());
    assert_eq!(store.load_watch_later().unwrap(), vec![a.clone(), b.clone()]);

    assert!(store.remove_watch_later("a").unwrap());
    assert!(!store.remove_watch_later("a").unwrap());
    assert_eq!(store.load_watch_later().unwrap(), vec![b]);

    let text = fs::read_to_string(store.watch_later_path()).unwrap();
    assert!(text.starts_with(
        "title,channel_name,video_id,video_url,length,views,summarized_transcript"
    ));
}

#[test]
fn history_sync_appends_only_unseen_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path());

    let a = WatchLaterRow::from_record(&video("a", 60), "s");
    let b = WatchLaterRow::from_record(&video("b", 60), "s");
    store.append_watch_later(&a).unwrap();
    assert_eq!(store.sync_history().unwrap(), 1);
    assert_eq!(store.sync_history().unwrap(), 0);

    store.append_watch_later(&b).unwrap();
    store.remove_watch_later("a").unwrap();
    assert_eq!(store.sync_history().unwrap(), 1);

    let rows = read_unique_rows(&store.history_path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], "a");
    assert_eq!(rows[1][2], "b");
    assert_eq!(
        store.history_titles().unwrap(),
        vec!["Title, with comma a".to_string(), "Title, with comma b".to_string()]
    );
}

#[test]
fn unique_rows_drop_exact_duplicates_only() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("h.csv");
    fs::write(&p, "x,y\n1,2\n1,2\n1,3\n").unwrap();
    let rows = read_unique_rows(&p).unwrap();
    assert_eq!(rows, vec![vec!["1", "2"], vec!["1", "3"]]);
    assert!(read_unique_rows(&dir.path().join("missing.csv")).unwrap().is_empty());
}

#[test]
fn concurrent_appends_of_one_video_write_a_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path());
    let row = WatchLaterRow::from_record(&video("same", 60), "s");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let row = row.clone();
            std::thread::spawn(move || store.append_watch_later(&row).unwrap())
        })
        .collect();
    let added = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|added| *added)
        .count();

    assert_eq!(added, 1);
    assert_eq!(store.load_watch_later().unwrap(), vec![row]);
}

#[test]
fn feedback_log_appends_stamped_rows_under_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path());
    assert!(store.load_feedback().unwrap().is_empty());

    let first = store.append_feedback("  Love the picks  ").unwrap();
    assert_eq!(first.feedback, "Love the picks");
    assert_eq!(first.date.len(), 10);
    assert_eq!(first.time.len(), 8);
    store.append_feedback("too many shorts, \"really\"").unwrap();

    let rows = store.load_feedback().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], first);
    assert_eq!(rows[1].feedback, "too many shorts, \"really\"");

    let text = fs::read_to_string(store.feedback_path()).unwrap();
    assert!(text.starts_with("date,time,feedback\n"));
    assert_eq!(text.matches("date,time,feedback").count(), 1);
}

#[test]
fn interests_are_written_only_when_changed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("nested"));
    assert_eq!(store.load_interests().unwrap(), "");

    assert!(store.save_interests("rust, chess").unwrap());
    let modified = fs::metadata(store.interests_path()).unwrap().modified().unwrap();
    assert!(!store.save_interests("rust, chess").unwrap());
    assert_eq!(
        fs::metadata(store.interests_path()).unwrap().modified().unwrap(),
        modified
    );

    assert!(store.save_interests("cooking").unwrap());
    assert_eq!(store.load_interests().unwrap(), "cooking");
}
