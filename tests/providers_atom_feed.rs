// tests/providers_atom_feed.rs
use tube_curator::ingest::providers::atom_feed::extract_video_id;
use tube_curator::ingest::providers::AtomFeedAdapter;
use tube_curator::ingest::types::{FetchError, SourceAdapter};
use tube_curator::model::FetchTask;

const FEED: &str = include_str!("fixtures/channel_feed.xml");

#[tokio::test]
async fn parses_fixture_into_skeleton_records() {
    let adapter = AtomFeedAdapter::from_fixture_str(FEED);
    let recs = adapter
        .fetch(&FetchTask::channel("UCsXVk37bltHxD1rDPwtNM8Q"))
        .await
        .unwrap();

    let ids: Vec<_> = recs.iter().map(|r| r.video_id.as_str()).collect();
    // Premiere duplicate of the first entry is dropped.
    assert_eq!(ids, vec!["aaaaaaaaaa1", "bbbbbbbbbb2", "ccccccccc_3"]);

    assert_eq!(recs[0].title, "The Most Extreme Explosion in the Universe");
    assert_eq!(recs[0].channel_name, "Kurzgesagt – In a Nutshell");
    // 2024-05-02T14:00:00Z
    assert_eq!(recs[0].upload_timestamp, 1_714_658_400);
    assert_eq!(recs[2].upload_timestamp, 0);
    assert!(recs.iter().all(|r| r.transcript.is_none() && r.duration_seconds == 0));
}

#[tokio::test]
async fn max_per_channel_keeps_the_first_entries() {
    let adapter = AtomFeedAdapter::from_fixture_str(FEED).with_max_per_channel(1);
    let recs = adapter.fetch(&FetchTask::channel("any")).await.unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].video_id, "aaaaaaaaaa1");
}

#[tokio::test]
async fn broken_xml_is_a_parse_error() {
    let adapter = AtomFeedAdapter::from_fixture_str("<feed><entry><title>x");
    let err = adapter.fetch(&FetchTask::channel("any")).await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)), "got {err:?}");
}

#[test]
fn video_ids_from_common_url_shapes() {
    assert_eq!(
        extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").as_deref(),
        Some("dQw4w9WgXcQ")
    );
    assert_eq!(
        extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
        Some("dQw4w9WgXcQ")
    );
    assert_eq!(extract_video_id("https://www.youtube.com/channel/UCabc"), None);
}

#[test]
fn feed_url_shape() {
    assert_eq!(
        AtomFeedAdapter::feed_url("www.youtube.com", "UC123"),
        "https://www.youtube.com/feeds/videos.xml?channel_id=UC123"
    );
}
