// src/store.rs
//! File-backed persisted collaborators: subscription cache, watch-later list
//! with its append-only history, the feedback log and saved interests.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{ChannelRecord, VideoRecord};

pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.csv";
pub const WATCH_LATER_FILE: &str = "watch_later.csv";
pub const HISTORY_FILE: &str = "watch_later_history.csv";
pub const FEEDBACK_FILE: &str = "feedback.csv";
pub const INTERESTS_FILE: &str = "interests.txt";

pub const FEEDBACK_HEADER: [&str; 3] = ["date", "time", "feedback"];

pub const WATCH_LATER_HEADER: [&str; 7] = [
    "title",
    "channel_name",
    "video_id",
    "video_url",
    "length",
    "views",
    "summarized_transcript",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SubscriptionRow {
    channel_name: String,
    channel_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    total_videos: u64,
    #[serde(default)]
    new_videos: u64,
}

impl From<&ChannelRecord> for SubscriptionRow {
    fn from(c: &ChannelRecord) -> Self {
        Self {
            channel_name: c.channel_name.clone(),
            channel_id: c.channel_id.clone(),
            description: c.description.clone(),
            total_videos: c.total_video_count,
            new_videos: c.new_video_count,
        }
    }
}

impl From<SubscriptionRow> for ChannelRecord {
    fn from(r: SubscriptionRow) -> Self {
        Self {
            channel_id: r.channel_id,
            channel_name: r.channel_name,
            description: r.description,
            total_video_count: r.total_videos,
            new_video_count: r.new_videos,
        }
    }
}

/// One feedback log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRow {
    pub date: String,
    pub time: String,
    pub feedback: String,
}

/// One watch-later entry; column order is the on-disk order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchLaterRow {
    pub title: String,
    pub channel_name: String,
    pub video_id: String,
    pub video_url: String,
    /// `MM:SS`
    pub length: String,
    pub views: u64,
    #[serde(default)]
    pub summarized_transcript: String,
}

impl WatchLaterRow {
    pub fn from_record(rec: &VideoRecord, summary: impl Into<String>) -> Self {
        Self {
            title: rec.title.clone(),
            channel_name: rec.channel_name.clone(),
            video_id: rec.video_id.clone(),
            video_url: rec.watch_url(),
            length: rec.clock_length(),
            views: rec.view_count,
            summarized_transcript: summary.into(),
        }
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.channel_name.clone(),
            self.video_id.clone(),
            self.video_url.clone(),
            self.length.clone(),
            self.views.to_string(),
            self.summarized_transcript.clone(),
        ]
    }
}

/// Rows of a headed CSV file, header excluded, exact duplicates removed
/// (first occurrence kept). A missing file is an empty list.
pub fn read_unique_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        let fields: Vec<String> = row.iter().map(str::to_string).collect();
        if seen.insert(fields.clone()) {
            out.push(fields);
        }
    }
    Ok(out)
}

/// Directory holding the CSV caches plus the interests file.
///
/// Clones share one write lock, so read-modify-write steps on the same
/// directory never interleave.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn subscriptions_path(&self) -> PathBuf {
        self.dir.join(SUBSCRIPTIONS_FILE)
    }

    pub fn watch_later_path(&self) -> PathBuf {
        self.dir.join(WATCH_LATER_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.dir.join(FEEDBACK_FILE)
    }

    pub fn interests_path(&self) -> PathBuf {
        self.dir.join(INTERESTS_FILE)
    }

    /// `None` when no cache has been written yet.
    pub fn load_subscriptions(&self) -> Result<Option<Vec<ChannelRecord>>> {
        let path = self.subscriptions_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut rdr = ReaderBuilder::new()
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut out = Vec::new();
        for row in rdr.deserialize::<SubscriptionRow>() {
            out.push(row.with_context(|| format!("parsing {}", path.display()))?.into());
        }
        Ok(Some(out))
    }

    pub fn save_subscriptions(&self, channels: &[ChannelRecord]) -> Result<()> {
        let _guard = self.writes.lock();
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.subscriptions_path();
        let mut wtr = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        for c in channels {
            wtr.serialize(SubscriptionRow::from(c))?;
        }
        wtr.flush()?;
        tracing::debug!(target: "store", count = channels.len(), "subscriptions cached");
        Ok(())
    }

    pub fn load_watch_later(&self) -> Result<Vec<WatchLaterRow>> {
        let path = self.watch_later_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = ReaderBuilder::new()
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut out = Vec::new();
        for row in rdr.deserialize::<WatchLaterRow>() {
            out.push(row.with_context(|| format!("parsing {}", path.display()))?);
        }
        Ok(out)
    }

    /// Returns `false` (and writes nothing) when the video is already listed.
    pub fn append_watch_later(&self, row: &WatchLaterRow) -> Result<bool> {
        let _guard = self.writes.lock();
        if self
            .load_watch_later()?
            .iter()
            .any(|r| r.video_id == row.video_id)
        {
            return Ok(false);
        }
        append_rows(&self.watch_later_path(), &WATCH_LATER_HEADER, &[row.to_fields()])?;
        Ok(true)
    }

    /// Rewrites the list without `video_id`. Returns whether a row was removed.
    pub fn remove_watch_later(&self, video_id: &str) -> Result<bool> {
        let _guard = self.writes.lock();
        let rows = self.load_watch_later()?;
        let before = rows.len();
        let kept: Vec<WatchLaterRow> = rows.into_iter().filter(|r| r.video_id != video_id).collect();
        if kept.len() == before {
            return Ok(false);
        }
        let path = self.watch_later_path();
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("rewriting {}", path.display()))?;
        wtr.write_record(WATCH_LATER_HEADER)?;
        for r in &kept {
            wtr.write_record(r.to_fields())?;
        }
        wtr.flush()?;
        Ok(true)
    }

    /// Append every watch-later row the history has not seen yet.
    /// Returns the number of rows appended.
    pub fn sync_history(&self) -> Result<usize> {
        let _guard = self.writes.lock();
        let known: HashSet<Vec<String>> = read_unique_rows(&self.history_path())?
            .into_iter()
            .collect();
        let fresh: Vec<Vec<String>> = read_unique_rows(&self.watch_later_path())?
            .into_iter()
            .filter(|row| !known.contains(row))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        append_rows(&self.history_path(), &WATCH_LATER_HEADER, &fresh)?;
        tracing::debug!(target: "store", appended = fresh.len(), "history synced");
        Ok(fresh.len())
    }

    /// Titles of everything ever put on the watch-later list.
    pub fn history_titles(&self) -> Result<Vec<String>> {
        Ok(read_unique_rows(&self.history_path())?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Log one free-text feedback entry stamped with local date and time.
    pub fn append_feedback(&self, text: &str) -> Result<FeedbackRow> {
        let now = chrono::Local::now();
        let row = FeedbackRow {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            feedback: text.trim().to_string(),
        };
        let _guard = self.writes.lock();
        append_rows(
            &self.feedback_path(),
            &FEEDBACK_HEADER,
            &[vec![row.date.clone(), row.time.clone(), row.feedback.clone()]],
        )?;
        Ok(row)
    }

    pub fn load_feedback(&self) -> Result<Vec<FeedbackRow>> {
        let path = self.feedback_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = ReaderBuilder::new()
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut out = Vec::new();
        for row in rdr.deserialize::<FeedbackRow>() {
            out.push(row.with_context(|| format!("parsing {}", path.display()))?);
        }
        Ok(out)
    }

    /// Saved interests, trimmed. Empty when nothing was saved yet.
    pub fn load_interests(&self) -> Result<String> {
        let path = self.interests_path();
        if !path.exists() {
            return Ok(String::new());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(text.trim().to_string())
    }

    /// Writes only when the text differs from what is stored.
    /// Returns whether the file changed.
    pub fn save_interests(&self, interests: &str) -> Result<bool> {
        let _guard = self.writes.lock();
        if self.load_interests()? == interests {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.interests_path();
        fs::write(&path, interests).with_context(|| format!("writing {}", path.display()))?;
        Ok(true)
    }
}

/// Append raw rows to a headed CSV file, writing `header` first when the
/// file is new or empty.
fn append_rows(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        wtr.write_record(header)?;
    }
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
