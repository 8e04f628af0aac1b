#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use reels_feed::api::{Author, Comment, LikeRecord, LikeSummary, Timestamp, VideoItem};
use reels_feed::data::{CommentService, FeedService, LikeService, Services};
use reels_feed::feed::{Session, SessionOptions};
use reels_feed::identity::{Identity, Viewer};
use reels_feed::reconcile::Event;

pub const SETTLE: Duration = Duration::from_secs(5);

/// Holds calls until the test releases them one by one, in arrival order.
#[derive(Default)]
pub struct Gate {
    enabled: Mutex<bool>,
    waiting: Mutex<Vec<Sender<()>>>,
}

impl Gate {
    pub fn close(&self) {
        *self.enabled.lock() = true;
    }

    /// Blocks until at least `count` calls are parked at the gate.
    pub fn await_arrivals(&self, count: usize) {
        let deadline = Instant::now() + SETTLE;
        while self.waiting.lock().len() < count {
            assert!(Instant::now() < deadline, "only {} of {count} calls arrived", self.waiting.lock().len());
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Releases the `nth` parked call, counting from zero.
    pub fn open(&self, nth: usize) {
        self.await_arrivals(nth + 1);
        let _ = self.waiting.lock()[nth].send(());
    }

    fn pass(&self) -> Result<()> {
        if !*self.enabled.lock() {
            return Ok(());
        }
        let (tx, rx) = bounded(1);
        self.waiting.lock().push(tx);
        rx.recv_timeout(SETTLE)
            .map_err(|_| anyhow!("gate never opened"))
    }
}

/// In-memory stand-in for the remote store. Records every call it receives.
#[derive(Default)]
pub struct FakeBackend {
    videos: Mutex<Vec<VideoItem>>,
    feed_error: Mutex<Option<String>>,
    likes: Mutex<HashMap<String, Vec<LikeRecord>>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    fail_like_writes: Mutex<bool>,
    pinned: Mutex<Option<VideoItem>>,
    calls: Mutex<Vec<String>>,
    /// Likes fetches read the store, then wait here.
    pub likes_gate: Gate,
    /// Comment fetches read the store, then wait here.
    pub comments_gate: Gate,
    pub like_writes_gate: Gate,
}

impl FakeBackend {
    pub fn with_videos(videos: Vec<VideoItem>) -> Arc<Self> {
        let backend = Self::default();
        *backend.videos.lock() = videos;
        Arc::new(backend)
    }

    pub fn failing_feed(message: &str) -> Arc<Self> {
        let backend = Self::default();
        *backend.feed_error.lock() = Some(message.to_string());
        Arc::new(backend)
    }

    /// Seeds `count` likes from other viewers on `video_id`.
    pub fn seed_likes(&self, video_id: &str, count: usize) {
        let records = (0..count)
            .map(|i| LikeRecord {
                video_id: video_id.to_string(),
                author: Author {
                    fid: 1000 + i as i64,
                    username: format!("fan{i}"),
                    ..Author::default()
                },
                liked: true,
                ..LikeRecord::default()
            })
            .collect();
        self.likes.lock().insert(video_id.to_string(), records);
    }

    /// Seeds comments, given oldest first.
    pub fn seed_comments(&self, video_id: &str, contents: &[&str]) {
        let comments = contents
            .iter()
            .enumerate()
            .map(|(i, content)| comment(video_id, content, i))
            .collect();
        self.comments.lock().insert(video_id.to_string(), comments);
    }

    pub fn fail_like_writes(&self, fail: bool) {
        *self.fail_like_writes.lock() = fail;
    }

    /// Appends one comment as the newest.
    pub fn add_comment(&self, video_id: &str, content: &str) {
        let mut all = self.comments.lock();
        let list = all.entry(video_id.to_string()).or_default();
        let created = comment(video_id, content, list.len());
        list.push(created);
    }

    /// Served by `load_video` regardless of the id asked for.
    pub fn pin(&self, video: VideoItem) {
        *self.pinned.lock() = Some(video);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("set_like") || call.starts_with("post_comment"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl FeedService for FakeBackend {
    fn load_videos(&self) -> Result<Vec<VideoItem>> {
        self.record("load_videos".to_string());
        if let Some(message) = self.feed_error.lock().clone() {
            return Err(anyhow!(message));
        }
        Ok(self.videos.lock().clone())
    }

    fn load_video(&self, video_id: &str) -> Result<VideoItem> {
        self.record(format!("load_video:{video_id}"));
        if let Some(video) = self.pinned.lock().clone() {
            return Ok(video);
        }
        self.videos
            .lock()
            .iter()
            .find(|video| video.persisted_id() == Some(video_id))
            .cloned()
            .ok_or_else(|| anyhow!("Video not found"))
    }
}

impl LikeService for FakeBackend {
    fn load_likes(&self, video_id: &str) -> Result<LikeSummary> {
        self.record(format!("load_likes:{video_id}"));
        let likes = self
            .likes
            .lock()
            .get(video_id)
            .cloned()
            .unwrap_or_default();
        self.likes_gate.pass()?;
        let count = likes.iter().filter(|record| record.liked).count() as i64;
        Ok(LikeSummary {
            likes,
            count: Some(count),
        })
    }

    fn set_like(&self, video_id: &str, author: &Author, liked: bool) -> Result<()> {
        self.record(format!("set_like:{video_id}:{liked}"));
        self.like_writes_gate.pass()?;
        if *self.fail_like_writes.lock() {
            return Err(anyhow!("Failed to update like"));
        }
        let mut likes = self.likes.lock();
        let records = likes.entry(video_id.to_string()).or_default();
        match records
            .iter_mut()
            .find(|record| record.author.fid == author.fid)
        {
            Some(record) => record.liked = liked,
            None => records.push(LikeRecord {
                video_id: video_id.to_string(),
                author: author.clone(),
                liked,
                ..LikeRecord::default()
            }),
        }
        Ok(())
    }
}

impl CommentService for FakeBackend {
    fn load_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.record(format!("load_comments:{video_id}"));
        let mut comments = self
            .comments
            .lock()
            .get(video_id)
            .cloned()
            .unwrap_or_default();
        comments.reverse();
        self.comments_gate.pass()?;
        Ok(comments)
    }

    fn post_comment(&self, video_id: &str, author: &Author, content: &str) -> Result<Comment> {
        self.record(format!("post_comment:{video_id}:{content}"));
        let mut all = self.comments.lock();
        let list = all.entry(video_id.to_string()).or_default();
        let mut created = comment(video_id, content, list.len());
        created.author = author.clone();
        list.push(created.clone());
        Ok(created)
    }
}

fn comment(video_id: &str, content: &str, seq: usize) -> Comment {
    Comment {
        id: Some(format!("{video_id}-c{seq}")),
        video_id: video_id.to_string(),
        author: Author {
            fid: 500 + seq as i64,
            username: format!("user{seq}"),
            ..Author::default()
        },
        content: content.to_string(),
        created_at: Some(Timestamp::Plain(format!(
            "2025-05-01T10:{:02}:00Z",
            seq % 60
        ))),
    }
}

pub fn video(id: &str) -> VideoItem {
    VideoItem {
        id: Some(id.to_string()),
        title: format!("Video {id}"),
        video_cid: format!("bafy-{id}"),
        ..VideoItem::default()
    }
}

pub fn videos(count: usize) -> Vec<VideoItem> {
    (0..count).map(|i| video(&format!("v{i}"))).collect()
}

pub fn viewer() -> Arc<Identity> {
    Arc::new(Identity::signed_in(Viewer {
        fid: 42,
        username: Some("alice".to_string()),
        display_name: Some("Alice".to_string()),
        pfp_url: None,
    }))
}

pub fn anonymous() -> Arc<Identity> {
    Arc::new(Identity::anonymous())
}

pub fn services(backend: &Arc<FakeBackend>) -> Services {
    Services {
        feed: backend.clone(),
        likes: backend.clone(),
        comments: backend.clone(),
    }
}

pub fn options(backend: &Arc<FakeBackend>, identity: Arc<Identity>) -> SessionOptions {
    let mut opts = SessionOptions::new(services(backend), identity);
    opts.share_origin = "https://reels.test/".to_string();
    opts
}

/// A loaded session with a fixed shuffle and every initial fetch resolved.
pub fn loaded(backend: &Arc<FakeBackend>, identity: Arc<Identity>) -> Session {
    let mut session = Session::new(options(backend, identity));
    session.load_with(&mut StdRng::seed_from_u64(11));
    session.settle(SETTLE);
    session
}

/// Polls until an event matching `wanted` arrives. Returns every event seen.
pub fn poll_until(session: &mut Session, wanted: impl Fn(&Event) -> bool) -> Vec<Event> {
    let deadline = Instant::now() + SETTLE;
    let mut seen = Vec::new();
    loop {
        let events = session.poll();
        let found = events.iter().any(&wanted);
        seen.extend(events);
        if found {
            return seen;
        }
        assert!(Instant::now() < deadline, "event never arrived; saw {seen:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

pub fn current_id(session: &Session) -> String {
    session
        .current()
        .and_then(|item| item.video.persisted_id())
        .unwrap_or_default()
        .to_string()
}
