use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::api::{Comment, VideoItem};
use crate::data::{FeedService, Services};
use crate::identity::Identity;
use crate::navigation::{InputEvent, NavIntent, Resolution, Resolver, DEFAULT_SWIPE_THRESHOLD};
use crate::playback::{Controller, PlaybackState};
use crate::reconcile::{Event, Reconciler, SocialState, SubmitOutcome};
use crate::video::MediaFactory;

pub const SHARE_TEXT: &str = "Check out this video on Reels!";

/// One video plus everything the session tracks about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub video: VideoItem,
    pub social: SocialState,
    pub playback: PlaybackState,
}

impl FeedItem {
    pub fn new(video: VideoItem) -> Self {
        Self {
            video,
            social: SocialState::default(),
            playback: PlaybackState::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub url: String,
    pub text: &'static str,
}

pub struct SessionOptions {
    pub services: Services,
    pub identity: Arc<Identity>,
    pub media: Option<Box<dyn MediaFactory>>,
    pub swipe_threshold: f32,
    pub share_origin: String,
    /// Fetched individually and shown first, ahead of the shuffled feed.
    pub pinned_video: Option<String>,
}

impl SessionOptions {
    pub fn new(services: Services, identity: Arc<Identity>) -> Self {
        Self {
            services,
            identity,
            media: None,
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
            share_origin: String::new(),
            pinned_video: None,
        }
    }
}

/// A single viewing session: the shuffled feed, the current position, and the
/// components that react when that position moves.
pub struct Session {
    items: Vec<FeedItem>,
    index: Option<usize>,
    status: LoadStatus,
    last_error: Option<String>,
    draft: String,
    feed: Arc<dyn FeedService>,
    identity: Arc<Identity>,
    reconciler: Reconciler,
    playback: Controller,
    resolver: Resolver,
    share_origin: String,
    pinned_video: Option<String>,
}

impl Session {
    pub fn new(opts: SessionOptions) -> Self {
        let SessionOptions {
            services,
            identity,
            media,
            swipe_threshold,
            share_origin,
            pinned_video,
        } = opts;
        Self {
            items: Vec::new(),
            index: None,
            status: LoadStatus::Loading,
            last_error: None,
            draft: String::new(),
            feed: services.feed,
            reconciler: Reconciler::new(services.likes, services.comments, identity.clone()),
            identity,
            playback: Controller::new(media),
            resolver: Resolver::new(swipe_threshold),
            share_origin: share_origin.trim_end_matches('/').to_string(),
            pinned_video,
        }
    }

    pub fn load(&mut self) -> &LoadStatus {
        self.load_with(&mut rand::thread_rng())
    }

    /// Fetches the feed once and shuffles it. A failed fetch leaves an empty feed.
    pub fn load_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &LoadStatus {
        self.status = LoadStatus::Loading;
        let mut videos = match self.feed.load_videos() {
            Ok(videos) => videos,
            Err(err) => {
                tracing::warn!("feed load failed: {err:#}");
                self.last_error = Some(format!("{err:#}"));
                Vec::new()
            }
        };
        videos.shuffle(rng);

        if let Some(pinned) = self.pinned_video.as_deref() {
            match self.feed.load_video(pinned) {
                Ok(video) => {
                    if let Some(id) = video.persisted_id() {
                        videos.retain(|candidate| candidate.persisted_id() != Some(id));
                    }
                    videos.insert(0, video);
                }
                Err(err) => tracing::warn!(pinned, "pinned video unavailable: {err:#}"),
            }
        }

        self.items = videos.into_iter().map(FeedItem::new).collect();
        self.playback.attach(&self.items);
        self.index = None;
        tracing::info!(count = self.items.len(), "feed loaded");

        if self.items.is_empty() {
            self.status = LoadStatus::Empty;
        } else {
            self.status = LoadStatus::Ready;
            self.set_index(0);
        }
        &self.status
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&FeedItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&FeedItem> {
        self.index.and_then(|index| self.items.get(index))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Moves to `new_index`, clamped into the feed. Re-selecting the current
    /// index does nothing.
    pub fn set_index(&mut self, new_index: isize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() - 1;
        let target = new_index.clamp(0, last as isize) as usize;
        if self.index == Some(target) {
            return;
        }
        self.index = Some(target);
        self.playback.sync(&mut self.items, self.index);
        self.reconciler.refresh(&mut self.items, target);
    }

    pub fn apply_intent(&mut self, intent: NavIntent) {
        let Some(current) = self.index else {
            return;
        };
        if let Some(target) = intent.target(current, self.items.len()) {
            self.set_index(target as isize);
        }
    }

    /// Feeds one raw input event through the resolver and moves if it produced an intent.
    pub fn handle_input(&mut self, event: InputEvent) -> Resolution {
        let resolution = self.resolver.resolve(event);
        if let Some(intent) = resolution.intent {
            self.apply_intent(intent);
        }
        resolution
    }

    pub fn toggle_like(&mut self, index: usize) -> SubmitOutcome {
        self.reconciler.toggle_like(&mut self.items, index)
    }

    pub fn toggle_like_current(&mut self) -> SubmitOutcome {
        match self.index {
            Some(index) => self.toggle_like(index),
            None => SubmitOutcome::Skipped,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    /// Sends the draft as a comment on the current item. The draft is cleared
    /// once the request settles.
    pub fn submit_comment(&mut self) -> SubmitOutcome {
        let Some(index) = self.index else {
            return SubmitOutcome::Skipped;
        };
        self.reconciler
            .submit_comment(&mut self.items, index, &self.draft)
    }

    pub fn toggle_mute(&mut self, index: usize) -> Option<bool> {
        self.playback.toggle_mute(&mut self.items, index)
    }

    pub fn set_minting(&mut self, index: usize, minting: bool) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.playback.minting = minting;
                true
            }
            None => false,
        }
    }

    pub fn comments(&self, index: usize) -> &[Comment] {
        self.items
            .get(index)
            .map(|item| item.social.comments.as_slice())
            .unwrap_or(&[])
    }

    pub fn share_link(&self, index: usize) -> Option<ShareLink> {
        let item = self.items.get(index)?;
        let url = match item.video.persisted_id() {
            Some(id) => format!("{}/video/{}", self.share_origin, id),
            None => self.share_origin.clone(),
        };
        Some(ShareLink {
            url,
            text: SHARE_TEXT,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.reconciler.in_flight()
    }

    pub fn poll(&mut self) -> Vec<Event> {
        let events = self.reconciler.poll(&mut self.items);
        self.after_events(&events);
        events
    }

    pub fn settle(&mut self, timeout: Duration) -> Vec<Event> {
        let events = self.reconciler.settle(&mut self.items, timeout);
        self.after_events(&events);
        events
    }

    fn after_events(&mut self, events: &[Event]) {
        if events.iter().any(|event| {
            matches!(
                event,
                Event::CommentPosted { .. } | Event::CommentFailed { .. }
            )
        }) {
            self.draft.clear();
        }
    }

    // Parallel views over the per-item records.

    pub fn liked(&self) -> Vec<bool> {
        self.items.iter().map(|item| item.social.liked).collect()
    }

    pub fn like_counts(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.social.like_count).collect()
    }

    pub fn muted(&self) -> Vec<bool> {
        self.items.iter().map(|item| item.playback.muted).collect()
    }

    pub fn minting(&self) -> Vec<bool> {
        self.items.iter().map(|item| item.playback.minting).collect()
    }

    pub fn likes_loading(&self) -> Vec<bool> {
        self.items.iter().map(|item| item.social.likes_loading).collect()
    }

    pub fn comments_loading(&self) -> Vec<bool> {
        self.items
            .iter()
            .map(|item| item.social.comments_loading)
            .collect()
    }
}
