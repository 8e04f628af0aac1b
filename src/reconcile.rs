//! Per-item like and comment state, kept roughly in step with the remote store.
//!
//! Local state is updated optimistically and remote calls run on worker threads.
//! Every fetch is tagged with a per-item generation, and a response whose
//! generation is no longer current for its item is dropped instead of
//! overwriting newer state.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::api::{Comment, LikeSummary};
use crate::data::{CommentService, LikeService};
use crate::feed::FeedItem;
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SocialState {
    pub liked: bool,
    pub like_count: i64,
    pub comments: Vec<Comment>,
    pub likes_loading: bool,
    pub comments_loading: bool,
    likes_generation: u64,
    comments_generation: u64,
}

impl SocialState {
    pub fn likes_generation(&self) -> u64 {
        self.likes_generation
    }

    pub fn comments_generation(&self) -> u64 {
        self.comments_generation
    }

    fn next_likes_generation(&mut self) -> u64 {
        self.likes_generation = self.likes_generation.wrapping_add(1);
        self.likes_generation
    }

    fn next_comments_generation(&mut self) -> u64 {
        self.comments_generation = self.comments_generation.wrapping_add(1);
        self.comments_generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Preconditions failed; nothing changed and nothing was sent.
    Skipped,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeOutcome {
    Confirmed { liked: bool },
    RolledBack { error: String },
    /// The write failed but a newer action owns the state, so nothing was undone.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LikesRefreshed { index: usize },
    CommentsRefreshed { index: usize },
    RefreshFailed { index: usize, error: String },
    LikeSettled { index: usize, outcome: LikeOutcome },
    CommentPosted { index: usize },
    CommentFailed { index: usize, error: String },
    Stale { index: usize },
}

enum Response {
    Likes {
        index: usize,
        video_id: String,
        generation: u64,
        result: Result<LikeSummary>,
    },
    Comments {
        index: usize,
        video_id: String,
        generation: u64,
        result: Result<Vec<Comment>>,
    },
    LikeWrite {
        index: usize,
        video_id: String,
        generation: u64,
        requested: bool,
        result: Result<()>,
    },
    CommentPosted {
        index: usize,
        video_id: String,
        generation: u64,
        result: Result<Vec<Comment>>,
    },
}

pub struct Reconciler {
    likes: Arc<dyn LikeService>,
    comments: Arc<dyn CommentService>,
    identity: Arc<Identity>,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
    in_flight: usize,
}

impl Reconciler {
    pub fn new(
        likes: Arc<dyn LikeService>,
        comments: Arc<dyn CommentService>,
        identity: Arc<Identity>,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            likes,
            comments,
            identity,
            response_tx,
            response_rx,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Fetches likes and comments for the item at `index`. Unpersisted items are skipped.
    pub fn refresh(&mut self, items: &mut [FeedItem], index: usize) {
        let Some(item) = items.get_mut(index) else {
            return;
        };
        let Some(video_id) = item.video.persisted_id().map(str::to_string) else {
            return;
        };

        let likes_generation = item.social.next_likes_generation();
        let comments_generation = item.social.next_comments_generation();
        item.social.likes_loading = true;
        item.social.comments_loading = true;
        self.in_flight += 2;

        let tx = self.response_tx.clone();
        let service = self.likes.clone();
        let id = video_id.clone();
        thread::spawn(move || {
            let result = service.load_likes(&id);
            let _ = tx.send(Response::Likes {
                index,
                video_id: id,
                generation: likes_generation,
                result,
            });
        });

        let tx = self.response_tx.clone();
        let service = self.comments.clone();
        thread::spawn(move || {
            let result = service.load_comments(&video_id);
            let _ = tx.send(Response::Comments {
                index,
                video_id,
                generation: comments_generation,
                result,
            });
        });
    }

    /// Flips the like state optimistically, then writes it to the remote store.
    /// Skipped while the item's likes are still loading.
    pub fn toggle_like(&mut self, items: &mut [FeedItem], index: usize) -> SubmitOutcome {
        let viewer = match self.identity.require() {
            Ok(viewer) => viewer,
            Err(err) => {
                tracing::debug!(index, "like skipped: {err}");
                return SubmitOutcome::Skipped;
            }
        };
        let Some(item) = items.get_mut(index) else {
            return SubmitOutcome::Skipped;
        };
        if item.social.likes_loading {
            return SubmitOutcome::Skipped;
        }
        let Some(video_id) = item.video.persisted_id().map(str::to_string) else {
            return SubmitOutcome::Skipped;
        };

        let requested = !item.social.liked;
        item.social.likes_loading = true;
        item.social.liked = requested;
        item.social.like_count += if requested { 1 } else { -1 };
        // Invalidates any likes fetch issued before this action.
        let generation = item.social.next_likes_generation();
        self.in_flight += 1;

        let tx = self.response_tx.clone();
        let service = self.likes.clone();
        let author = viewer.author();
        thread::spawn(move || {
            let result = service.set_like(&video_id, &author, requested);
            let _ = tx.send(Response::LikeWrite {
                index,
                video_id,
                generation,
                requested,
                result,
            });
        });
        SubmitOutcome::Sent
    }

    /// Posts a comment and then replaces the item's list with a fresh fetch.
    /// Skipped while the item's comments are still loading.
    pub fn submit_comment(
        &mut self,
        items: &mut [FeedItem],
        index: usize,
        content: &str,
    ) -> SubmitOutcome {
        let viewer = match self.identity.require() {
            Ok(viewer) => viewer,
            Err(err) => {
                tracing::debug!(index, "comment skipped: {err}");
                return SubmitOutcome::Skipped;
            }
        };
        let content = content.trim();
        if content.is_empty() {
            return SubmitOutcome::Skipped;
        }
        let Some(item) = items.get_mut(index) else {
            return SubmitOutcome::Skipped;
        };
        if item.social.comments_loading {
            return SubmitOutcome::Skipped;
        }
        let Some(video_id) = item.video.persisted_id().map(str::to_string) else {
            return SubmitOutcome::Skipped;
        };

        item.social.comments_loading = true;
        let generation = item.social.next_comments_generation();
        self.in_flight += 1;

        let tx = self.response_tx.clone();
        let service = self.comments.clone();
        let author = viewer.author();
        let content = content.to_string();
        thread::spawn(move || {
            let result = service
                .post_comment(&video_id, &author, &content)
                .and_then(|_| service.load_comments(&video_id));
            let _ = tx.send(Response::CommentPosted {
                index,
                video_id,
                generation,
                result,
            });
        });
        SubmitOutcome::Sent
    }

    /// Applies every response that has already arrived.
    pub fn poll(&mut self, items: &mut [FeedItem]) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            events.push(self.apply(items, response));
        }
        events
    }

    /// Blocks until nothing is in flight or `timeout` passes.
    pub fn settle(&mut self, items: &mut [FeedItem], timeout: Duration) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => events.push(self.apply(items, response)),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        events
    }

    fn apply(&mut self, items: &mut [FeedItem], response: Response) -> Event {
        self.in_flight = self.in_flight.saturating_sub(1);
        match response {
            Response::Likes {
                index,
                video_id,
                generation,
                result,
            } => {
                let Some(item) = matching_item(items, index, &video_id) else {
                    return Event::Stale { index };
                };
                if item.social.likes_generation != generation {
                    tracing::debug!(index, generation, "dropping stale likes response");
                    return Event::Stale { index };
                }
                item.social.likes_loading = false;
                match result {
                    Ok(summary) => {
                        item.social.like_count = summary.total();
                        if let Some(viewer) = self.identity.current() {
                            item.social.liked = summary.liked_by(viewer.fid);
                        }
                        Event::LikesRefreshed { index }
                    }
                    Err(err) => {
                        tracing::warn!(index, %video_id, "likes refresh failed: {err:#}");
                        Event::RefreshFailed {
                            index,
                            error: format!("{err:#}"),
                        }
                    }
                }
            }
            Response::Comments {
                index,
                video_id,
                generation,
                result,
            } => {
                let Some(item) = matching_item(items, index, &video_id) else {
                    return Event::Stale { index };
                };
                if item.social.comments_generation != generation {
                    tracing::debug!(index, generation, "dropping stale comments response");
                    return Event::Stale { index };
                }
                item.social.comments_loading = false;
                match result {
                    Ok(comments) => {
                        item.social.comments = comments;
                        Event::CommentsRefreshed { index }
                    }
                    Err(err) => {
                        tracing::warn!(index, %video_id, "comments refresh failed: {err:#}");
                        Event::RefreshFailed {
                            index,
                            error: format!("{err:#}"),
                        }
                    }
                }
            }
            Response::LikeWrite {
                index,
                video_id,
                generation,
                requested,
                result,
            } => {
                let Some(item) = matching_item(items, index, &video_id) else {
                    return Event::Stale { index };
                };
                let current = item.social.likes_generation == generation;
                if current {
                    item.social.likes_loading = false;
                }
                let outcome = match result {
                    Ok(()) => LikeOutcome::Confirmed { liked: requested },
                    Err(err) => {
                        let error = format!("{err:#}");
                        if current && item.social.liked == requested {
                            item.social.liked = !requested;
                            item.social.like_count += if requested { -1 } else { 1 };
                            tracing::warn!(index, %video_id, "like write failed, rolled back: {error}");
                            LikeOutcome::RolledBack { error }
                        } else {
                            tracing::warn!(index, %video_id, "like write failed after newer action: {error}");
                            LikeOutcome::Failed { error }
                        }
                    }
                };
                Event::LikeSettled { index, outcome }
            }
            Response::CommentPosted {
                index,
                video_id,
                generation,
                result,
            } => {
                let item = matching_item(items, index, &video_id)
                    .filter(|item| item.social.comments_generation == generation);
                match (item, result) {
                    (Some(item), Ok(comments)) => {
                        item.social.comments_loading = false;
                        item.social.comments = comments;
                        Event::CommentPosted { index }
                    }
                    (None, Ok(_)) => {
                        tracing::debug!(index, generation, "comment refetch superseded");
                        Event::CommentPosted { index }
                    }
                    (item, Err(err)) => {
                        if let Some(item) = item {
                            item.social.comments_loading = false;
                        }
                        tracing::warn!(index, %video_id, "comment submit failed: {err:#}");
                        Event::CommentFailed {
                            index,
                            error: format!("{err:#}"),
                        }
                    }
                }
            }
        }
    }
}

fn matching_item<'a>(
    items: &'a mut [FeedItem],
    index: usize,
    video_id: &str,
) -> Option<&'a mut FeedItem> {
    items
        .get_mut(index)
        .filter(|item| item.video.persisted_id() == Some(video_id))
}
