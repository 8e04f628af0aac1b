use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{self, Author, Comment, LikeSummary, VideoItem};

pub trait FeedService: Send + Sync {
    fn load_videos(&self) -> Result<Vec<VideoItem>>;
    fn load_video(&self, video_id: &str) -> Result<VideoItem>;
}

pub trait LikeService: Send + Sync {
    fn load_likes(&self, video_id: &str) -> Result<LikeSummary>;
    fn set_like(&self, video_id: &str, author: &Author, liked: bool) -> Result<()>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, video_id: &str) -> Result<Vec<Comment>>;
    fn post_comment(&self, video_id: &str, author: &Author, content: &str) -> Result<Comment>;
}

/// The three remote collaborators a feed session talks to.
#[derive(Clone)]
pub struct Services {
    pub feed: Arc<dyn FeedService>,
    pub likes: Arc<dyn LikeService>,
    pub comments: Arc<dyn CommentService>,
}

impl Services {
    pub fn from_client(client: Arc<api::Client>) -> Self {
        Self {
            feed: Arc::new(ApiFeedService::new(client.clone())),
            likes: Arc::new(ApiLikeService::new(client.clone())),
            comments: Arc::new(ApiCommentService::new(client)),
        }
    }
}

pub struct ApiFeedService {
    client: Arc<api::Client>,
}

impl ApiFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for ApiFeedService {
    fn load_videos(&self) -> Result<Vec<VideoItem>> {
        self.client.videos().context("load video feed")
    }

    fn load_video(&self, video_id: &str) -> Result<VideoItem> {
        self.client.video(video_id).context("load video")
    }
}

pub struct ApiLikeService {
    client: Arc<api::Client>,
}

impl ApiLikeService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl LikeService for ApiLikeService {
    fn load_likes(&self, video_id: &str) -> Result<LikeSummary> {
        self.client.likes(video_id)
    }

    fn set_like(&self, video_id: &str, author: &Author, liked: bool) -> Result<()> {
        self.client.upsert_like(video_id, author, liked)
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.client.comments(video_id)
    }

    fn post_comment(&self, video_id: &str, author: &Author, content: &str) -> Result<Comment> {
        self.client.post_comment(video_id, author, content)
    }
}
