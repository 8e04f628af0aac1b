use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::USER_AGENT;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/";
pub const DEFAULT_GATEWAY_URL: &str = "https://aquamarine-obliged-xerinae-953.mypinata.cloud/ipfs/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const PLACEHOLDER_AVATAR: &str = "/placeholder.svg?height=40&width=40";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: {status}: {message}")]
    Status { status: u16, message: String },
    #[error("api: {0} is required")]
    MissingField(&'static str),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("reels/{}", crate::VERSION),
            timeout: DEFAULT_TIMEOUT,
            http_client: None,
        }
    }
}

/// Accepts both a plain string timestamp and the extended-JSON `{"$date": ...}` wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Extended {
        #[serde(rename = "$date")]
        date: String,
    },
    Plain(String),
}

impl Timestamp {
    pub fn as_str(&self) -> &str {
        match self {
            Timestamp::Extended { date } => date,
            Timestamp::Plain(raw) => raw,
        }
    }

    pub fn parse(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.as_str())
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub symbol: String,
    #[serde(default, deserialize_with = "nullable")]
    pub supply: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub price: String,
    #[serde(default, deserialize_with = "nullable")]
    pub chain: String,
    #[serde(default, deserialize_with = "nullable")]
    pub royalties: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub fid: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pfp_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub video_cid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata_cid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub token_data: TokenData,
    #[serde(default, deserialize_with = "nullable")]
    pub creator_info: CreatorInfo,
    #[serde(default, deserialize_with = "nullable")]
    pub transaction_hash: String,
    #[serde(default, deserialize_with = "nullable")]
    pub coin_address: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "nullable")]
    pub views: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub likes: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub shares: i64,
}

impl VideoItem {
    /// Identifier of a persisted video. Items without one cannot be liked or commented on.
    pub fn persisted_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn creator_handle(&self) -> String {
        let username = self.creator_info.username.trim();
        if username.is_empty() {
            "@unknown".to_string()
        } else {
            format!("@{username}")
        }
    }

    pub fn caption(&self) -> &str {
        if !self.description.trim().is_empty() {
            &self.description
        } else {
            &self.title
        }
    }

    pub fn avatar(&self) -> &str {
        if self.creator_info.pfp_url.trim().is_empty() {
            PLACEHOLDER_AVATAR
        } else {
            &self.creator_info.pfp_url
        }
    }

    pub fn mint_price(&self) -> &str {
        if self.token_data.price.trim().is_empty() {
            "0.00"
        } else {
            &self.token_data.price
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub fid: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfp_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub video_id: String,
    #[serde(flatten)]
    pub author: Author,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LikeSummary {
    #[serde(default)]
    pub likes: Vec<LikeRecord>,
    #[serde(default)]
    pub count: Option<i64>,
}

impl LikeSummary {
    pub fn total(&self) -> i64 {
        self.count.unwrap_or(self.likes.len() as i64)
    }

    pub fn liked_by(&self, fid: i64) -> bool {
        self.likes
            .iter()
            .any(|record| record.author.fid == fid && record.liked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub video_id: String,
    #[serde(flatten)]
    pub author: Author,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeBody<'a> {
    #[serde(flatten)]
    author: &'a Author,
    liked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody<'a> {
    #[serde(flatten)]
    author: &'a Author,
    content: &'a str,
}

#[derive(Deserialize)]
struct VideosEnvelope {
    #[serde(default)]
    videos: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoEnvelope {
    video: VideoItem,
}

#[derive(Deserialize)]
struct CommentsEnvelope {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentCreated {
    #[serde(default)]
    comment_id: Option<String>,
    comment: Comment,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(anyhow!("api client user agent required"));
        }

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).with_context(|| format!("api: parse base url {base}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn videos(&self) -> Result<Vec<VideoItem>> {
        let url = self.endpoint(&["videos"])?;
        let envelope: VideosEnvelope = self.send(self.http.get(url)).context("api: fetch videos")?;
        Ok(envelope.videos)
    }

    pub fn video(&self, video_id: &str) -> Result<VideoItem> {
        let url = self.endpoint(&["videos", video_id])?;
        let envelope: VideoEnvelope = self
            .send(self.http.get(url))
            .with_context(|| format!("api: fetch video {video_id}"))?;
        Ok(envelope.video)
    }

    pub fn likes(&self, video_id: &str) -> Result<LikeSummary> {
        let url = self.endpoint(&["videos", video_id, "likes"])?;
        self.send(self.http.get(url))
            .with_context(|| format!("api: fetch likes for {video_id}"))
    }

    pub fn upsert_like(&self, video_id: &str, author: &Author, liked: bool) -> Result<()> {
        require_author(author)?;
        let url = self.endpoint(&["videos", video_id, "likes"])?;
        let body = LikeBody { author, liked };
        let _: serde_json::Value = self
            .send(self.http.post(url).json(&body))
            .with_context(|| format!("api: update like for {video_id}"))?;
        Ok(())
    }

    pub fn comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        let url = self.endpoint(&["videos", video_id, "comments"])?;
        let envelope: CommentsEnvelope = self
            .send(self.http.get(url))
            .with_context(|| format!("api: fetch comments for {video_id}"))?;
        Ok(envelope.comments)
    }

    pub fn post_comment(&self, video_id: &str, author: &Author, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(ApiError::MissingField("content").into());
        }
        require_author(author)?;
        let url = self.endpoint(&["videos", video_id, "comments"])?;
        let body = CommentBody { author, content };
        let created: CommentCreated = self
            .send(self.http.post(url).json(&body))
            .with_context(|| format!("api: add comment to {video_id}"))?;
        let mut comment = created.comment;
        if comment.id.is_none() {
            comment.id = created.comment_id;
        }
        Ok(comment)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api: base url {} cannot hold a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = request.header(USER_AGENT, &self.user_agent).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(resp.json()?)
    }
}

/// The store rejects writes without a viewer id and username.
fn require_author(author: &Author) -> Result<(), ApiError> {
    if author.fid == 0 {
        return Err(ApiError::MissingField("fid"));
    }
    if author.username.trim().is_empty() {
        return Err(ApiError::MissingField("username"));
    }
    Ok(())
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
