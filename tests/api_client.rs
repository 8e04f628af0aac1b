use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

use reels_feed::api::{ApiError, Author, Client, ClientConfig};
use reels_feed::data::Services;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    body: String,
    user_agent: Option<String>,
}

struct FakeServer {
    base_url: String,
    requests: Receiver<Recorded>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Answers exactly `expected` requests, then stops.
    fn start<F>(expected: usize, handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, Value) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("bind fake server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("ip listener")
            .port();
        let (tx, requests) = unbounded();
        let handle = thread::spawn(move || {
            for _ in 0..expected {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body,
                    user_agent: request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv("User-Agent"))
                        .map(|header| header.value.as_str().to_string()),
                };
                let (status, payload) = handler(&recorded);
                let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("content type header");
                let response = Response::from_string(payload.to_string())
                    .with_status_code(status)
                    .with_header(content_type);
                let _ = request.respond(response);
                let _ = tx.send(recorded);
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{port}/api"),
            requests,
            handle,
        }
    }

    fn client(&self) -> Client {
        Client::new(ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        })
        .expect("client")
    }

    fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("server thread");
        self.requests.try_iter().collect()
    }
}

fn author() -> Author {
    Author {
        fid: 42,
        username: "alice".to_string(),
        display_name: Some("Alice".to_string()),
        pfp_url: Some("https://img.test/alice.png".to_string()),
    }
}

#[test]
fn lists_videos_through_the_feed_service() {
    let server = FakeServer::start(1, |_| {
        (
            200,
            json!({"videos": [
                {"_id": "v1", "title": "gm", "videoCid": "bafy1", "creatorInfo": {"fid": 1, "username": "bob"}},
                {"_id": "v2", "title": "gn", "videoCid": "bafy2", "tokenData": {"price": "0.5", "symbol": "GN"}}
            ]}),
        )
    });
    let services = Services::from_client(Arc::new(server.client()));
    let videos = services.feed.load_videos().expect("videos");
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].creator_handle(), "@bob");
    assert_eq!(videos[1].mint_price(), "0.5");

    let requests = server.finish();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/api/videos");
    assert!(requests[0]
        .user_agent
        .as_deref()
        .is_some_and(|agent| agent.starts_with("reels/")));
}

#[test]
fn fetches_a_single_video() {
    let server = FakeServer::start(1, |_| {
        (200, json!({"video": {"_id": "abc", "title": "pinned"}}))
    });
    let video = server.client().video("abc").expect("video");
    assert_eq!(video.persisted_id(), Some("abc"));
    assert_eq!(server.finish()[0].url, "/api/videos/abc");
}

#[test]
fn reads_like_summary() {
    let server = FakeServer::start(1, |_| {
        (
            200,
            json!({"likes": [
                {"videoId": "v1", "fid": 42, "username": "alice", "liked": true},
                {"videoId": "v1", "fid": 7, "username": "bob", "liked": true}
            ], "count": 2}),
        )
    });
    let summary = server.client().likes("v1").expect("likes");
    assert_eq!(summary.total(), 2);
    assert!(summary.liked_by(42));
    assert_eq!(server.finish()[0].url, "/api/videos/v1/likes");
}

#[test]
fn like_write_sends_a_flat_body() {
    let server = FakeServer::start(1, |_| (200, json!({"success": true})));
    server
        .client()
        .upsert_like("v1", &author(), false)
        .expect("like write");

    let requests = server.finish();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/api/videos/v1/likes");
    let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(
        body,
        json!({
            "fid": 42,
            "username": "alice",
            "displayName": "Alice",
            "pfpUrl": "https://img.test/alice.png",
            "liked": false
        })
    );
}

#[test]
fn lists_comments_in_server_order() {
    let server = FakeServer::start(1, |_| {
        (
            200,
            json!({"comments": [
                {"_id": "c2", "videoId": "v1", "fid": 7, "username": "bob", "content": "second", "createdAt": "2025-05-02T00:00:00Z"},
                {"_id": "c1", "videoId": "v1", "fid": 9, "username": "eve", "content": "first", "createdAt": {"$date": "2025-05-01T00:00:00Z"}}
            ]}),
        )
    });
    let comments = server.client().comments("v1").expect("comments");
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["second", "first"]);
    assert_eq!(comments[1].author.username, "eve");
    assert_eq!(server.finish()[0].url, "/api/videos/v1/comments");
}

#[test]
fn posted_comment_takes_the_returned_id() {
    let server = FakeServer::start(1, |request| {
        let body: Value = serde_json::from_str(&request.body).unwrap_or(Value::Null);
        (
            201,
            json!({
                "success": true,
                "commentId": "c9",
                "comment": {
                    "videoId": "v1",
                    "fid": body["fid"],
                    "username": body["username"],
                    "content": body["content"]
                }
            }),
        )
    });
    let comment = server
        .client()
        .post_comment("v1", &author(), "gm")
        .expect("comment");
    assert_eq!(comment.id.as_deref(), Some("c9"));
    assert_eq!(comment.content, "gm");
    assert_eq!(comment.author.fid, 42);

    let requests = server.finish();
    assert_eq!(requests[0].method, "POST");
    let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body["content"], "gm");
    assert_eq!(body["username"], "alice");
}

#[test]
fn error_status_carries_the_server_message() {
    let server = FakeServer::start(1, |_| (404, json!({"error": "Video not found"})));
    let err = server.client().video("missing").expect_err("should fail");
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Status { status, message }) => {
            assert_eq!(*status, 404);
            assert_eq!(message, "Video not found");
        }
        other => panic!("unexpected error: {other:?} ({err:#})"),
    }
    server.finish();
}

#[test]
fn writes_without_a_username_are_refused_locally() {
    let client = Client::new(ClientConfig {
        base_url: "http://127.0.0.1:9/api".to_string(),
        ..ClientConfig::default()
    })
    .expect("client");
    let nameless = Author {
        fid: 42,
        ..Author::default()
    };

    let err = client.upsert_like("v1", &nameless, true).expect_err("refused");
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::MissingField("username"))
    ));
    let signed_out = Author {
        fid: 0,
        ..author()
    };
    let err = client.post_comment("v1", &signed_out, "gm").expect_err("refused");
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::MissingField("fid"))
    ));
    let err = client.post_comment("v1", &author(), "   ").expect_err("refused");
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::MissingField("content"))
    ));
}
