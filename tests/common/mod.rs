#![allow(dead_code)]
use async_trait::async_trait;
use http_client::{Error, HttpClient, Request, Response};
use http_types::Url;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub const BASE_URL: &str = "https://api.discogs.test";
pub const USERNAME: &str = "crate_digger";
pub const TOKEN: &str = "test-token";

/// One canned HTTP response
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub status: u16,
    pub body: String,
    pub remaining: Option<u32>,
}

impl FakeResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            remaining: Some(59),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({ "message": format!("status {status}") }).to_string(),
            remaining: Some(59),
        }
    }

    pub fn raw(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            remaining: Some(59),
        }
    }

    pub fn with_remaining(mut self, remaining: u32) -> Self {
        self.remaining = Some(remaining);
        self
    }
}

/// A request the fake answered
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: Url,
    pub at: Instant,
    pub user_agent: Option<String>,
}

impl RecordedRequest {
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn route(&self) -> String {
        route_key(&self.url)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    routes: HashMap<String, VecDeque<FakeResponse>>,
    requests: Vec<RecordedRequest>,
}

/// Scripted stand-in for the Discogs API.
///
/// Responses are queued per route (`path` or `path?page=N`). The last
/// queued response for a route is repeated once the queue runs dry.
/// Clones share state, so a test can keep a handle after boxing one.
#[derive(Debug, Clone, Default)]
pub struct FakeDiscogs {
    state: Arc<Mutex<FakeState>>,
}

fn route_key(url: &Url) -> String {
    if !url.path().ends_with("/releases") {
        return url.path().to_string();
    }
    match url.query_pairs().find(|(key, _)| key == "page") {
        Some((_, page)) => format!("{}?page={page}", url.path()),
        None => url.path().to_string(),
    }
}

pub fn identity_path() -> String {
    "/oauth/identity".to_string()
}

pub fn folder_path() -> String {
    format!("/users/{USERNAME}/collection/folders/0")
}

pub fn releases_route(page: u32) -> String {
    format!("{}/releases?page={page}", folder_path())
}

pub fn release(id: u64, artist: &str, title: &str, rating: i64) -> Value {
    json!({
        "id": id,
        "instance_id": id + 1_000_000,
        "date_added": "2022-01-01T00:00:00-08:00",
        "rating": rating,
        "basic_information": {
            "id": id,
            "title": title,
            "year": 1991,
            "artists": [ { "name": artist, "anv": "", "id": id } ]
        }
    })
}

pub fn releases_page(page: u32, pages: u32, releases: Vec<Value>) -> Value {
    json!({
        "pagination": { "page": page, "pages": pages, "per_page": 100, "items": releases.len(), "urls": {} },
        "releases": releases
    })
}

impl FakeDiscogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake serving a valid identity and the given collection, 100 per page.
    pub fn with_collection(releases: Vec<Value>) -> Self {
        let fake = Self::new();
        fake.respond(
            &identity_path(),
            FakeResponse::ok(json!({
                "id": 1,
                "username": USERNAME,
                "resource_url": format!("{BASE_URL}/users/{USERNAME}"),
                "consumer_name": "discogs2music tests"
            })),
        );
        fake.respond(
            &folder_path(),
            FakeResponse::ok(json!({ "id": 0, "name": "All", "count": releases.len() })),
        );

        let pages: Vec<Vec<Value>> = releases.chunks(100).map(<[Value]>::to_vec).collect();
        let total = pages.len() as u32;
        for (index, page) in pages.into_iter().enumerate() {
            let number = index as u32 + 1;
            fake.respond(
                &releases_route(number),
                FakeResponse::ok(releases_page(number, total, page)),
            );
        }
        fake
    }

    /// Replace whatever is queued for `route` with `response`.
    pub fn respond(&self, route: &str, response: FakeResponse) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .insert(route.to_string(), VecDeque::from([response]));
    }

    /// Serve `responses` in order on `route`, repeating the last one.
    pub fn respond_sequence(&self, route: &str, responses: Vec<FakeResponse>) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .insert(route.to_string(), VecDeque::from(responses));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests made to `route`, in order.
    pub fn requests_to(&self, route: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.route() == route)
            .collect()
    }

    /// Page numbers requested from the releases endpoint, in order.
    pub fn pages_requested(&self) -> Vec<u32> {
        let prefix = format!("{}/releases", folder_path());
        self.requests()
            .into_iter()
            .filter(|request| request.url.path() == prefix)
            .filter_map(|request| request.query("page")?.parse().ok())
            .collect()
    }

    fn next_response(&self, url: &Url, user_agent: Option<String>) -> FakeResponse {
        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            url: url.clone(),
            at: Instant::now(),
            user_agent,
        });

        let route = route_key(url);
        match state.routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => FakeResponse::status(404),
        }
    }
}

#[async_trait]
impl HttpClient for FakeDiscogs {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        let user_agent = req
            .header("User-Agent")
            .map(|values| values.last().as_str().to_string());
        let canned = self.next_response(req.url(), user_agent);

        let mut response = Response::new(canned.status);
        if let Some(remaining) = canned.remaining {
            response.insert_header("X-Discogs-Ratelimit-Remaining", remaining.to_string());
        }
        response.set_body(canned.body);
        Ok(response)
    }
}

/// An API that accepts connections and never answers.
#[derive(Debug, Clone, Default)]
pub struct SilentDiscogs {
    calls: Arc<AtomicUsize>,
}

impl SilentDiscogs {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for SilentDiscogs {
    async fn send(&self, _req: Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("discogs2music-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
