//! Mock origin server that answers byte-range requests like a real file host.
//!
//! HEAD requests get a fixed answer chosen by the test (see [`HeadBehavior`]);
//! GET requests go through [`RangeResponder`], which slices a fixed body
//! according to the `Range` header.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path every helper mounts the resource under.
pub const RESOURCE_PATH: &str = "/resource.bin";

/// Deterministic, non-repeating-looking test content.
pub fn test_content(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

/// How the mock answers HEAD requests.
#[derive(Debug, Clone, Copy)]
pub enum HeadBehavior {
    /// 206 with `Accept-Ranges: bytes` and a `Content-Range` carrying the total.
    AdvertiseRanges,
    /// 200 with no range or length information.
    Plain,
    /// A fixed status with no useful headers.
    Status(u16),
}

/// Parses `bytes=a-b` or `bytes=a-` into inclusive bounds clamped to `len`.
fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let bounds = value.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = if end.is_empty() {
        len.checked_sub(1)?
    } else {
        end.parse::<usize>().ok()?.min(len.checked_sub(1)?)
    };
    (start <= end).then_some((start, end))
}

/// GET responder that slices `content` by the request's `Range` header.
pub struct RangeResponder {
    content: Arc<Vec<u8>>,
    honour_ranges: bool,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    failures: Mutex<HashMap<String, (u16, usize)>>,
    requests: Arc<AtomicUsize>,
    ranged_requests: Arc<Mutex<Vec<String>>>,
}

impl RangeResponder {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Arc::new(content),
            honour_ranges: true,
            delays: HashMap::new(),
            default_delay: None,
            failures: Mutex::new(HashMap::new()),
            requests: Arc::new(AtomicUsize::new(0)),
            ranged_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every GET with the full body and 200, ignoring `Range`.
    pub fn ignoring_ranges(mut self) -> Self {
        self.honour_ranges = false;
        self
    }

    /// Delay the answer to one exact `Range` header value.
    pub fn delay_range(mut self, range: &str, delay: Duration) -> Self {
        self.delays.insert(range.to_string(), delay);
        self
    }

    /// Delay every answer that has no specific delay (the `bytes=0-0` check excepted).
    pub fn delay_all(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Answer `range` with `status` for its first `times` requests.
    pub fn fail_range(self, range: &str, status: u16, times: usize) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(range.to_string(), (status, times));
        self
    }

    /// Counter of every GET request seen.
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }

    /// Log of the `Range` header of every GET request seen.
    pub fn range_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.ranged_requests)
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let range_header = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let Some(range_header) = range_header.filter(|_| self.honour_ranges) else {
            let template = ResponseTemplate::new(200).set_body_bytes(self.content.as_slice());
            return match self.default_delay {
                Some(delay) => template.set_delay(delay),
                None => template,
            };
        };
        self.ranged_requests
            .lock()
            .expect("range log lock")
            .push(range_header.clone());

        if let Some((status, remaining)) = self
            .failures
            .lock()
            .expect("failures lock")
            .get_mut(&range_header)
            && *remaining > 0
        {
            *remaining -= 1;
            return ResponseTemplate::new(*status);
        }

        let Some((start, end)) = parse_range(&range_header, self.content.len()) else {
            return ResponseTemplate::new(416);
        };
        let template = ResponseTemplate::new(206)
            .insert_header(
                "content-range",
                format!("bytes {start}-{end}/{}", self.content.len()).as_str(),
            )
            .set_body_bytes(&self.content[start..=end]);

        let delay = self.delays.get(&range_header).copied().or_else(|| {
            (range_header != "bytes=0-0")
                .then_some(self.default_delay)
                .flatten()
        });
        match delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

/// Mounts a HEAD answer for a resource of `len` bytes.
pub async fn mount_head(server: &MockServer, behavior: HeadBehavior, len: usize) {
    let template = match behavior {
        HeadBehavior::AdvertiseRanges => ResponseTemplate::new(206)
            .insert_header("accept-ranges", "bytes")
            .insert_header(
                "content-range",
                format!("bytes 0-{}/{len}", len.saturating_sub(1)).as_str(),
            )
            .insert_header("content-type", "application/octet-stream"),
        HeadBehavior::Plain => ResponseTemplate::new(200),
        HeadBehavior::Status(status) => ResponseTemplate::new(status),
    };
    Mock::given(method("HEAD"))
        .and(path(RESOURCE_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mounts `responder` for GET requests of the resource.
pub async fn mount_get(server: &MockServer, responder: RangeResponder) {
    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .respond_with(responder)
        .mount(server)
        .await;
}

/// Starts a server that fully supports ranges for `content`.
pub async fn ranged_origin(responder: RangeResponder, len: usize) -> MockServer {
    let server = MockServer::start().await;
    mount_head(&server, HeadBehavior::AdvertiseRanges, len).await;
    mount_get(&server, responder).await;
    server
}

/// Full URL of the resource on `server`.
pub fn resource_url(server: &MockServer) -> String {
    format!("{}{RESOURCE_PATH}", server.uri())
}
