//! Shared fakes for dtk-fetch integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dtk_fetch::{
    FetchError, FetchRequest, FetchResponse, HttpTransport, PageRequest, PageResponse, PageSource,
    TransportError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Page source over `0..total` with per-offset failure and latency injection
pub struct FakePageSource {
    pub total: usize,
    pub requests: Mutex<Vec<PageRequest>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    fail_offsets: HashSet<usize>,
    total_overrides: HashMap<usize, usize>,
    short_offsets: HashSet<usize>,
    delay_for: fn(usize) -> Duration,
}

impl FakePageSource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_offsets: HashSet::new(),
            total_overrides: HashMap::new(),
            short_offsets: HashSet::new(),
            delay_for: |_| Duration::ZERO,
        }
    }

    /// Page fetch at `offset` exhausts its retries
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_offsets.insert(offset);
        self
    }

    /// Page at `offset` reports a different total
    pub fn total_at(mut self, offset: usize, total: usize) -> Self {
        self.total_overrides.insert(offset, total);
        self
    }

    /// Page at `offset` drops its last record
    pub fn short_at(mut self, offset: usize) -> Self {
        self.short_offsets.insert(offset);
        self
    }

    pub fn with_delay(mut self, delay_for: fn(usize) -> Duration) -> Self {
        self.delay_for = delay_for;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Offsets of page calls, excluding the `limit=1` probe
    pub fn page_offsets(&self) -> Vec<usize> {
        let requests = self.requests.lock().unwrap();
        let mut offsets: Vec<usize> = requests
            .iter()
            .skip(1)
            .map(|r| r.offset)
            .collect();
        offsets.sort_unstable();
        offsets
    }
}

#[async_trait]
impl PageSource for FakePageSource {
    type Record = usize;

    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse<usize>, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = (self.delay_for)(request.offset);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.limit > 1 && self.fail_offsets.contains(&request.offset) {
            return Err(FetchError::TransientExhausted {
                url: format!("fake://page/{}", request.offset),
                attempts: 5,
                last_error: TransportError::Connect("connection reset".to_string()),
            });
        }

        let end = (request.offset + request.limit).min(self.total);
        let mut records: Vec<usize> = (request.offset..end).collect();
        if request.limit > 1 && self.short_offsets.contains(&request.offset) {
            records.pop();
        }

        let total = if request.limit > 1 {
            *self.total_overrides.get(&request.offset).unwrap_or(&self.total)
        } else {
            self.total
        };

        Ok(PageResponse { total, records })
    }
}

/// Transport that always fails with a connection error
pub struct DeadTransport {
    pub calls: AtomicUsize,
}

impl DeadTransport {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpTransport for DeadTransport {
    async fn send(&self, _request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Connect("connection refused".to_string()))
    }
}

/// Serves a JSON page body computed from the request's offset/limit
pub struct JsonPagesTransport {
    pub total: usize,
    pub calls: AtomicUsize,
    /// Offset whose page always fails with a connection error
    pub dead_offset: Option<usize>,
}

#[async_trait]
impl HttpTransport for JsonPagesTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let lookup = |name: &str| -> usize {
            request
                .query
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(0)
        };
        let offset = lookup("offset");
        let limit = lookup("limit");

        if limit > 1 && self.dead_offset == Some(offset) {
            return Err(TransportError::Connect("connection reset by peer".to_string()));
        }

        let end = (offset + limit).min(self.total);
        let rows: Vec<serde_json::Value> = (offset..end)
            .map(|i| serde_json::json!({"id": i}))
            .collect();
        let body = serde_json::json!({"total": self.total, "records": rows});
        Ok(FetchResponse::new(200, body.to_string()))
    }
}
