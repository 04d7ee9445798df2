//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{CaseCounts, Payload};
use crate::traits::{Fetcher, ImageFetcher, ImageInterpreter, Publisher, Transport};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// In-memory fetcher keyed by identifier. The feed is stored under `"feed"`.
#[derive(Clone, Default)]
pub struct MockFetcher {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, body: impl Into<Vec<u8>>) -> Self {
        self.with_document("feed", body)
    }

    pub fn with_document(self, id: &str, body: impl Into<Vec<u8>>) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), body.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn lookup(&self, id: &str) -> Result<Vec<u8>, AppError> {
        self.calls.lock().unwrap().push(id.to_string());
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::FetchError(format!("no mock document for {id}")))
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn source(&self) -> String {
        "mock://".to_string()
    }

    async fn feed(&self) -> Result<Payload, AppError> {
        Ok(Payload::from_bytes("feed", self.lookup("feed")?))
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn news(&self, id: &str) -> Result<Payload, AppError> {
        Ok(Payload::from_bytes(id, self.lookup(id)?))
    }

    async fn image(&self, id: &str) -> Result<Vec<u8>, AppError> {
        self.lookup(id)
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Transport answering from a URL → body map and recording every request.
#[derive(Clone, Default)]
pub struct MockTransport {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Payload, AppError> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::FetchError(format!("HTTP 404 for {url}")))?;
        Ok(Payload::from_bytes(url, body))
    }
}

// ---------------------------------------------------------------------------
// MockInterpreter
// ---------------------------------------------------------------------------

/// Interpreter returning fixed counts and recording the images it saw.
#[derive(Clone)]
pub struct MockInterpreter {
    result: Arc<Mutex<Option<CaseCounts>>>,
    pub images: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockInterpreter {
    pub fn new(counts: CaseCounts) -> Self {
        Self {
            result: Arc::new(Mutex::new(Some(counts))),
            images: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Interpreter that fails every call.
    pub fn failing() -> Self {
        Self {
            result: Arc::new(Mutex::new(None)),
            images: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ImageInterpreter for MockInterpreter {
    async fn interpret(&self, image: &[u8]) -> Result<CaseCounts, AppError> {
        self.images.lock().unwrap().push(image.to_vec());
        self.result
            .lock()
            .unwrap()
            .ok_or_else(|| AppError::InterpretError("unreadable chart".into()))
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Publisher recording every message; optionally fails every call.
#[derive(Clone)]
pub struct MockPublisher {
    name: String,
    fail: bool,
    delay: Option<Duration>,
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl MockPublisher {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            delay: None,
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleeps for `delay` before accepting each message.
    pub fn stalled(name: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(name)
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::PublishError(format!("{} is down", self.name)));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
