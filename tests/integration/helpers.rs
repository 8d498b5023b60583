//! Helper functions for integration tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use server_stats::{
    Sample, StatusSample, TargetId,
    actors::{PollSettings, PollStatusBoard, PollerContext, Supervisor},
    query::{QueryClient, QueryError, QueryResult},
    storage::{HistoryRange, HistoryStore, Stores, memory::MemoryBackend},
};

pub fn status(online: u32, description: &str) -> StatusSample {
    StatusSample {
        online,
        max: 1000,
        description: description.to_string(),
        favicon: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
    }
}

/// One scripted answer of the mock client
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(StatusSample),
    Fail,
    /// Answer only after the given delay
    Slow(Duration, StatusSample),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub address: String,
    pub at: tokio::time::Instant,
}

/// Query client answering from a script
///
/// Once the script is exhausted every query gets the fallback reply.
pub struct MockQueryClient {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockQueryClient {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Reply::Fail,
            calls: Mutex::new(vec![]),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of queries that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryClient for MockQueryClient {
    async fn query(&self, address: &str) -> QueryResult<StatusSample> {
        self.calls.lock().unwrap().push(Call {
            address: address.to_string(),
            at: tokio::time::Instant::now(),
        });

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        match reply {
            Reply::Ok(status) => Ok(status),
            Reply::Fail => Err(QueryError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Reply::Slow(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
        }
    }
}

/// Supervisor wired to an in-memory backend and a mock client
pub struct Harness {
    pub supervisor: Arc<Supervisor>,
    pub backend: Arc<MemoryBackend>,
    pub client: Arc<MockQueryClient>,
    pub status: Arc<PollStatusBoard>,
}

pub fn harness(client: MockQueryClient, settings: PollSettings) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let client = Arc::new(client);
    let status = Arc::new(PollStatusBoard::new());

    let supervisor = Arc::new(Supervisor::new(PollerContext {
        client: client.clone(),
        stores: Stores::from_backend(backend.clone()),
        status: status.clone(),
        settings,
    }));

    Harness {
        supervisor,
        backend,
        client,
        status,
    }
}

/// Poll every second, no start-up jitter
pub fn fast_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(1),
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
    }
}

/// All samples of a target, oldest first
pub async fn samples(history: &dyn HistoryStore, id: &TargetId) -> Vec<Sample> {
    history
        .query_range(HistoryRange {
            target: id.clone(),
            start: Utc::now() - chrono::Duration::days(1),
            end: Utc::now() + chrono::Duration::days(1),
            limit: None,
        })
        .await
        .unwrap()
}

/// Wait (in real time) until `condition` holds
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
