//! Call context: metadata, deadline, and a cancellation flag.
//!
//! A stream only stores its context. Callers check it around blocking
//! `send`/`recv` calls to implement their own timeout policy; cancelling does
//! not interrupt a codec call that is already in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cheap-to-clone carrier shared between a stream and its callers.
#[derive(Clone, Debug, Default)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Default)]
struct ContextInner {
    metadata: Vec<(String, String)>,
    deadline: Option<Instant>,
    cancelled: AtomicBool,
}

impl Context {
    /// Context with no metadata and no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// First metadata value stored under `key`.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.inner
            .metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn metadata_pairs(&self) -> &[(String, String)] {
        &self.inner.metadata
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Mark the context cancelled. Visible to every clone.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }
}

#[derive(Debug, Default)]
pub struct ContextBuilder {
    metadata: Vec<(String, String)>,
    deadline: Option<Instant>,
}

impl ContextBuilder {
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn build(self) -> Context {
        Context {
            inner: Arc::new(ContextInner {
                metadata: self.metadata,
                deadline: self.deadline,
                cancelled: AtomicBool::new(false),
            }),
        }
    }
}
