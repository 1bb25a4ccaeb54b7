//! Filtered event consumption for selective subscribers.
//!
//! Agent-style pollers usually care about a slice of the vocabulary (say,
//! `progress` and the terminal events); wrapping a subscription in a filter
//! keeps their loops free of match arms for events they ignore. Dropped
//! (filtered-out) events still consumed queue slots upstream; the filter is
//! a convenience, not a backpressure mechanism.

use super::broadcaster::EventSubscription;
use super::types::CrawlEvent;

/// A subscription that only yields events passing a predicate.
pub struct FilteredSubscription<F>
where
    F: Fn(&CrawlEvent) -> bool + Send + 'static,
{
    inner: EventSubscription,
    filter: F,
}

impl<F> FilteredSubscription<F>
where
    F: Fn(&CrawlEvent) -> bool + Send + 'static,
{
    pub(super) fn new(inner: EventSubscription, filter: F) -> Self {
        Self { inner, filter }
    }

    /// Next event passing the filter; `None` once the stream closes.
    pub async fn recv(&mut self) -> Option<CrawlEvent> {
        loop {
            match self.inner.recv().await {
                Some(event) if (self.filter)(&event) => return Some(event),
                Some(_) => {}
                None => return None,
            }
        }
    }

    /// Non-blocking variant; `Ok(None)` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Result<Option<CrawlEvent>, tokio::sync::mpsc::error::TryRecvError> {
        loop {
            match self.inner.try_recv() {
                Ok(event) if (self.filter)(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether this subscription's filter admits `event`.
    #[must_use]
    pub fn would_receive(&self, event: &CrawlEvent) -> bool {
        (self.filter)(event)
    }
}
