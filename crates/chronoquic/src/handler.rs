use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use chronoquic_frame::Payload;
use chronoquic_session::{HandlerError, RequestHandler};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::DateTimeError;

/// Simulated work done before each request is answered.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(100);

/// Answers each request with the current time rendered through the
/// strftime-style pattern carried in the request data.
#[derive(Clone)]
pub struct DateTimeHandler {
    clock: Arc<dyn Clock>,
    processing_delay: Duration,
}

impl Default for DateTimeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DateTimeHandler {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            processing_delay: DEFAULT_PROCESSING_DELAY,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    pub fn processing_delay(&self) -> Duration {
        self.processing_delay
    }

    /// Decode the pattern and format the clock's current reading with it.
    pub fn render(&self, payload: &Payload) -> Result<String, DateTimeError> {
        let pattern = payload.data_utf8()?;
        format_timestamp(&self.clock.now(), pattern)
    }
}

/// Format `at` with a strftime-style `pattern`.
///
/// Unknown or incomplete specifiers are reported instead of being copied
/// through or panicking inside `Display`.
pub fn format_timestamp(
    at: &DateTime<FixedOffset>,
    pattern: &str,
) -> Result<String, DateTimeError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(DateTimeError::format(pattern));
    }

    let mut out = String::with_capacity(pattern.len() * 2);
    write!(out, "{}", at.format_with_items(items.iter()))
        .map_err(|_| DateTimeError::format(pattern))?;
    Ok(out)
}

#[async_trait]
impl RequestHandler for DateTimeHandler {
    async fn request_response(&self, payload: Payload) -> Result<Payload, HandlerError> {
        tokio::time::sleep(self.processing_delay).await;
        let rendered = self.render(&payload).map_err(|err| {
            debug!(error = %err, "rejecting date format request");
            err
        })?;
        Ok(Payload::new(rendered))
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<(), HandlerError> {
        let rendered = self.render(&payload)?;
        info!(timestamp = %rendered, "fire-and-forget date request");
        Ok(())
    }
}
