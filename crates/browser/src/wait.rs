use autoprompt_core::{Document, DomError};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Polls `is_loaded` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the document loaded. A context torn down by navigation is
/// retried rather than reported.
pub async fn until_loaded<D: Document + ?Sized>(
    doc: &D,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, DomError> {
    let start = Instant::now();
    loop {
        match doc.is_loaded().await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(DomError::ContextUnavailable(reason)) => {
                debug!(context = doc.label(), %reason, "context changed while loading, waiting");
            }
            Err(e) => return Err(e),
        }

        if start.elapsed() >= timeout {
            debug!(context = doc.label(), waited_ms = start.elapsed().as_millis() as u64, "load wait timed out");
            return Ok(false);
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprompt_core::mock::MockDocument;

    #[tokio::test(start_paused = true)]
    async fn loaded_document_returns_at_once() {
        let doc = MockDocument::ready();
        let start = Instant::now();
        assert!(until_loaded(&doc, Duration::from_secs(30), Duration::from_secs(1)).await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_not_an_error() {
        let doc = MockDocument::ready();
        doc.set_loaded(false);
        let start = Instant::now();
        assert!(!until_loaded(&doc, Duration::from_secs(3), Duration::from_secs(1)).await.unwrap());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_context_keeps_waiting() {
        let doc = MockDocument::ready();
        doc.set_unavailable(true);
        assert!(!until_loaded(&doc, Duration::from_secs(2), Duration::from_secs(1)).await.unwrap());
    }
}
