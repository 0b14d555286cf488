use autoprompt_core::{Document, DriverError, ElementReport, Event, ProbeReport, StartRequest};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::DriverConfig;
use crate::driver::{Driver, DriverHandle};

/// An event tagged with the context that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEvent {
    pub context: String,
    pub event: Event,
}

/// One driver per execution context of a page, commanded together.
///
/// Every context receives every command; contexts that do not host the form
/// go idle on their own after the input probe.
pub struct DriverGroup {
    drivers: Vec<DriverHandle>,
}

impl DriverGroup {
    pub fn spawn<D: Document + ?Sized + 'static>(
        docs: Vec<Arc<D>>,
        config: DriverConfig,
    ) -> (Self, mpsc::Receiver<ContextEvent>) {
        let capacity = config.event_capacity.max(1);
        let (merged_tx, merged_rx) = mpsc::channel(capacity);

        let drivers = docs
            .into_iter()
            .map(|doc| {
                let (tx, mut rx) = mpsc::channel(capacity);
                let handle = Driver::spawn(doc, config.clone(), tx);
                let context = handle.context().to_string();
                let merged = merged_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        let tagged = ContextEvent { context: context.clone(), event };
                        if merged.send(tagged).await.is_err() {
                            break;
                        }
                    }
                    debug!(context = %context, "event relay finished");
                });
                handle
            })
            .collect();

        (Self { drivers }, merged_rx)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub async fn start(&self, request: StartRequest) -> Vec<(String, Result<(), DriverError>)> {
        let starts = self.drivers.iter().map(|d| {
            let request = request.clone();
            async move { (d.context().to_string(), d.start(request).await) }
        });
        join_all(starts).await
    }

    pub async fn stop(&self) -> Vec<(String, Result<(), DriverError>)> {
        join_all(self.drivers.iter().map(|d| async move { (d.context().to_string(), d.stop().await) })).await
    }

    pub async fn probe(&self) -> Vec<Result<ProbeReport, DriverError>> {
        join_all(self.drivers.iter().map(|d| d.probe())).await
    }

    pub async fn describe(&self) -> Vec<Result<ElementReport, DriverError>> {
        join_all(self.drivers.iter().map(|d| d.describe())).await
    }

    /// Whether any context is still running.
    pub async fn any_running(&self) -> bool {
        self.probe().await.iter().any(|r| matches!(r, Ok(report) if report.state.is_running()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprompt_core::mock::{MockDocument, MockElement};
    use autoprompt_core::RunState;

    fn frame_with_form(label: &str) -> Arc<MockDocument> {
        let doc = MockDocument::new(label);
        doc.insert(MockElement::textarea());
        doc.insert(MockElement::button("Generate"));
        Arc::new(doc)
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_context_hosting_the_form_runs() {
        let top = Arc::new(MockDocument::new("top"));
        let frame = frame_with_form("frame[0]");
        let (group, mut events) =
            DriverGroup::spawn(vec![Arc::clone(&top), Arc::clone(&frame)], DriverConfig::fast());

        let replies = group.start(StartRequest::new(vec!["a".into(), "b".into()])).await;
        assert!(replies.iter().all(|(_, r)| r.is_ok()));

        let mut progress = Vec::new();
        loop {
            let tagged = events.recv().await.unwrap();
            match tagged.event {
                Event::Progress(i) => progress.push((tagged.context, i)),
                Event::Completed => {
                    assert_eq!(tagged.context, "frame[0]");
                    break;
                }
                Event::Error(e) => panic!("unexpected error from {}: {}", tagged.context, e),
                Event::Status(_) => {}
            }
        }

        assert_eq!(progress, vec![("frame[0]".to_string(), 0), ("frame[0]".to_string(), 1)]);
        assert!(top.submissions().is_empty());
        assert_eq!(frame.submissions(), vec!["a".to_string(), "b".to_string()]);

        while group.any_running().await {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        let states: Vec<RunState> = group.probe().await.into_iter().map(|r| r.unwrap().state).collect();
        assert_eq!(states, vec![RunState::Idle, RunState::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_reaches_every_context() {
        let frame = frame_with_form("frame[0]");
        let config = DriverConfig { default_delay: std::time::Duration::from_secs(30), ..DriverConfig::fast() };
        let (group, mut events) =
            DriverGroup::spawn(vec![Arc::new(MockDocument::new("top")), Arc::clone(&frame)], config);

        group.start(StartRequest::new(vec!["a".into(), "b".into()])).await;
        loop {
            let tagged = events.recv().await.unwrap();
            if matches!(&tagged.event, Event::Status(s) if s.starts_with("Prompt 1 submitted")) {
                break;
            }
        }

        let replies = group.stop().await;
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|(_, r)| r.is_ok()));
        assert!(!group.any_running().await);

        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(frame.submissions(), vec!["a".to_string()]);

        let mut stopped = Vec::new();
        while let Ok(tagged) = events.try_recv() {
            assert!(!matches!(tagged.event, Event::Progress(_) | Event::Completed | Event::Error(_)));
            if tagged.event == Event::Status("Automation stopped".to_string()) {
                stopped.push(tagged.context);
            }
        }
        stopped.sort();
        assert_eq!(stopped, vec!["frame[0]".to_string(), "top".to_string()]);
    }

    #[tokio::test]
    async fn describe_covers_every_context() {
        let (group, _events) = DriverGroup::spawn(
            vec![frame_with_form("top"), frame_with_form("frame[0]")],
            DriverConfig::fast(),
        );

        let reports = group.describe().await;
        let contexts: Vec<String> = reports.into_iter().map(|r| r.unwrap().context).collect();
        assert_eq!(contexts, vec!["top".to_string(), "frame[0]".to_string()]);
        assert_eq!(group.len(), 2);
    }
}
