use autoprompt_browser::{wait, Activation, Locator, Readiness, TriggerControl, ValueInjector};
use autoprompt_core::{Document, DriverError, ErrorKind, Event, RunState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;
use crate::driver::RunShared;

enum Prepared {
    Ready,
    /// No input showed up during the probe window: not the context hosting
    /// the form. Nothing is reported.
    NotHere,
}

/// One accepted start: preparation followed by the submission cycles.
pub(crate) struct Run<D: Document + ?Sized> {
    pub doc: Arc<D>,
    pub config: Arc<DriverConfig>,
    pub locator: Arc<Locator>,
    pub events: mpsc::Sender<Event>,
    pub shared: Arc<Mutex<RunShared>>,
    pub prompts: Arc<Vec<String>>,
    pub delay: Duration,
    pub generation: u64,
    pub cancel: CancellationToken,
}

impl<D: Document + ?Sized> Run<D> {
    pub async fn execute(self) {
        match self.prepare().await {
            Ok(Prepared::Ready) => self.cycles().await,
            Ok(Prepared::NotHere) => {
                debug!(
                    context = self.doc.label(),
                    "no input in this context, going idle; another context is expected to handle the run"
                );
                self.finish(RunState::Idle).await;
            }
            Err(e) => {
                error!(context = self.doc.label(), error = %e, "automation could not start");
                self.fail(e).await;
            }
        }
    }

    async fn prepare(&self) -> Result<Prepared, DriverError> {
        let doc = &*self.doc;
        let timing = &self.config.timing;
        self.status("Checking page elements...").await;

        let loaded = wait::until_loaded(doc, timing.page_load, timing.load_interval)
            .await
            .unwrap_or_else(|e| {
                debug!(context = doc.label(), error = %e, "load check failed");
                false
            });
        if !loaded {
            debug!(context = doc.label(), "document not loaded, probing anyway");
        }

        let mut input = None;
        for attempt in 1..=timing.probe_attempts {
            input = self.locator.find_input(doc).await;
            if input.is_some() {
                break;
            }
            debug!(context = doc.label(), attempt, max = timing.probe_attempts, "no input yet");
            sleep(timing.probe_interval).await;
        }
        let Some(input) = input else {
            return Ok(Prepared::NotHere);
        };
        info!(context = doc.label(), handle = %input.handle, "input found");
        self.status("Found input, waiting for trigger...").await;

        let mut trigger = None;
        for attempt in 1..=timing.trigger_attempts {
            trigger = self.locator.find_trigger(doc).await;
            if trigger.is_some() {
                break;
            }
            let buttons = doc.query_all("button").await.map(|b| b.len()).unwrap_or(0);
            debug!(context = doc.label(), attempt, max = timing.trigger_attempts, buttons, "no trigger yet");
            sleep(timing.trigger_interval).await;
        }
        let Some(trigger) = trigger else {
            return Err(DriverError::TriggerNotFound);
        };
        info!(context = doc.label(), handle = %trigger.handle, "trigger found");

        self.status("Starting automation...").await;
        Ok(Prepared::Ready)
    }

    async fn cycles(&self) {
        loop {
            let Some(cursor) = self.next_cursor().await else {
                return;
            };

            if let Err(e) = self.cycle(cursor).await {
                let e = e.in_cycle(cursor);
                if e.kind() == ErrorKind::Environment {
                    debug!(context = self.doc.label(), cursor, error = %e, "context went away, going idle");
                    self.finish(RunState::Idle).await;
                } else {
                    error!(context = self.doc.label(), cursor, error = %e, "automation failed");
                    self.fail(e).await;
                }
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(context = self.doc.label(), "delay interrupted by stop");
                    return;
                }
                _ = sleep(self.delay) => {}
            }
        }
    }

    /// The cursor to process next, or `None` once the run is over. Marks the
    /// run completed when the list is used up.
    async fn next_cursor(&self) -> Option<usize> {
        let cursor = {
            let shared = self.shared.lock().await;
            if shared.generation != self.generation || !shared.state.is_running() {
                return None;
            }
            if shared.cursor < self.prompts.len() {
                return Some(shared.cursor);
            }
            shared.cursor
        };

        if self.finish(RunState::Completed).await {
            info!(context = self.doc.label(), submitted = cursor, "automation complete");
            self.send(Event::Completed).await;
        }
        None
    }

    async fn cycle(&self, cursor: usize) -> Result<(), DriverError> {
        let doc = &*self.doc;
        let timing = &self.config.timing;
        let total = self.prompts.len();
        let prompt = &self.prompts[cursor];

        self.status(format!("Processing prompt {}/{}", cursor + 1, total)).await;
        self.emit(Event::Progress(cursor)).await;

        let input = self.locator.find_input(doc).await;
        let trigger = self.locator.find_trigger(doc).await;
        let (Some(input), Some(trigger)) = (input, trigger) else {
            // Lookups swallow DOM errors; tell a detached context apart from a changed page.
            doc.is_loaded().await?;
            return Err(DriverError::ElementsNotFound);
        };

        let injection = ValueInjector::new(timing).inject(doc, input.handle, prompt).await?;
        match injection.strategy {
            Some(strategy) => debug!(context = doc.label(), cursor, %strategy, "prompt injected"),
            None => warn!(
                context = doc.label(),
                cursor,
                error = %DriverError::InjectionFailed,
                "submitting anyway"
            ),
        }
        sleep(timing.input_settle).await;

        let control = TriggerControl::new(&self.locator, timing);
        let mut handle = trigger.handle;
        if control.is_blocked(doc, handle).await? {
            self.status("Waiting for trigger to be enabled...").await;
            let readiness = control.await_enabled(doc, handle).await?;
            if let Readiness::Forced(_) = readiness {
                info!(context = doc.label(), cursor, "trigger force-enabled");
            }
            handle = readiness.handle();
        }

        if control.fire(doc, handle).await == Activation::Fallback {
            info!(context = doc.label(), cursor, "trigger fired through plain click");
        }

        sleep(timing.indicator_delay).await;
        match self.locator.generation_indicator(doc).await {
            Some(selector) => {
                info!(context = doc.label(), cursor, %selector, "generation started");
                self.status("Generation started").await;
            }
            None => debug!(context = doc.label(), cursor, "no generation indicator seen"),
        }

        self.status(format!(
            "Prompt {} submitted. Waiting {} seconds before next prompt...",
            cursor + 1,
            self.delay.as_secs_f64()
        ))
        .await;

        let mut shared = self.shared.lock().await;
        if shared.generation == self.generation {
            shared.cursor = cursor + 1;
        }
        Ok(())
    }

    /// Settles the run state unless a stop or a newer run already did.
    /// Returns whether this run was still the one to settle it.
    async fn finish(&self, state: RunState) -> bool {
        let mut shared = self.shared.lock().await;
        if shared.generation == self.generation && shared.state.is_running() {
            shared.state = state;
            return true;
        }
        false
    }

    /// Aborts the run. Nothing is reported once the run was stopped or
    /// replaced: its failure is no longer anyone's concern.
    async fn fail(&self, e: DriverError) {
        let reason = e.to_string();
        if self.finish(RunState::Failed(reason.clone())).await {
            self.send(Event::Error(reason)).await;
        } else {
            debug!(context = self.doc.label(), error = %reason, "run already stopped or replaced, error dropped");
        }
    }

    async fn is_current(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.generation == self.generation && shared.state.is_running()
    }

    async fn status(&self, message: impl Into<String>) {
        self.emit(Event::Status(message.into())).await;
    }

    /// Sends an event on behalf of a run that still owns the driver.
    async fn emit(&self, event: Event) {
        if self.is_current().await {
            self.send(event).await;
        } else {
            debug!(context = self.doc.label(), ?event, "run no longer current, event dropped");
        }
    }

    async fn send(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            debug!(context = self.doc.label(), "event receiver dropped");
        }
    }
}
