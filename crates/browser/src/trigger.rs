use crate::locator::Locator;
use crate::shared::TimingConfig;
use autoprompt_core::{Document, DomError, DriverError, ElementHandle, MouseKind, SyntheticEvent};
use tokio::time::sleep;
use tracing::{debug, warn};

/// How the trigger ended up usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready(ElementHandle),
    /// Still disabled after the poll window; every disabled signal was cleared.
    Forced(ElementHandle),
}

impl Readiness {
    pub fn handle(&self) -> ElementHandle {
        match self {
            Readiness::Ready(handle) | Readiness::Forced(handle) => *handle,
        }
    }
}

/// Which activation path went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Press/release, native click and synthetic click.
    Sequence,
    /// The sequence errored; a single generic click event was attempted.
    Fallback,
}

pub struct TriggerControl<'a> {
    locator: &'a Locator,
    timing: &'a TimingConfig,
}

impl<'a> TriggerControl<'a> {
    pub fn new(locator: &'a Locator, timing: &'a TimingConfig) -> Self {
        Self { locator, timing }
    }

    pub async fn is_blocked<D: Document + ?Sized>(&self, doc: &D, el: ElementHandle) -> Result<bool, DomError> {
        let signals = doc.disabled_signals(el, self.locator.disabled_classes()).await?;
        if signals.is_blocked() {
            debug!(context = doc.label(), handle = %el, ?signals, "trigger disabled");
        }
        Ok(signals.is_blocked())
    }

    /// Polls until the trigger is enabled, re-resolving it every time since
    /// the page may replace it. Past the poll window the trigger is
    /// force-enabled rather than given up on.
    pub async fn await_enabled<D: Document + ?Sized>(
        &self,
        doc: &D,
        initial: ElementHandle,
    ) -> Result<Readiness, DriverError> {
        let mut handle = initial;
        for attempt in 1..=self.timing.enable_attempts {
            if !self.is_blocked(doc, handle).await? {
                return Ok(Readiness::Ready(handle));
            }
            debug!(context = doc.label(), attempt, max = self.timing.enable_attempts, "waiting for trigger");
            sleep(self.timing.enable_interval).await;

            handle = match self.locator.find_trigger(doc).await {
                Some(el) => el.handle,
                None => {
                    warn!(context = doc.label(), "trigger disappeared while waiting");
                    return Err(DriverError::TriggerDisappeared);
                }
            };
        }

        if !self.is_blocked(doc, handle).await? {
            return Ok(Readiness::Ready(handle));
        }

        warn!(context = doc.label(), handle = %handle, "trigger still disabled, force-enabling");
        doc.force_enable(handle, self.locator.disabled_classes()).await?;
        sleep(self.timing.force_settle).await;
        Ok(Readiness::Forced(handle))
    }

    /// Activates the trigger several ways at once; no single one is seen by
    /// every front-end framework. Never fails: whether the page reacted is
    /// only visible through its indicators afterwards.
    pub async fn fire<D: Document + ?Sized>(&self, doc: &D, el: ElementHandle) -> Activation {
        let sequence = async {
            doc.scroll_into_view(el).await?;
            sleep(self.timing.scroll_settle).await;
            doc.focus(el).await?;
            sleep(self.timing.press_focus_settle).await;

            doc.dispatch(el, &SyntheticEvent::mouse(MouseKind::Down)).await?;
            sleep(self.timing.press_settle).await;
            doc.dispatch(el, &SyntheticEvent::mouse(MouseKind::Up)).await?;
            sleep(self.timing.press_settle).await;

            doc.activate(el).await?;
            doc.dispatch(el, &SyntheticEvent::mouse(MouseKind::Click)).await?;
            Ok::<(), DomError>(())
        };

        match sequence.await {
            Ok(()) => {
                debug!(context = doc.label(), handle = %el, "trigger fired");
                Activation::Sequence
            }
            Err(e) => {
                warn!(context = doc.label(), handle = %el, error = %e, "click sequence failed, dispatching plain click");
                if let Err(e) = doc.dispatch(el, &SyntheticEvent::PlainClick).await {
                    warn!(context = doc.label(), handle = %el, error = %e, "plain click failed too");
                }
                Activation::Fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprompt_core::mock::{MockCall, MockDocument, MockElement};
    use autoprompt_core::DisabledSignals;
    use std::time::Duration;

    fn page(button: MockElement) -> (MockDocument, ElementHandle) {
        let doc = MockDocument::new("top");
        doc.insert(MockElement::textarea().with_value("prompt"));
        let trigger = doc.insert(button);
        (doc, trigger)
    }

    #[tokio::test]
    async fn each_signal_blocks_on_its_own() {
        let locator = Locator::default();
        let timing = TimingConfig::fast();
        let control = TriggerControl::new(&locator, &timing);

        for signals in [
            DisabledSignals { property: true, ..Default::default() },
            DisabledSignals { attribute: true, ..Default::default() },
            DisabledSignals { class_marker: true, ..Default::default() },
            DisabledSignals { aria: true, ..Default::default() },
        ] {
            let (doc, trigger) = page(MockElement::button("Generate").with_disabled(signals));
            assert!(control.is_blocked(&doc, trigger).await.unwrap());
        }
    }

    #[tokio::test]
    async fn enabled_trigger_is_ready_immediately() {
        let locator = Locator::default();
        let timing = TimingConfig::fast();
        let (doc, trigger) = page(MockElement::button("Generate"));

        let readiness = TriggerControl::new(&locator, &timing).await_enabled(&doc, trigger).await.unwrap();
        assert_eq!(readiness, Readiness::Ready(trigger));
        assert_eq!(doc.count_calls(|c| matches!(c, MockCall::ForceEnable(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_enabling_within_the_window_is_not_forced() {
        let locator = Locator::default();
        let timing = TimingConfig::default();
        let (doc, trigger) = page(MockElement::button("Generate").disabled().enabled_after(4));

        let started = tokio::time::Instant::now();
        let readiness = TriggerControl::new(&locator, &timing).await_enabled(&doc, trigger).await.unwrap();

        assert_eq!(readiness, Readiness::Ready(trigger));
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_stuck_disabled_is_forced_after_the_window() {
        let locator = Locator::default();
        let timing = TimingConfig::default();
        let (doc, trigger) = page(MockElement::button("Generate").disabled());

        let started = tokio::time::Instant::now();
        let readiness = TriggerControl::new(&locator, &timing).await_enabled(&doc, trigger).await.unwrap();

        assert_eq!(readiness, Readiness::Forced(trigger));
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert_eq!(doc.disabled(trigger), Some(DisabledSignals::default()));
    }

    #[tokio::test]
    async fn vanished_trigger_is_a_structural_error() {
        let locator = Locator::default();
        let timing = TimingConfig::fast();
        let (doc, trigger) = page(MockElement::button("Generate").disabled());
        let control = TriggerControl::new(&locator, &timing);

        doc.update(trigger, |el| el.selectors.clear());
        let err = control.await_enabled(&doc, trigger).await.unwrap_err();
        assert_eq!(err, DriverError::TriggerDisappeared);
    }

    #[tokio::test]
    async fn fire_runs_the_full_activation_sequence() {
        let locator = Locator::default();
        let timing = TimingConfig::fast();
        let (doc, trigger) = page(MockElement::button("Generate"));

        let activation = TriggerControl::new(&locator, &timing).fire(&doc, trigger).await;

        assert_eq!(activation, Activation::Sequence);
        assert_eq!(
            doc.calls(),
            vec![
                MockCall::Scroll(trigger),
                MockCall::Focus(trigger),
                MockCall::Dispatch(trigger, SyntheticEvent::mouse(MouseKind::Down)),
                MockCall::Dispatch(trigger, SyntheticEvent::mouse(MouseKind::Up)),
                MockCall::Activate(trigger),
                MockCall::Dispatch(trigger, SyntheticEvent::mouse(MouseKind::Click)),
            ]
        );
        assert_eq!(doc.submissions(), vec!["prompt".to_string()]);
    }

    #[tokio::test]
    async fn stale_trigger_falls_back_without_failing() {
        let locator = Locator::default();
        let timing = TimingConfig::fast();
        let (doc, trigger) = page(MockElement::button("Generate"));
        doc.detach(trigger);

        let activation = TriggerControl::new(&locator, &timing).fire(&doc, trigger).await;

        assert_eq!(activation, Activation::Fallback);
        assert!(doc.submissions().is_empty());
    }
}
