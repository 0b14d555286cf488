//! In-memory [`Document`] for exercising the locator, injector and driver
//! without a browser.
//!
//! Elements do not go through a CSS engine: each one lists the selectors it
//! answers to. Inputs can be configured to mimic a framework-controlled field
//! that ignores some of the ways text can be written into it.

use crate::{
    DisabledSignals, DomError, Document, ElementHandle, ElementSnapshot, SyntheticEvent,
};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// How a mock input reacts to the different ways of writing text into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBehavior {
    /// Editing commands and the direct setter all change the value.
    Native,
    /// Editing commands are ignored; a direct-setter write only sticks once an
    /// input notification follows it.
    SetterOnly,
    /// Nothing changes the value.
    Rejecting,
}

#[derive(Debug, Clone)]
pub struct MockElement {
    pub snapshot: ElementSnapshot,
    pub selectors: Vec<String>,
    pub in_shadow: bool,
    pub behavior: InputBehavior,
    pub value: String,
    pub disabled: DisabledSignals,
    /// Reports enabled after this many readiness checks.
    pub enables_after_checks: Option<usize>,
    pending: Option<String>,
    attached: bool,
}

impl MockElement {
    fn new(tag: &str) -> Self {
        Self {
            snapshot: ElementSnapshot {
                handle: ElementHandle(0),
                tag: tag.to_string(),
                id: String::new(),
                classes: Vec::new(),
                text: String::new(),
                span_text: None,
                placeholder: None,
                display: "block".to_string(),
                visibility: "visible".to_string(),
                height: 40.0,
            },
            selectors: vec![tag.to_string()],
            in_shadow: false,
            behavior: InputBehavior::Native,
            value: String::new(),
            disabled: DisabledSignals::default(),
            enables_after_checks: None,
            pending: None,
            attached: true,
        }
    }

    /// The prompt field of the target application.
    pub fn textarea() -> Self {
        let mut el = Self::new("textarea");
        el.snapshot.placeholder = Some("Type your prompt here to start...".to_string());
        el.snapshot.classes = vec!["scrollable-content".to_string()];
        el.selectors.push(r#"textarea[placeholder="Type your prompt here to start..."]"#.to_string());
        el.selectors.push("textarea.scrollable-content".to_string());
        el
    }

    /// A submit button labelled `label`, shaped like the target application's.
    pub fn button(label: &str) -> Self {
        let mut el = Self::new("button");
        el.snapshot.id = "submit-btn-5dt".to_string();
        el.snapshot.classes = vec!["MuiButtonBase-root".to_string()];
        el.snapshot.text = label.to_string();
        el.snapshot.span_text = Some(label.to_string());
        el.selectors.push(r#"button[id^="submit-btn"]"#.to_string());
        el.selectors.push("button.MuiButtonBase-root".to_string());
        el
    }

    /// A plain element with no selector beyond its tag.
    pub fn plain(tag: &str) -> Self {
        Self::new(tag)
    }

    pub fn matching(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn only_matching(mut self, selectors: &[&str]) -> Self {
        self.selectors = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.snapshot.text = text.to_string();
        self
    }

    pub fn with_span_text(mut self, text: Option<&str>) -> Self {
        self.snapshot.span_text = text.map(str::to_string);
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.snapshot.display = "none".to_string();
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.snapshot.height = 0.0;
        self
    }

    pub fn in_shadow(mut self) -> Self {
        self.in_shadow = true;
        self
    }

    pub fn with_behavior(mut self, behavior: InputBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Disabled through every signal at once.
    pub fn disabled(mut self) -> Self {
        self.disabled = DisabledSignals { property: true, attribute: true, class_marker: true, aria: true };
        self
    }

    pub fn with_disabled(mut self, signals: DisabledSignals) -> Self {
        self.disabled = signals;
        self
    }

    pub fn enabled_after(mut self, checks: usize) -> Self {
        self.enables_after_checks = Some(checks);
        self
    }
}

/// Every operation the mock saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Query(String),
    QueryShadow(String),
    Focus(ElementHandle),
    Activate(ElementHandle),
    Scroll(ElementHandle),
    Clear(ElementHandle),
    InsertText(ElementHandle, String),
    SetValue(ElementHandle, String),
    Dispatch(ElementHandle, SyntheticEvent),
    Signals(ElementHandle),
    ForceEnable(ElementHandle),
}

#[derive(Debug, Default)]
struct MockState {
    elements: Vec<MockElement>,
    loaded: bool,
    unavailable: bool,
    calls: Vec<MockCall>,
    submissions: Vec<String>,
}

impl MockState {
    fn element(&mut self, el: ElementHandle) -> Result<&mut MockElement, DomError> {
        let index = (el.0 as usize).checked_sub(1).ok_or(DomError::StaleElement(el))?;
        match self.elements.get_mut(index) {
            Some(found) if found.attached => Ok(found),
            _ => Err(DomError::StaleElement(el)),
        }
    }

    fn check_available(&self) -> Result<(), DomError> {
        if self.unavailable {
            return Err(DomError::ContextUnavailable("mock context detached".to_string()));
        }
        Ok(())
    }

    fn snapshots(&self, selector: &str, shadow: bool) -> Vec<ElementSnapshot> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.attached && el.in_shadow == shadow)
            .filter(|(_, el)| el.selectors.iter().any(|s| s == selector))
            .map(|(index, el)| {
                let mut snapshot = el.snapshot.clone();
                snapshot.handle = ElementHandle(index as u64 + 1);
                snapshot
            })
            .collect()
    }

    fn first_input_value(&self) -> String {
        self.elements
            .iter()
            .find(|el| el.attached && el.snapshot.tag == "textarea")
            .map(|el| el.value.clone())
            .unwrap_or_default()
    }
}

pub struct MockDocument {
    label: String,
    state: Mutex<MockState>,
}

impl MockDocument {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(MockState { loaded: true, ..Default::default() }),
        }
    }

    /// A loaded page with a native textarea and an enabled "Generate" button.
    pub fn ready() -> Self {
        let doc = Self::new("top");
        doc.insert(MockElement::textarea());
        doc.insert(MockElement::button("Generate"));
        doc
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, element: MockElement) -> ElementHandle {
        let mut state = self.lock();
        state.elements.push(element);
        ElementHandle(state.elements.len() as u64)
    }

    pub fn detach(&self, el: ElementHandle) {
        if let Ok(found) = self.lock().element(el) {
            found.attached = false;
        }
    }

    pub fn update(&self, el: ElementHandle, f: impl FnOnce(&mut MockElement)) {
        if let Ok(found) = self.lock().element(el) {
            f(found);
        }
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.lock().loaded = loaded;
    }

    /// Make every operation fail as if the frame had been torn down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn value(&self, el: ElementHandle) -> Option<String> {
        self.lock().element(el).ok().map(|found| found.value.clone())
    }

    pub fn disabled(&self, el: ElementHandle) -> Option<DisabledSignals> {
        self.lock().element(el).ok().map(|found| found.disabled)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Input value at each accepted activation of an enabled button.
    pub fn submissions(&self) -> Vec<String> {
        self.lock().submissions.clone()
    }
}

#[async_trait]
impl Document for MockDocument {
    fn label(&self) -> &str {
        &self.label
    }

    async fn is_loaded(&self) -> Result<bool, DomError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.loaded)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        let mut state = self.lock();
        state.check_available()?;
        state.calls.push(MockCall::Query(selector.to_string()));
        Ok(state.snapshots(selector, false))
    }

    async fn query_shadow(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        let mut state = self.lock();
        state.check_available()?;
        state.calls.push(MockCall::QueryShadow(selector.to_string()));
        Ok(state.snapshots(selector, true))
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError> {
        let mut state = self.lock();
        state.element(el)?;
        state.calls.push(MockCall::Focus(el));
        Ok(())
    }

    async fn activate(&self, el: ElementHandle) -> Result<(), DomError> {
        let mut state = self.lock();
        let (is_button, blocked) = {
            let found = state.element(el)?;
            (found.snapshot.tag == "button", found.disabled.is_blocked())
        };
        state.calls.push(MockCall::Activate(el));
        if is_button && !blocked {
            let submitted = state.first_input_value();
            state.submissions.push(submitted);
        }
        Ok(())
    }

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DomError> {
        let mut state = self.lock();
        state.element(el)?;
        state.calls.push(MockCall::Scroll(el));
        Ok(())
    }

    async fn clear_contents(&self, el: ElementHandle) -> Result<(), DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        if found.behavior == InputBehavior::Native {
            found.value.clear();
        }
        state.calls.push(MockCall::Clear(el));
        Ok(())
    }

    async fn insert_text(&self, el: ElementHandle, text: &str) -> Result<bool, DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        let accepted = found.behavior == InputBehavior::Native;
        if accepted {
            found.value.push_str(text);
        }
        state.calls.push(MockCall::InsertText(el, text.to_string()));
        Ok(accepted)
    }

    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        match found.behavior {
            InputBehavior::Native => found.value = value.to_string(),
            InputBehavior::SetterOnly => found.pending = Some(value.to_string()),
            InputBehavior::Rejecting => {}
        }
        state.calls.push(MockCall::SetValue(el, value.to_string()));
        Ok(())
    }

    async fn read_value(&self, el: ElementHandle) -> Result<String, DomError> {
        let mut state = self.lock();
        Ok(state.element(el)?.value.clone())
    }

    async fn dispatch(&self, el: ElementHandle, event: &SyntheticEvent) -> Result<bool, DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        if matches!(event, SyntheticEvent::Input { .. }) {
            if let Some(pending) = found.pending.take() {
                found.value = pending;
            }
        }
        state.calls.push(MockCall::Dispatch(el, event.clone()));
        Ok(true)
    }

    async fn disabled_signals(
        &self,
        el: ElementHandle,
        _disabled_classes: &[String],
    ) -> Result<DisabledSignals, DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        if let Some(remaining) = found.enables_after_checks {
            if remaining == 0 {
                found.disabled = DisabledSignals::default();
                found.enables_after_checks = None;
            } else {
                found.enables_after_checks = Some(remaining - 1);
            }
        }
        let signals = found.disabled;
        state.calls.push(MockCall::Signals(el));
        Ok(signals)
    }

    async fn force_enable(&self, el: ElementHandle, _disabled_classes: &[String]) -> Result<(), DomError> {
        let mut state = self.lock();
        let found = state.element(el)?;
        found.disabled = DisabledSignals::default();
        found.enables_after_checks = None;
        state.calls.push(MockCall::ForceEnable(el));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputType;

    #[tokio::test]
    async fn setter_only_input_commits_on_input_notification() {
        let doc = MockDocument::new("top");
        let input = doc.insert(MockElement::textarea().with_behavior(InputBehavior::SetterOnly));

        assert!(!doc.insert_text(input, "x").await.unwrap());
        doc.set_value(input, "hello").await.unwrap();
        assert_eq!(doc.read_value(input).await.unwrap(), "");

        doc.dispatch(input, &SyntheticEvent::input(InputType::InsertText, "hello"))
            .await
            .unwrap();
        assert_eq!(doc.read_value(input).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn detached_elements_are_stale() {
        let doc = MockDocument::ready();
        let input = ElementHandle(1);
        doc.detach(input);
        assert_eq!(doc.read_value(input).await, Err(DomError::StaleElement(input)));
        assert!(doc.query_all("textarea").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_button_ignores_activation() {
        let doc = MockDocument::new("top");
        doc.insert(MockElement::textarea().with_value("queued"));
        let button = doc.insert(MockElement::button("Generate").disabled());

        doc.activate(button).await.unwrap();
        assert!(doc.submissions().is_empty());

        doc.force_enable(button, &[]).await.unwrap();
        doc.activate(button).await.unwrap();
        assert_eq!(doc.submissions(), vec!["queued".to_string()]);
    }
}
