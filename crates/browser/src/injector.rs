//! Forcing text into an input owned by someone else's front-end framework.
//!
//! No single write is observed by every framework, so the strategies below
//! run in order until the element reads back the desired value. The result is
//! never assumed: each step is confirmed by reading the value again.

use crate::shared::TimingConfig;
use autoprompt_core::{Document, DomError, ElementHandle, InputType, KeyPhase, SyntheticEvent};
use std::fmt;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStrategy {
    /// Select all, delete, then the `insertText` editing command.
    EditCommand,
    /// Platform setter followed by input and change notifications.
    DirectSetter,
    /// Synthetic clipboard paste, with a setter fallback.
    Paste,
    /// One synthetic keystroke per character.
    Keystrokes,
}

impl InjectionStrategy {
    pub const ALL: [InjectionStrategy; 4] = [
        InjectionStrategy::EditCommand,
        InjectionStrategy::DirectSetter,
        InjectionStrategy::Paste,
        InjectionStrategy::Keystrokes,
    ];
}

impl fmt::Display for InjectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InjectionStrategy::EditCommand => "edit command",
            InjectionStrategy::DirectSetter => "direct setter",
            InjectionStrategy::Paste => "paste",
            InjectionStrategy::Keystrokes => "keystrokes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// The strategy after which the value matched, if any did.
    pub strategy: Option<InjectionStrategy>,
    /// The element's value once injection stopped.
    pub value: String,
}

impl Injection {
    pub fn succeeded(&self) -> bool {
        self.strategy.is_some()
    }
}

pub struct ValueInjector<'a> {
    timing: &'a TimingConfig,
}

impl<'a> ValueInjector<'a> {
    pub fn new(timing: &'a TimingConfig) -> Self {
        Self { timing }
    }

    pub async fn inject<D: Document + ?Sized>(
        &self,
        doc: &D,
        el: ElementHandle,
        text: &str,
    ) -> Result<Injection, DomError> {
        doc.focus(el).await?;
        doc.activate(el).await?;
        sleep(self.timing.focus_settle).await;

        let mut value = String::new();
        for strategy in InjectionStrategy::ALL {
            let (matched, current) = self.attempt(strategy, doc, el, text).await?;
            value = current;
            if matched {
                debug!(context = doc.label(), %strategy, chars = text.chars().count(), "value set");
                return Ok(Injection { strategy: Some(strategy), value });
            }
            debug!(context = doc.label(), %strategy, "value did not stick");
        }

        warn!(
            context = doc.label(),
            expected = text.chars().count(),
            actual = value.chars().count(),
            "every injection strategy failed"
        );
        Ok(Injection { strategy: None, value })
    }

    async fn attempt<D: Document + ?Sized>(
        &self,
        strategy: InjectionStrategy,
        doc: &D,
        el: ElementHandle,
        text: &str,
    ) -> Result<(bool, String), DomError> {
        let value = match strategy {
            InjectionStrategy::EditCommand => {
                doc.clear_contents(el).await?;
                sleep(self.timing.edit_settle).await;
                let inserted = doc.insert_text(el, text).await?;
                let value = doc.read_value(el).await?;
                // Only trusted when the command itself reported success.
                return Ok((inserted && value == text, value));
            }
            InjectionStrategy::DirectSetter => {
                doc.set_value(el, "").await?;
                doc.dispatch(el, &SyntheticEvent::input_cleared()).await?;
                sleep(self.timing.edit_settle).await;

                doc.set_value(el, text).await?;
                doc.dispatch(el, &SyntheticEvent::input(InputType::InsertText, text)).await?;
                doc.dispatch(el, &SyntheticEvent::Change).await?;
                sleep(self.timing.edit_settle).await;
                doc.read_value(el).await?
            }
            InjectionStrategy::Paste => {
                doc.focus(el).await?;
                doc.clear_contents(el).await?;
                sleep(self.timing.edit_settle).await;

                doc.dispatch(el, &SyntheticEvent::Paste { text: text.to_string() }).await?;
                if doc.read_value(el).await? != text {
                    doc.set_value(el, text).await?;
                    doc.dispatch(el, &SyntheticEvent::input(InputType::InsertFromPaste, text))
                        .await?;
                }
                sleep(self.timing.edit_settle).await;
                doc.read_value(el).await?
            }
            InjectionStrategy::Keystrokes => {
                doc.set_value(el, "").await?;
                doc.dispatch(el, &SyntheticEvent::input_cleared()).await?;
                sleep(self.timing.keystroke_settle).await;

                for ch in text.chars() {
                    let key = ch.to_string();
                    let key = key.as_str();
                    doc.dispatch(el, &SyntheticEvent::key(KeyPhase::Down, key)).await?;
                    doc.dispatch(el, &SyntheticEvent::key(KeyPhase::Press, key)).await?;

                    let mut current = doc.read_value(el).await?;
                    current.push(ch);
                    doc.set_value(el, &current).await?;
                    doc.dispatch(el, &SyntheticEvent::input(InputType::InsertText, key)).await?;

                    doc.dispatch(el, &SyntheticEvent::key(KeyPhase::Up, key)).await?;
                }
                doc.read_value(el).await?
            }
        };
        Ok((value == text, value))
    }
}
