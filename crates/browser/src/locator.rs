//! Element discovery by ordered selector heuristics.
//!
//! A strategy is a selector plus a predicate on the matched element's
//! snapshot. Strategies are tried from most specific to most general and the
//! first accepted element wins. A failing query counts as a miss: the page is
//! not ours and may be in any state.

use autoprompt_core::{Document, DomError, ElementReport, ElementSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Predicate applied to each element a strategy's selector matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    Any,
    /// Displayed and with a positive height.
    Visible,
    /// Not `display:none` nor `visibility:hidden`.
    Displayed,
    /// Text content contains one of `words`, ignoring case.
    TextContains { words: Vec<String> },
    /// Text of the first `span` equals one of `words`, ignoring case.
    SpanTextEquals {
        words: Vec<String>,
        #[serde(default)]
        displayed: bool,
    },
}

impl Rule {
    pub fn accepts(&self, el: &ElementSnapshot) -> bool {
        match self {
            Rule::Any => true,
            Rule::Visible => el.is_visible(),
            Rule::Displayed => el.is_displayed(),
            Rule::TextContains { words } => {
                let text = el.text.to_lowercase();
                words.iter().any(|w| text.contains(&w.to_lowercase()))
            }
            Rule::SpanTextEquals { words, displayed } => {
                let Some(span) = el.span_text.as_deref() else {
                    return false;
                };
                let span = span.trim().to_lowercase();
                words.iter().any(|w| span == w.to_lowercase()) && (!displayed || el.is_displayed())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Document,
    /// One level into the open shadow roots of the document.
    Shadow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub selector: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(flatten)]
    pub rule: Rule,
}

impl Strategy {
    pub fn new(selector: &str, rule: Rule) -> Self {
        Self { selector: selector.to_string(), scope: Scope::Document, rule }
    }

    pub fn in_shadow(mut self) -> Self {
        self.scope = Scope::Shadow;
        self
    }

    async fn candidates<D: Document + ?Sized>(&self, doc: &D) -> Result<Vec<ElementSnapshot>, DomError> {
        match self.scope {
            Scope::Document => doc.query_all(&self.selector).await,
            Scope::Shadow => doc.query_shadow(&self.selector).await,
        }
    }
}

/// Selector heuristics for one kind of page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub input: Vec<Strategy>,
    pub trigger: Vec<Strategy>,
    /// Signs that the page started working on a submission. Diagnostic only.
    pub indicators: Vec<Strategy>,
    /// Classes that mark a control as disabled.
    pub disabled_classes: Vec<String>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let input = [
            r#"textarea[placeholder="Type your prompt here to start..."]"#,
            "textarea.scrollable-content",
            "textarea.w-full.bg-transparent",
            r#"textarea[placeholder*="prompt"]"#,
            r#"textarea[placeholder*="describe"]"#,
            "textarea",
        ]
        .into_iter()
        .map(|selector| Strategy::new(selector, Rule::Visible))
        .chain([Strategy::new("textarea", Rule::Any).in_shadow()])
        .collect();

        let indicators = [
            Strategy::new("button", Rule::TextContains { words: vec!["stop".into()] }),
            Strategy::new("button", Rule::TextContains { words: vec!["cancel".into()] }),
            Strategy::new(r#"[class*="generating"]"#, Rule::Any),
            Strategy::new(r#"[class*="loading"]"#, Rule::Any),
            Strategy::new(".progress", Rule::Any),
            Strategy::new(r#"[aria-label*="generating"]"#, Rule::Any),
            Strategy::new(r#"[aria-label*="loading"]"#, Rule::Any),
        ]
        .into();

        Self {
            input,
            trigger: trigger_strategies(&["generate".to_string()]),
            indicators,
            disabled_classes: vec!["disabled".into(), "Mui-disabled".into()],
        }
    }
}

impl LocatorConfig {
    /// Default heuristics, looking for a trigger labelled with one of `verbs`.
    pub fn with_trigger_verbs(mut self, verbs: &[String]) -> Self {
        self.trigger = trigger_strategies(verbs);
        self
    }
}

fn trigger_strategies(verbs: &[String]) -> Vec<Strategy> {
    let words = verbs.to_vec();
    vec![
        Strategy::new(r#"button[id^="submit-btn"]"#, Rule::TextContains { words: words.clone() }),
        Strategy::new(
            "button.MuiButtonBase-root",
            Rule::SpanTextEquals { words: words.clone(), displayed: false },
        ),
        Strategy::new("button", Rule::SpanTextEquals { words: words.clone(), displayed: true }),
        Strategy::new("button", Rule::TextContains { words }).in_shadow(),
    ]
}

/// Runs `strategies` in order and returns the first accepted element.
pub async fn resolve<D: Document + ?Sized>(strategies: &[Strategy], doc: &D) -> Option<ElementSnapshot> {
    for strategy in strategies {
        let candidates = match strategy.candidates(doc).await {
            Ok(found) => found,
            Err(e) => {
                debug!(context = doc.label(), selector = %strategy.selector, error = %e, "strategy query failed");
                continue;
            }
        };
        trace!(context = doc.label(), selector = %strategy.selector, count = candidates.len(), "strategy candidates");
        if let Some(el) = candidates.into_iter().find(|el| strategy.rule.accepts(el)) {
            debug!(
                context = doc.label(),
                selector = %strategy.selector,
                scope = ?strategy.scope,
                handle = %el.handle,
                "strategy matched"
            );
            return Some(el);
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct Locator {
    config: LocatorConfig,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn disabled_classes(&self) -> &[String] {
        &self.config.disabled_classes
    }

    pub async fn find_input<D: Document + ?Sized>(&self, doc: &D) -> Option<ElementSnapshot> {
        resolve(&self.config.input, doc).await
    }

    pub async fn find_trigger<D: Document + ?Sized>(&self, doc: &D) -> Option<ElementSnapshot> {
        resolve(&self.config.trigger, doc).await
    }

    /// Selector of the first progress indicator present on the page, if any.
    pub async fn generation_indicator<D: Document + ?Sized>(&self, doc: &D) -> Option<String> {
        for strategy in &self.config.indicators {
            if resolve(std::slice::from_ref(strategy), doc).await.is_some() {
                return Some(strategy.selector.clone());
            }
        }
        None
    }

    /// Number of `textarea` and `button` elements in the document.
    pub async fn candidate_counts<D: Document + ?Sized>(&self, doc: &D) -> Result<(usize, usize), DomError> {
        let textareas = doc.query_all("textarea").await?.len();
        let buttons = doc.query_all("button").await?.len();
        Ok((textareas, buttons))
    }

    pub async fn describe<D: Document + ?Sized>(&self, doc: &D) -> Result<ElementReport, DomError> {
        let textareas = doc.query_all("textarea").await?;
        let buttons = doc.query_all("button").await?;
        let found_input = self.find_input(doc).await.map(|el| el.handle);
        let found_trigger = self.find_trigger(doc).await.map(|el| el.handle);
        Ok(ElementReport {
            context: doc.label().to_string(),
            textareas,
            buttons,
            found_input,
            found_trigger,
        })
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}
