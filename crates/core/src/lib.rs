use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Opaque reference to an element inside one execution context.
///
/// Handles are only valid until the host page re-renders; every operation
/// taking a handle may fail with [`DomError::StaleElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u64);

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of an element, as seen by the locator heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub handle: ElementHandle,
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Trimmed `textContent`.
    #[serde(default)]
    pub text: String,
    /// Trimmed text of the first `span` descendant, if any.
    #[serde(default)]
    pub span_text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Computed `display`.
    #[serde(default)]
    pub display: String,
    /// Computed `visibility`.
    #[serde(default)]
    pub visibility: String,
    /// Rendered height in CSS pixels.
    #[serde(default)]
    pub height: f64,
}

impl ElementSnapshot {
    /// Not `display:none` and not `visibility:hidden`.
    pub fn is_displayed(&self) -> bool {
        self.display != "none" && self.visibility != "hidden"
    }

    /// Displayed and with a positive rendered height.
    pub fn is_visible(&self) -> bool {
        self.is_displayed() && self.height > 0.0
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "insertText")]
    InsertText,
    #[serde(rename = "deleteContentBackward")]
    DeleteContentBackward,
    #[serde(rename = "insertFromPaste")]
    InsertFromPaste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPhase {
    #[serde(rename = "keydown")]
    Down,
    #[serde(rename = "keypress")]
    Press,
    #[serde(rename = "keyup")]
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseKind {
    #[serde(rename = "mousedown")]
    Down,
    #[serde(rename = "mouseup")]
    Up,
    #[serde(rename = "click")]
    Click,
}

/// A notification dispatched on an element as if the user had produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyntheticEvent {
    Input {
        input_type: InputType,
        data: Option<String>,
    },
    Change,
    /// Clipboard paste carrying `text` as `text/plain`.
    Paste {
        text: String,
    },
    Key {
        phase: KeyPhase,
        key: String,
    },
    Mouse {
        kind: MouseKind,
    },
    /// Generic `click` event, without any mouse details.
    PlainClick,
}

impl SyntheticEvent {
    pub fn input(input_type: InputType, data: impl Into<String>) -> Self {
        Self::Input { input_type, data: Some(data.into()) }
    }

    pub fn input_cleared() -> Self {
        Self::Input { input_type: InputType::DeleteContentBackward, data: None }
    }

    pub fn key(phase: KeyPhase, key: impl Into<String>) -> Self {
        Self::Key { phase, key: key.into() }
    }

    pub fn mouse(kind: MouseKind) -> Self {
        Self::Mouse { kind }
    }
}

/// The redundant ways a page marks a control as disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledSignals {
    /// `el.disabled`
    pub property: bool,
    /// `disabled` attribute present
    pub attribute: bool,
    /// one of the configured disabled classes present
    #[serde(rename = "class")]
    pub class_marker: bool,
    /// `aria-disabled="true"`
    pub aria: bool,
}

impl DisabledSignals {
    pub fn is_blocked(&self) -> bool {
        self.property || self.attribute || self.class_marker || self.aria
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("element {0} is no longer attached to the document")]
    StaleElement(ElementHandle),
    #[error("script failed: {0}")]
    Script(String),
    #[error("execution context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("unexpected reply from page: {0}")]
    Decode(String),
}

/// One execution context: a document (top level or an embedded frame) whose
/// elements can be queried and driven.
#[async_trait]
pub trait Document: Send + Sync {
    /// Human-readable name of the context, e.g. `top` or `frame[0/1]`.
    fn label(&self) -> &str;

    async fn is_loaded(&self) -> Result<bool, DomError>;

    /// Snapshots of every element matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError>;

    /// Matches of `selector` inside the open shadow roots of any element of
    /// the document, one level deep.
    async fn query_shadow(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError>;

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError>;

    /// Native activation (`el.click()`).
    async fn activate(&self, el: ElementHandle) -> Result<(), DomError>;

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DomError>;

    /// Select everything in the element and delete it with editing commands.
    async fn clear_contents(&self, el: ElementHandle) -> Result<(), DomError>;

    /// Run the `insertText` editing command; returns what the command reported.
    async fn insert_text(&self, el: ElementHandle, text: &str) -> Result<bool, DomError>;

    /// Write `value` through the platform setter, bypassing any property
    /// interception installed by a front-end framework.
    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError>;

    async fn read_value(&self, el: ElementHandle) -> Result<String, DomError>;

    /// Returns whether the event was not cancelled.
    async fn dispatch(&self, el: ElementHandle, event: &SyntheticEvent) -> Result<bool, DomError>;

    async fn disabled_signals(
        &self,
        el: ElementHandle,
        disabled_classes: &[String],
    ) -> Result<DisabledSignals, DomError>;

    /// Clear every disabled signal on the element.
    async fn force_enable(&self, el: ElementHandle, disabled_classes: &[String]) -> Result<(), DomError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
    Completed,
    Failed(String),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub prompts: Vec<String>,
    /// `None` resumes from the driver's own cursor.
    pub start_index: Option<usize>,
    /// `None` uses the driver's configured default delay.
    pub delay: Option<Duration>,
}

impl StartRequest {
    pub fn new(prompts: Vec<String>) -> Self {
        Self { prompts, start_index: Some(0), delay: None }
    }

    pub fn starting_at(mut self, index: usize) -> Self {
        self.start_index = Some(index);
        self
    }

    pub fn resuming(mut self) -> Self {
        self.start_index = None;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Commands accepted by a driver.
#[derive(Debug)]
pub enum Command {
    Start {
        request: StartRequest,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    StatusProbe {
        reply: oneshot::Sender<ProbeReport>,
    },
    Describe {
        reply: oneshot::Sender<Result<ElementReport, DriverError>>,
    },
}

/// Events emitted by a driver. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Status(String),
    Progress(usize),
    Completed,
    Error(String),
}

/// Reply to a status probe: the driver is reachable, plus what it can see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub context: String,
    pub state: RunState,
    pub cursor: usize,
    pub textareas: usize,
    pub buttons: usize,
}

/// Diagnostic dump of the candidate elements of a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementReport {
    pub context: String,
    pub textareas: Vec<ElementSnapshot>,
    pub buttons: Vec<ElementSnapshot>,
    pub found_input: Option<ElementHandle>,
    pub found_trigger: Option<ElementHandle>,
}

/// What is worth persisting between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub prompts: Vec<String>,
    pub delay_ms: u64,
    pub cursor: usize,
}

impl SessionSnapshot {
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.prompts.len()
    }
}

/// Error categories, used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Start refused; nothing changes.
    Setup,
    /// The page no longer matches; the run is aborted.
    Structural,
    /// Text could not be set; never fatal on its own.
    Injection,
    /// The execution context went away; logged and swallowed.
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("automation is already running")]
    AlreadyRunning,
    #[error("no prompts provided")]
    EmptyPromptList,
    #[error("start index {index} is past the end of a {len}-prompt list")]
    StartIndexOutOfRange { index: usize, len: usize },
    #[error("could not find the trigger control; make sure the page is fully loaded")]
    TriggerNotFound,
    #[error("page elements not found; the page may have changed")]
    ElementsNotFound,
    #[error("trigger control disappeared; the page may have changed")]
    TriggerDisappeared,
    #[error("text could not be set on the input")]
    InjectionFailed,
    #[error("Error processing prompt {position}: {source}")]
    Cycle {
        /// 1-based position of the failing prompt.
        position: usize,
        source: Box<DriverError>,
    },
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("driver is no longer running")]
    Disconnected,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::AlreadyRunning
            | DriverError::EmptyPromptList
            | DriverError::StartIndexOutOfRange { .. }
            | DriverError::TriggerNotFound => ErrorKind::Setup,
            DriverError::ElementsNotFound | DriverError::TriggerDisappeared => ErrorKind::Structural,
            DriverError::InjectionFailed => ErrorKind::Injection,
            DriverError::Cycle { source, .. } => match source.kind() {
                ErrorKind::Environment => ErrorKind::Environment,
                _ => ErrorKind::Structural,
            },
            DriverError::Dom(DomError::ContextUnavailable(_)) | DriverError::Disconnected => {
                ErrorKind::Environment
            }
            DriverError::Dom(_) => ErrorKind::Structural,
        }
    }

    pub fn in_cycle(self, cursor: usize) -> Self {
        DriverError::Cycle { position: cursor + 1, source: Box::new(self) }
    }
}
