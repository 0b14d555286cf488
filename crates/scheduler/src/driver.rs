use autoprompt_browser::Locator;
use autoprompt_core::{
    Command, Document, DriverError, ElementReport, Event, ProbeReport, RunState, StartRequest,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::run::Run;

/// Run state shared between a driver and its run task.
#[derive(Debug)]
pub(crate) struct RunShared {
    pub state: RunState,
    pub cursor: usize,
    /// Bumped on every accepted start so a superseded run task can tell it
    /// no longer owns the state.
    pub generation: u64,
    pub cancel: CancellationToken,
}

impl Default for RunShared {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            cursor: 0,
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }
}

/// Drives one execution context. Owns the run state; commands arrive through
/// a [`DriverHandle`], events leave on the channel given to [`Driver::spawn`].
pub struct Driver<D: Document + ?Sized + 'static> {
    doc: Arc<D>,
    config: Arc<DriverConfig>,
    locator: Arc<Locator>,
    events: mpsc::Sender<Event>,
    shared: Arc<Mutex<RunShared>>,
}

impl<D: Document + ?Sized + 'static> Driver<D> {
    pub fn new(doc: Arc<D>, config: DriverConfig, events: mpsc::Sender<Event>) -> Self {
        let locator = Arc::new(Locator::new(config.locator.clone()));
        Self {
            doc,
            config: Arc::new(config),
            locator,
            events,
            shared: Arc::new(Mutex::new(RunShared::default())),
        }
    }

    /// Starts the driver task and returns the handle commanding it.
    pub fn spawn(doc: Arc<D>, config: DriverConfig, events: mpsc::Sender<Event>) -> DriverHandle {
        let capacity = config.command_capacity.max(1);
        let driver = Self::new(doc, config, events);
        let (tx, rx) = mpsc::channel(capacity);
        let handle = DriverHandle {
            context: driver.doc.label().to_string(),
            commands: tx,
        };
        tokio::spawn(driver.serve(rx));
        handle
    }

    async fn serve(self, mut commands: mpsc::Receiver<Command>) {
        debug!(context = self.doc.label(), "driver ready");
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start { request, reply } => {
                    let _ = reply.send(self.start(request).await);
                }
                Command::Stop { reply } => {
                    self.stop().await;
                    let _ = reply.send(());
                }
                Command::StatusProbe { reply } => {
                    let _ = reply.send(self.probe().await);
                }
                Command::Describe { reply } => {
                    let report = self.locator.describe(&*self.doc).await.map_err(DriverError::from);
                    let _ = reply.send(report);
                }
            }
        }

        // Every handle is gone; nobody can stop the run any more.
        self.shared.lock().await.cancel.cancel();
        debug!(context = self.doc.label(), "driver shut down");
    }

    async fn start(&self, request: StartRequest) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().await;
        if shared.state.is_running() {
            warn!(context = self.doc.label(), "start rejected: already running");
            return Err(DriverError::AlreadyRunning);
        }
        if request.prompts.is_empty() {
            return Err(DriverError::EmptyPromptList);
        }

        let len = request.prompts.len();
        let cursor = request.start_index.unwrap_or(shared.cursor);
        if cursor > len {
            return Err(DriverError::StartIndexOutOfRange { index: cursor, len });
        }

        let delay = request.delay.unwrap_or(self.config.default_delay);
        shared.state = RunState::Running;
        shared.cursor = cursor;
        shared.generation += 1;
        shared.cancel = CancellationToken::new();

        info!(
            context = self.doc.label(),
            prompts = len,
            cursor,
            delay_ms = delay.as_millis() as u64,
            "automation started"
        );

        let run = Run {
            doc: Arc::clone(&self.doc),
            config: Arc::clone(&self.config),
            locator: Arc::clone(&self.locator),
            events: self.events.clone(),
            shared: Arc::clone(&self.shared),
            prompts: Arc::new(request.prompts),
            delay,
            generation: shared.generation,
            cancel: shared.cancel.clone(),
        };
        tokio::spawn(run.execute());
        Ok(())
    }

    async fn stop(&self) {
        {
            let mut shared = self.shared.lock().await;
            shared.cancel.cancel();
            if shared.state.is_running() {
                shared.state = RunState::Stopped;
            }
            info!(context = self.doc.label(), cursor = shared.cursor, "automation stopped");
        }
        let _ = self.events.send(Event::Status("Automation stopped".to_string())).await;
    }

    async fn probe(&self) -> ProbeReport {
        let (textareas, buttons) = self
            .locator
            .candidate_counts(&*self.doc)
            .await
            .unwrap_or_else(|e| {
                debug!(context = self.doc.label(), error = %e, "probe could not count candidates");
                (0, 0)
            });
        let shared = self.shared.lock().await;
        ProbeReport {
            context: self.doc.label().to_string(),
            state: shared.state.clone(),
            cursor: shared.cursor,
            textareas,
            buttons,
        }
    }
}

/// Cheap, cloneable front of a running [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    context: String,
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    pub fn context(&self) -> &str {
        &self.context
    }

    async fn request<T>(&self, command: Command, reply: oneshot::Receiver<T>) -> Result<T, DriverError> {
        self.commands.send(command).await.map_err(|_| DriverError::Disconnected)?;
        reply.await.map_err(|_| DriverError::Disconnected)
    }

    /// Rejected while a run is in progress, for an empty list, or for a start
    /// index past the end of the list.
    pub async fn start(&self, request: StartRequest) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Start { request, reply }, rx).await?
    }

    /// Halts the run at the next cycle boundary. An in-flight cycle finishes
    /// its page operations; the inter-item delay is cut short.
    pub async fn stop(&self) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Stop { reply }, rx).await
    }

    pub async fn probe(&self) -> Result<ProbeReport, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::StatusProbe { reply }, rx).await
    }

    pub async fn describe(&self) -> Result<ElementReport, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Describe { reply }, rx).await?
    }
}
