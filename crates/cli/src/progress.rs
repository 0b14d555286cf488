use anyhow::Result;
use autoprompt_core::{Event, SessionSnapshot};
use autoprompt_storage::Storage;
use tracing::{error, info};

/// Where a relayed event leaves the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Running,
    Completed,
    Failed(String),
}

/// Follows driver events and keeps the saved session in step with them.
pub struct ProgressTracker<S: Storage> {
    storage: S,
    session: SessionSnapshot,
    /// The context that started submitting, once one did.
    handler: Option<String>,
}

impl<S: Storage> ProgressTracker<S> {
    pub fn new(storage: S, session: SessionSnapshot) -> Self {
        Self { storage, session, handler: None }
    }

    pub fn session(&self) -> &SessionSnapshot {
        &self.session
    }

    /// Why every context is idle although the run neither completed nor failed.
    pub fn stall_reason(&self) -> String {
        match &self.handler {
            Some(context) => format!(
                "context {} went away while on prompt {} of {}; rerun with --resume to continue",
                context,
                self.session.cursor + 1,
                self.session.prompts.len()
            ),
            None => "prompt input not found in any context of the page".to_string(),
        }
    }

    pub async fn save(&self) -> Result<()> {
        self.storage.save(&self.session).await
    }

    pub async fn observe(&mut self, context: &str, event: &Event) -> Result<Outcome> {
        let total = self.session.prompts.len();
        match event {
            Event::Status(message) => {
                info!(context, "{}", message);
                Ok(Outcome::Running)
            }
            Event::Progress(cursor) => {
                if self.handler.is_none() {
                    self.handler = Some(context.to_string());
                }
                self.session.cursor = *cursor;
                self.save().await?;
                info!(context, prompt = cursor + 1, total, "progress");
                Ok(Outcome::Running)
            }
            Event::Completed => {
                self.session.cursor = total;
                self.save().await?;
                info!(context, total, "all prompts submitted");
                Ok(Outcome::Completed)
            }
            Event::Error(message) => {
                error!(context, "{}", message);
                Ok(Outcome::Failed(message.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprompt_storage::JsonFileStorage;

    fn tracker(dir: &tempfile::TempDir) -> ProgressTracker<JsonFileStorage> {
        let session = SessionSnapshot {
            prompts: vec!["a".into(), "b".into(), "c".into()],
            delay_ms: 1000,
            cursor: 0,
        };
        ProgressTracker::new(JsonFileStorage::new(dir.path().join("session.json")), session)
    }

    #[tokio::test]
    async fn progress_is_saved_as_it_happens() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(&dir);

        assert_eq!(tracker.observe("top", &Event::Progress(1)).await.unwrap(), Outcome::Running);

        let saved = JsonFileStorage::new(dir.path().join("session.json")).load().await.unwrap().unwrap();
        assert_eq!(saved.cursor, 1);
        assert_eq!(saved.delay_ms, 1000);
    }

    #[tokio::test]
    async fn completion_saves_a_finished_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(&dir);

        assert_eq!(tracker.observe("top", &Event::Completed).await.unwrap(), Outcome::Completed);
        assert!(tracker.session().is_finished());

        let saved = JsonFileStorage::new(dir.path().join("session.json")).load().await.unwrap().unwrap();
        assert!(saved.is_finished());
    }

    #[tokio::test]
    async fn errors_end_the_run_without_moving_the_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(&dir);
        tracker.observe("top", &Event::Progress(2)).await.unwrap();

        let outcome = tracker.observe("top", &Event::Error("boom".into())).await.unwrap();
        assert_eq!(outcome, Outcome::Failed("boom".into()));
        assert_eq!(tracker.session().cursor, 2);
    }

    #[tokio::test]
    async fn status_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(&dir);

        tracker.observe("frame[0]", &Event::Status("Checking page elements...".into())).await.unwrap();
        assert_eq!(tracker.session().cursor, 0);
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn stall_reason_tells_a_missing_form_from_a_lost_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(&dir);
        assert_eq!(tracker.stall_reason(), "prompt input not found in any context of the page");

        tracker.observe("frame[1]", &Event::Progress(1)).await.unwrap();
        tracker.observe("top", &Event::Progress(1)).await.unwrap();
        assert_eq!(
            tracker.stall_reason(),
            "context frame[1] went away while on prompt 2 of 3; rerun with --resume to continue"
        );
    }
}
