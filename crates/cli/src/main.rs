mod progress;

use anyhow::{Context, bail};
use autoprompt_browser::{ChromiumSession, LaunchOptions};
use autoprompt_core::{SessionSnapshot, StartRequest};
use autoprompt_scheduler::{DriverConfig, DriverGroup};
use autoprompt_storage::{JsonFileStorage, Storage};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use progress::{Outcome, ProgressTracker};

#[derive(Parser)]
#[command(name = "autoprompt", about = "Submit a list of prompts to a web form, one at a time")]
struct Cli {
    /// Page hosting the prompt form.
    #[arg(long, env = "AUTOPROMPT_URL")]
    url: String,

    /// Prompt file, one prompt per line. Optional with --resume.
    #[arg(long, env = "AUTOPROMPT_PROMPTS")]
    prompts: Option<PathBuf>,

    /// Pause between submissions, in milliseconds.
    #[arg(long, env = "AUTOPROMPT_DELAY_MS")]
    delay_ms: Option<u64>,

    /// 0-based index of the first prompt to submit.
    #[arg(long, conflicts_with = "resume")]
    start_index: Option<usize>,

    /// Continue the saved session from where it stopped.
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// Where progress is saved.
    #[arg(long, env = "AUTOPROMPT_SESSION_FILE", default_value = "autoprompt-session.json")]
    session_file: PathBuf,

    /// TOML file with timing and selector overrides.
    #[arg(long, env = "AUTOPROMPT_CONFIG")]
    config: Option<PathBuf>,

    /// Label of the trigger control; repeat for alternatives.
    #[arg(long = "trigger-verb")]
    trigger_verbs: Vec<String>,

    /// Run the browser without a window.
    #[arg(long, env = "AUTOPROMPT_HEADLESS", default_value_t = false)]
    headless: bool,

    /// Print what each context can see of the form and exit.
    #[arg(long, default_value_t = false)]
    describe: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

async fn load_config(cli: &Cli) -> anyhow::Result<DriverConfig> {
    let config = match &cli.config {
        Some(path) => DriverConfig::load(path).await?,
        None => DriverConfig::default(),
    };
    if cli.trigger_verbs.is_empty() {
        Ok(config)
    } else {
        Ok(config.with_trigger_verbs(&cli.trigger_verbs))
    }
}

/// The session to run: a fresh one from the prompt file, or the saved one.
async fn plan_session(
    cli: &Cli,
    storage: &JsonFileStorage,
    config: &DriverConfig,
) -> anyhow::Result<SessionSnapshot> {
    let saved = if cli.resume { storage.load().await? } else { None };
    if cli.resume && saved.is_none() && cli.prompts.is_none() {
        bail!("no saved session at {}", cli.session_file.display());
    }

    let prompts = match &cli.prompts {
        Some(path) => autoprompt_parser::load_prompts(path).await?,
        None => saved.as_ref().map(|s| s.prompts.clone()).unwrap_or_default(),
    };
    let delay_ms = cli
        .delay_ms
        .or_else(|| saved.as_ref().map(|s| s.delay_ms))
        .unwrap_or(config.default_delay.as_millis() as u64);
    let cursor = match (&saved, cli.start_index) {
        (_, Some(index)) => index,
        (Some(saved), None) => saved.cursor,
        (None, None) => 0,
    };

    if prompts.is_empty() {
        bail!("no prompts to submit; pass --prompts");
    }
    if cursor > prompts.len() {
        bail!("start index {} is past the end of a {}-prompt list", cursor, prompts.len());
    }
    Ok(SessionSnapshot { prompts, delay_ms, cursor })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli).await?;
    let storage = JsonFileStorage::new(&cli.session_file);
    let session = plan_session(&cli, &storage, &config).await?;
    if session.is_finished() && !cli.describe {
        info!(prompts = session.prompts.len(), "every prompt was already submitted");
        return Ok(());
    }

    let options = LaunchOptions { headless: cli.headless, ..LaunchOptions::default() };
    let browser = ChromiumSession::launch(&options, &cli.url)
        .await
        .with_context(|| format!("failed to open {}", cli.url))?;
    let contexts: Vec<_> = browser.contexts().await?.into_iter().map(Arc::new).collect();
    info!(contexts = contexts.len(), "execution contexts found");

    let (group, events) = DriverGroup::spawn(contexts, config);
    let result = if cli.describe {
        describe(&group).await
    } else {
        drive(&group, events, ProgressTracker::new(storage, session)).await
    };

    browser.close().await?;
    result
}

async fn describe(group: &DriverGroup) -> anyhow::Result<()> {
    for report in group.describe().await {
        match report {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => warn!(error = %e, "context could not be described"),
        }
    }
    Ok(())
}

async fn drive(
    group: &DriverGroup,
    mut events: tokio::sync::mpsc::Receiver<autoprompt_scheduler::ContextEvent>,
    mut tracker: ProgressTracker<JsonFileStorage>,
) -> anyhow::Result<()> {
    let session = tracker.session().clone();
    let request = StartRequest::new(session.prompts.clone())
        .starting_at(session.cursor)
        .with_delay(Duration::from_millis(session.delay_ms));
    tracker.save().await?;

    let replies = group.start(request).await;
    let mut accepted = 0;
    for (context, reply) in &replies {
        match reply {
            Ok(()) => accepted += 1,
            Err(e) => warn!(context = %context, error = %e, "start rejected"),
        }
    }
    if accepted == 0 {
        match replies.into_iter().find_map(|(_, r)| r.err()) {
            Some(e) => return Err(e.into()),
            None => bail!("the page has no execution context"),
        }
    }

    let mut liveness = tokio::time::interval(Duration::from_secs(5));
    liveness.tick().await;

    loop {
        tokio::select! {
            biased;

            tagged = events.recv() => {
                let Some(tagged) = tagged else {
                    bail!("every driver went away");
                };
                match tracker.observe(&tagged.context, &tagged.event).await? {
                    Outcome::Running => {}
                    Outcome::Completed => break,
                    Outcome::Failed(message) => {
                        group.stop().await;
                        bail!(message);
                    }
                }
            }
            _ = liveness.tick() => {
                if group.any_running().await {
                    continue;
                }
                // Idle everywhere: either the run just ended and its last
                // events are queued, or no context ever found the form.
                while let Ok(tagged) = events.try_recv() {
                    match tracker.observe(&tagged.context, &tagged.event).await? {
                        Outcome::Running => {}
                        Outcome::Completed => return finish(&tracker),
                        Outcome::Failed(message) => bail!(message),
                    }
                }
                let reason = tracker.stall_reason();
                warn!(submitted = tracker.session().cursor, "every context went idle before the run finished");
                bail!(reason);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                group.stop().await;
                tracker.save().await?;
                break;
            }
        }
    }

    finish(&tracker)
}

fn finish(tracker: &ProgressTracker<JsonFileStorage>) -> anyhow::Result<()> {
    info!(
        submitted = tracker.session().cursor,
        total = tracker.session().prompts.len(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(dir: &tempfile::TempDir, args: &[&str]) -> Cli {
        let session = dir.path().join("session.json");
        let mut argv = vec![
            "autoprompt".to_string(),
            "--url".to_string(),
            "https://example.test".to_string(),
            "--session-file".to_string(),
            session.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    fn prompt_file(dir: &tempfile::TempDir, lines: &str) -> String {
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, lines).unwrap();
        path.display().to_string()
    }

    async fn saved(dir: &tempfile::TempDir, cursor: usize) -> JsonFileStorage {
        let storage = JsonFileStorage::new(dir.path().join("session.json"));
        let session = SessionSnapshot {
            prompts: vec!["a".into(), "b".into(), "c".into()],
            delay_ms: 5000,
            cursor,
        };
        storage.save(&session).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn resume_picks_up_the_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage = saved(&dir, 2).await;
        let cli = cli(&dir, &["--resume"]);

        let session = plan_session(&cli, &storage, &DriverConfig::default()).await.unwrap();
        assert_eq!(session.prompts, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(session.cursor, 2);
        assert_eq!(session.delay_ms, 5000);
    }

    #[tokio::test]
    async fn delay_flag_wins_over_the_saved_delay() {
        let dir = tempfile::tempdir().unwrap();
        let storage = saved(&dir, 1).await;
        let cli = cli(&dir, &["--resume", "--delay-ms", "250"]);

        let session = plan_session(&cli, &storage, &DriverConfig::default()).await.unwrap();
        assert_eq!(session.delay_ms, 250);
        assert_eq!(session.cursor, 1);
    }

    #[tokio::test]
    async fn resume_without_saved_session_or_prompts_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("session.json"));
        let cli = cli(&dir, &["--resume"]);

        let err = plan_session(&cli, &storage, &DriverConfig::default()).await.unwrap_err();
        assert!(err.to_string().starts_with("no saved session at"));
    }

    #[tokio::test]
    async fn fresh_session_starts_at_the_given_index_with_the_default_delay() {
        let dir = tempfile::tempdir().unwrap();
        let storage = saved(&dir, 2).await;
        let prompts = prompt_file(&dir, "one\n\n  two  \nthree\n");
        let cli = cli(&dir, &["--prompts", &prompts, "--start-index", "1"]);

        let session = plan_session(&cli, &storage, &DriverConfig::default()).await.unwrap();
        assert_eq!(session.prompts, vec!["one".to_string(), "two".to_string(), "three".to_string()]);
        assert_eq!(session.cursor, 1);
        assert_eq!(session.delay_ms, 30000);
    }

    #[tokio::test]
    async fn start_index_past_the_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("session.json"));
        let prompts = prompt_file(&dir, "one\ntwo\n");

        let at_end = cli(&dir, &["--prompts", &prompts, "--start-index", "2"]);
        assert!(plan_session(&at_end, &storage, &DriverConfig::default()).await.unwrap().is_finished());

        let past_end = cli(&dir, &["--prompts", &prompts, "--start-index", "3"]);
        let err = plan_session(&past_end, &storage, &DriverConfig::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "start index 3 is past the end of a 2-prompt list");
    }

    #[test]
    fn start_index_and_resume_are_exclusive() {
        let result = Cli::try_parse_from([
            "autoprompt",
            "--url",
            "https://example.test",
            "--resume",
            "--start-index",
            "1",
        ]);
        assert!(result.is_err());
    }
}
