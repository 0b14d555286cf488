use autoprompt_core::DomError;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::document::ChromiumDocument;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("browser process i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid browser config: {0}")]
    Config(String),

    #[error("browser error: {0}")]
    Cdp(#[from] CdpError),

    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: Some(1280),
            viewport_height: Some(900),
        }
    }
}

/// Throwaway browser profile, removed from disk when dropped.
struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    /// A fresh profile per launch avoids SingletonLock conflicts.
    fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("autoprompt-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(dir = %self.path.display(), "browser profile removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.path.display(), error = %e, "failed to remove browser profile"),
        }
    }
}

/// A launched Chromium with one page open on the target application.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    // Declared last so the browser goes away before its profile.
    _profile: ProfileDir,
}

impl ChromiumSession {
    pub async fn launch(options: &LaunchOptions, url: &str) -> Result<Self, SessionError> {
        let profile = ProfileDir::create()?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if options.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(profile.path());
        if let (Some(w), Some(h)) = (options.viewport_width, options.viewport_height) {
            builder = builder.window_size(w, h);
        }
        let config = builder.build().map_err(SessionError::Config)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
        info!(headless = options.headless, "browser launched");

        let page = match open_page(&browser, url).await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e);
            }
        };
        info!(url, "page opened");

        Ok(Self {
            browser,
            page,
            handler,
            _profile: profile,
        })
    }

    /// The top document plus every same-origin frame, depth first.
    pub async fn contexts(&self) -> Result<Vec<ChromiumDocument>, SessionError> {
        let top = ChromiumDocument::top(self.page.clone());
        let paths = top.frame_paths().await?;
        debug!(frames = paths.len(), "enumerated same-origin frames");

        let mut contexts = Vec::with_capacity(paths.len() + 1);
        contexts.push(top);
        contexts.extend(paths.into_iter().map(|path| ChromiumDocument::new(self.page.clone(), path)));
        Ok(contexts)
    }

    pub async fn close(mut self) -> Result<(), SessionError> {
        self.browser.close().await?;
        self.browser.wait().await?;
        self.handler.abort();
        info!("browser closed");
        Ok(())
    }
}

async fn open_page(browser: &Browser, url: &str) -> Result<Page, SessionError> {
    let page = browser.new_page(url).await?;
    page.wait_for_navigation().await?;
    Ok(page)
}
