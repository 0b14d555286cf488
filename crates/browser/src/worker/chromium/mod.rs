mod document;
mod session;

pub use document::{context_label, ChromiumDocument};
pub use session::{ChromiumSession, LaunchOptions, SessionError};
