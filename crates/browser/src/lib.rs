pub mod injector;
pub mod locator;
pub mod shared;
pub mod trigger;
pub mod wait;
pub mod worker;

pub use injector::{Injection, InjectionStrategy, ValueInjector};
pub use locator::{Locator, LocatorConfig, Rule, Scope, Strategy};
pub use shared::TimingConfig;
pub use trigger::{Activation, Readiness, TriggerControl};
pub use worker::chromium::{ChromiumDocument, ChromiumSession, LaunchOptions, SessionError};
