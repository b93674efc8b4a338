//! Browser session collaborator contract.
//!
//! The pipeline and the apply adapters never touch a site's DOM directly;
//! they drive a [`BrowserSession`] behind this trait. A concrete backend
//! (CDP, WebDriver, ...) lives outside this crate and is wired in through
//! [`BrowserLauncher`]. What *is* owned here: navigation retries, the
//! friction (anti-bot) scan, and the shared form-fill heuristic.

pub mod form;
pub mod retry;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use form::{FormControl, FormSnapshot, SelectOption};
pub use retry::{with_retries, RetryPolicy, StepGuard, StepVerdict};

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Interaction with control '{control}' failed: {reason}")]
    Interaction { control: String, reason: String },

    #[error("Failed to capture artifacts to '{path}': {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No browser backend configured")]
    NoBackend,

    #[error("Browser session closed unexpectedly")]
    SessionClosed,
}

/// Anti-automation signal detected on a page. `None` means the page is
/// safe to interact with; anything else requires a human and must never
/// be worked around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrictionKind {
    None,
    Captcha,
    TwoFactor,
    BotCheck,
}

impl FrictionKind {
    /// Tracker `failure_category` value for this signal.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            FrictionKind::None => None,
            FrictionKind::Captcha => Some("captcha"),
            FrictionKind::TwoFactor => Some("two-factor"),
            FrictionKind::BotCheck => Some("bot-check"),
        }
    }
}

/// Diagnostic captures for one page state.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub screenshot_path: PathBuf,
    pub html_path: PathBuf,
}

/// Launch-time session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub navigation_timeout_ms: u64,
    pub headless: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            headless: true,
        }
    }
}

/// A controllable browser page.
///
/// Implementations must honor the navigation timeout from
/// [`SessionOptions`], and `set_control` must dispatch input and change
/// notifications after programmatic assignment so framework-bound
/// listeners observe the new value.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Visible text content of the current page.
    async fn page_text(&self) -> Result<String, BrowserError>;

    /// Snapshot of the current application form, if one is present.
    /// Labels are resolved by the backend in precedence order:
    /// associated label, enclosing label, aria-label, placeholder,
    /// then name/id.
    async fn form_snapshot(&self) -> Result<Option<FormSnapshot>, BrowserError>;

    async fn set_control(&self, control_id: &str, value: &str) -> Result<(), BrowserError>;

    async fn select_option(
        &self,
        control_id: &str,
        option_value: &str,
    ) -> Result<(), BrowserError>;

    async fn click(&self, control_id: &str) -> Result<(), BrowserError>;

    /// Writes a screenshot + HTML dump into `dir`, named by `label`.
    async fn capture_artifacts(
        &self,
        dir: &Path,
        label: &str,
    ) -> Result<ArtifactPaths, BrowserError>;

    /// Checks the current page for CAPTCHA / 2FA / bot-check signals.
    async fn detect_friction(&self) -> Result<FrictionKind, BrowserError>;
}

/// Factory for browser sessions. One session per apply attempt; sessions
/// are never shared across jobs.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Launcher used when no concrete browser backend is compiled in. Apply
/// attempts surface a `failed` record with a clear reason instead of
/// panicking.
pub struct NullBrowserLauncher;

#[async_trait]
impl BrowserLauncher for NullBrowserLauncher {
    async fn launch(
        &self,
        _options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::NoBackend)
    }
}

/// Navigates with a bounded number of attempts. Transient navigation
/// failures are the only thing retried at this layer; everything else
/// surfaces to the adapter immediately.
pub async fn navigate_with_retries(
    session: &dyn BrowserSession,
    url: &str,
    policy: RetryPolicy,
) -> Result<(), BrowserError> {
    with_retries(policy, |_attempt| session.navigate(url)).await
}

/// Scans page text for friction signals. Shared by all session backends
/// and adapters so the keyword table lives in one place.
pub fn scan_friction_text(text: &str) -> FrictionKind {
    let lower = text.to_lowercase();

    const CAPTCHA_SIGNALS: &[&str] = &[
        "captcha",
        "recaptcha",
        "hcaptcha",
        "verify you are human",
        "i'm not a robot",
    ];
    const TWO_FACTOR_SIGNALS: &[&str] = &[
        "two-factor",
        "two factor",
        "2fa",
        "verification code",
        "enter the code we sent",
        "authentication code",
    ];
    const BOT_CHECK_SIGNALS: &[&str] = &[
        "unusual traffic",
        "automated requests",
        "access denied",
        "checking your browser",
        "security check",
    ];

    if CAPTCHA_SIGNALS.iter().any(|s| lower.contains(s)) {
        FrictionKind::Captcha
    } else if TWO_FACTOR_SIGNALS.iter().any(|s| lower.contains(s)) {
        FrictionKind::TwoFactor
    } else if BOT_CHECK_SIGNALS.iter().any(|s| lower.contains(s)) {
        FrictionKind::BotCheck
    } else {
        FrictionKind::None
    }
}
