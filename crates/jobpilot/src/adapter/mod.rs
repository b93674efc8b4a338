//! Adapter registry and the two capability contracts.
//!
//! A [`JobSource`] discovers and enriches jobs for one platform; an
//! [`ApplyAdapter`] submits applications. Both are selected by URL
//! predicate in registration order, so platform-specific adapters must be
//! registered before the generic fallback (which matches every URL).

pub mod generic;
pub mod greenhouse;
pub mod lever;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{BrowserError, BrowserSession, FrictionKind};
use crate::config::{ApplyMode, ApplySettings, Config, Profile};
use crate::db::JobRecord;

pub use generic::Generic;
pub use greenhouse::Greenhouse;
pub use lever::Lever;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("HTTP request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP client construction failed: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Unexpected payload from '{url}': {reason}")]
    UnexpectedPayload { url: String, reason: String },

    #[error("URL '{url}' not recognized by the {adapter} adapter")]
    UnrecognizedUrl { url: String, adapter: &'static str },

    #[error("Adapter '{adapter}' does not support {operation}")]
    Unsupported {
        adapter: &'static str,
        operation: &'static str,
    },

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl AdapterError {
    /// Tracker `failure_category` for this error.
    pub fn failure_category(&self) -> &'static str {
        match self {
            AdapterError::Http { .. } | AdapterError::ClientBuild(_) => "network",
            AdapterError::UnexpectedPayload { .. } | AdapterError::UnrecognizedUrl { .. } => {
                "parse"
            }
            AdapterError::Unsupported { .. } => "configuration",
            AdapterError::Browser(_) => "browser",
        }
    }
}

/// Source-specific discovery parameters: a board identifier (company
/// slug on most ATS platforms) and a result ceiling.
#[derive(Debug, Clone)]
pub struct DiscoveryCriteria {
    pub board: String,
    pub limit: usize,
}

/// Lightweight job stub returned by discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStub {
    pub job_url: String,
    pub title: String,
    pub company: String,
    pub location: String,
}

/// Normalized detail record returned by enrichment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobDetail {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
}

/// Per-platform discovery and enrichment. Both capabilities are
/// independent; an adapter may support one, both, or neither.
#[async_trait]
pub trait JobSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle_url(&self, url: &str) -> bool;

    fn supports_discovery(&self) -> bool {
        false
    }

    fn supports_enrichment(&self) -> bool {
        false
    }

    /// Lists job stubs from a board. Item-level failures are logged and
    /// skipped, never propagated as a batch failure.
    async fn discover(&self, _criteria: &DiscoveryCriteria) -> Result<Vec<JobStub>, AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name(),
            operation: "discovery",
        })
    }

    /// Fetches a normalized detail record. Idempotent; no local state.
    async fn enrich(&self, _job_url: &str) -> Result<JobDetail, AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name(),
            operation: "enrichment",
        })
    }
}

/// Everything an apply attempt needs besides the job itself.
pub struct ApplyRequest<'a> {
    pub profile: &'a Profile,
    pub resume_path: Option<&'a str>,
    pub mode: ApplyMode,
    /// Overrides `mode`: always stop before submit.
    pub dry_run: bool,
    /// Directory for this attempt's diagnostic captures.
    pub run_dir: &'a Path,
    pub settings: &'a ApplySettings,
}

impl ApplyRequest<'_> {
    /// True when the final submit click may actually happen.
    pub fn submission_allowed(&self) -> bool {
        self.mode == ApplyMode::Auto && !self.dry_run
    }
}

/// Terminal outcome of one apply attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Form filled and submitted; confirmed by the adapter.
    Submitted,
    /// Form filled up to the final submit, stopped for human review
    /// (assisted mode or dry run). The expected default outcome.
    NeedsReview,
    /// Friction signal detected; nothing was bypassed.
    Blocked(FrictionKind),
    /// Unexpected failure (navigation, missing form, stuck steps).
    Failed { reason: String },
    /// Idempotent re-entry on an already-applied job; no status change.
    Skipped { reason: String },
}

/// Apply attempt result: outcome plus diagnostics for the Job Record.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    pub artifacts: Vec<String>,
    pub notes: Option<String>,
}

impl ApplyReport {
    pub fn new(outcome: ApplyOutcome) -> Self {
        Self {
            outcome,
            artifacts: Vec::new(),
            notes: None,
        }
    }
}

/// Per-platform submission. Every implementation must honor the shared
/// contract: assisted-by-default, friction checks before and during
/// fill, bounded multi-step loops, idempotent re-entry, and artifact
/// capture on non-success.
#[async_trait]
pub trait ApplyAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle_url(&self, url: &str) -> bool;

    async fn apply(
        &self,
        job: &JobRecord,
        request: &ApplyRequest<'_>,
        session: &dyn BrowserSession,
    ) -> Result<ApplyReport, AdapterError>;
}

/// Ordered adapter lists, dispatched by first-match URL predicate.
///
/// Holds no per-job state; adapters are stateless with respect to the
/// registry. Registration order is significant.
#[derive(Default)]
pub struct AdapterRegistry {
    sources: Vec<Arc<dyn JobSource>>,
    apply: Vec<Arc<dyn ApplyAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard registry: platform adapters first, generic
    /// fallback last.
    pub fn with_default_adapters(config: &Config) -> Result<Self, AdapterError> {
        let mut registry = Self::new();

        let greenhouse = Arc::new(Greenhouse::new(config.enrichment_timeout_ms)?);
        let lever = Arc::new(Lever::new(config.enrichment_timeout_ms)?);
        let generic = Arc::new(Generic::new());

        registry.register_source(greenhouse.clone());
        registry.register_source(lever.clone());
        registry.register_source(generic.clone());

        registry.register_apply(greenhouse);
        registry.register_apply(lever);
        registry.register_apply(generic);

        Ok(registry)
    }

    pub fn register_source(&mut self, source: Arc<dyn JobSource>) {
        self.sources.push(source);
    }

    pub fn register_apply(&mut self, adapter: Arc<dyn ApplyAdapter>) {
        self.apply.push(adapter);
    }

    /// First registered job source whose predicate matches, or `None`.
    pub fn source_for_url(&self, url: &str) -> Option<Arc<dyn JobSource>> {
        self.sources
            .iter()
            .find(|s| s.can_handle_url(url))
            .cloned()
    }

    /// First registered apply adapter whose predicate matches. Expected
    /// to always resolve when the generic fallback is registered.
    pub fn apply_for_url(&self, url: &str) -> Option<Arc<dyn ApplyAdapter>> {
        self.apply.iter().find(|a| a.can_handle_url(url)).cloned()
    }

    pub fn source_by_name(&self, name: &str) -> Option<Arc<dyn JobSource>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    /// Platform label for a URL: the matching source's name, with
    /// `"generic"` as the fallback.
    pub fn platform_for_url(&self, url: &str) -> String {
        self.source_for_url(url)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "generic".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        name: &'static str,
        pattern: &'static str,
    }

    #[async_trait]
    impl JobSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }
        fn can_handle_url(&self, url: &str) -> bool {
            self.pattern.is_empty() || url.contains(self.pattern)
        }
    }

    fn registry_with(sources: Vec<FakeSource>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for source in sources {
            registry.register_source(Arc::new(source));
        }
        registry
    }

    #[test]
    fn test_first_match_wins_in_registration_order() {
        let registry = registry_with(vec![
            FakeSource {
                name: "alpha",
                pattern: "jobs.example.com",
            },
            FakeSource {
                name: "beta",
                pattern: "example.com",
            },
        ]);

        let matched = registry
            .source_for_url("https://jobs.example.com/123")
            .unwrap();
        assert_eq!(matched.name(), "alpha");
    }

    #[test]
    fn test_routing_is_deterministic() {
        let registry = registry_with(vec![
            FakeSource {
                name: "alpha",
                pattern: "alpha.test",
            },
            FakeSource {
                name: "catchall",
                pattern: "",
            },
        ]);

        for _ in 0..10 {
            assert_eq!(
                registry.platform_for_url("https://alpha.test/j/1"),
                "alpha"
            );
            assert_eq!(
                registry.platform_for_url("https://other.test/j/1"),
                "catchall"
            );
        }
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let registry = registry_with(vec![FakeSource {
            name: "alpha",
            pattern: "alpha.test",
        }]);

        assert!(registry.source_for_url("https://other.test/1").is_none());
        assert_eq!(registry.platform_for_url("https://other.test/1"), "generic");
    }

    #[tokio::test]
    async fn test_default_capabilities_are_noop() {
        let source = FakeSource {
            name: "bare",
            pattern: "",
        };
        assert!(!source.supports_discovery());
        assert!(!source.supports_enrichment());
        let result = source.enrich("https://x.test/1").await;
        assert!(matches!(result, Err(AdapterError::Unsupported { .. })));
    }

    #[test]
    fn test_submission_allowed() {
        let profile = Profile::default();
        let settings = ApplySettings::default();
        let base = ApplyRequest {
            profile: &profile,
            resume_path: None,
            mode: ApplyMode::Auto,
            dry_run: false,
            run_dir: Path::new("/tmp"),
            settings: &settings,
        };
        assert!(base.submission_allowed());

        let dry = ApplyRequest { dry_run: true, ..base };
        assert!(!dry.submission_allowed());

        let assisted = ApplyRequest {
            mode: ApplyMode::Assisted,
            dry_run: false,
            profile: &profile,
            resume_path: None,
            run_dir: Path::new("/tmp"),
            settings: &settings,
        };
        assert!(!assisted.submission_allowed());
    }
}
