//! Generic fallback adapter and the shared apply flow.
//!
//! The generic adapter matches every URL and must be registered last. It
//! supports neither discovery nor enrichment; its apply side is the
//! label-heuristic form fill that also backs the platform adapters.

use std::path::Path;

use async_trait::async_trait;

use crate::browser::form::{self, FillReport};
use crate::browser::{
    navigate_with_retries, scan_friction_text, BrowserSession, FrictionKind, RetryPolicy,
    StepVerdict, StepGuard,
};
use crate::db::JobRecord;

use super::{AdapterError, ApplyAdapter, ApplyOutcome, ApplyReport, ApplyRequest, JobSource};

pub struct Generic;

impl Generic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Generic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSource for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }

    /// Unconditional match; must be registered after every platform
    /// adapter.
    fn can_handle_url(&self, _url: &str) -> bool {
        true
    }
}

#[async_trait]
impl ApplyAdapter for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn can_handle_url(&self, _url: &str) -> bool {
        true
    }

    async fn apply(
        &self,
        job: &JobRecord,
        request: &ApplyRequest<'_>,
        session: &dyn BrowserSession,
    ) -> Result<ApplyReport, AdapterError> {
        run_apply_flow(&job.job_url, request, session).await
    }
}

/// Best-effort page capture; a capture failure must never mask the
/// outcome it documents.
async fn capture(
    session: &dyn BrowserSession,
    dir: &Path,
    label: &str,
    artifacts: &mut Vec<String>,
) {
    match session.capture_artifacts(dir, label).await {
        Ok(paths) => {
            artifacts.push(paths.screenshot_path.display().to_string());
            artifacts.push(paths.html_path.display().to_string());
        }
        Err(e) => log::warn!("Artifact capture '{}' failed: {}", label, e),
    }
}

/// The shared apply state machine. Platform adapters reuse this after
/// their own URL/entry handling; the contract invariants (assisted by
/// default, friction short-circuit, bounded steps, artifact capture on
/// non-success) all live here.
pub(crate) async fn run_apply_flow(
    start_url: &str,
    request: &ApplyRequest<'_>,
    session: &dyn BrowserSession,
) -> Result<ApplyReport, AdapterError> {
    let settings = request.settings;
    let mut artifacts = Vec::new();

    let nav_policy = RetryPolicy::new(
        settings.navigation_retries + 1,
        settings.navigation_retry_delay_ms,
    );
    if let Err(e) = navigate_with_retries(session, start_url, nav_policy).await {
        return Ok(ApplyReport {
            outcome: ApplyOutcome::Failed {
                reason: format!("navigation failed: {}", e),
            },
            artifacts,
            notes: None,
        });
    }

    // Friction check before touching anything on the page.
    let friction = session.detect_friction().await?;
    if friction != FrictionKind::None {
        capture(session, request.run_dir, "friction", &mut artifacts).await;
        return Ok(ApplyReport {
            outcome: ApplyOutcome::Blocked(friction),
            artifacts,
            notes: None,
        });
    }

    // Idempotent re-entry: respect a platform "already applied" marker.
    let text = session.page_text().await?;
    if form::already_applied(&text) {
        return Ok(ApplyReport::new(ApplyOutcome::Skipped {
            reason: "platform reports an existing application".to_string(),
        }));
    }

    let mut guard = StepGuard::new(settings.max_form_steps, settings.step_repeat_threshold);
    let mut fill_report = FillReport::default();

    loop {
        let Some(snapshot) = session.form_snapshot().await? else {
            capture(session, request.run_dir, "no-form", &mut artifacts).await;
            return Ok(ApplyReport {
                outcome: ApplyOutcome::Failed {
                    reason: "no application form found".to_string(),
                },
                artifacts,
                notes: None,
            });
        };

        if let StepVerdict::Stuck(reason) = guard.observe(&snapshot.fingerprint()) {
            capture(session, request.run_dir, "stuck", &mut artifacts).await;
            return Ok(ApplyReport {
                outcome: ApplyOutcome::Failed { reason },
                artifacts,
                notes: Some(fill_report.summary()),
            });
        }

        let step_report =
            form::fill_form(session, &snapshot, request.profile, request.resume_path).await?;
        fill_report.merge(step_report);

        // Friction checkpoint after interacting with this step.
        let friction = session.detect_friction().await?;
        if friction != FrictionKind::None {
            capture(session, request.run_dir, "friction", &mut artifacts).await;
            return Ok(ApplyReport {
                outcome: ApplyOutcome::Blocked(friction),
                artifacts,
                notes: Some(fill_report.summary()),
            });
        }

        if let Some(submit) = snapshot.submit_control() {
            if !request.submission_allowed() {
                capture(session, request.run_dir, "ready-to-submit", &mut artifacts).await;
                return Ok(ApplyReport {
                    outcome: ApplyOutcome::NeedsReview,
                    artifacts,
                    notes: Some(fill_report.summary()),
                });
            }

            session.click(&submit.control_id).await?;
            let after = session.page_text().await?;

            if form::confirm_submission(&after) {
                return Ok(ApplyReport {
                    outcome: ApplyOutcome::Submitted,
                    artifacts,
                    notes: Some(fill_report.summary()),
                });
            }

            let friction = scan_friction_text(&after);
            if friction != FrictionKind::None {
                capture(session, request.run_dir, "friction", &mut artifacts).await;
                return Ok(ApplyReport {
                    outcome: ApplyOutcome::Blocked(friction),
                    artifacts,
                    notes: Some(fill_report.summary()),
                });
            }

            capture(session, request.run_dir, "unconfirmed-submit", &mut artifacts).await;
            return Ok(ApplyReport {
                outcome: ApplyOutcome::Failed {
                    reason: "submission not confirmed by the platform".to_string(),
                },
                artifacts,
                notes: Some(fill_report.summary()),
            });
        }

        if let Some(next) = snapshot.next_control() {
            session.click(&next.control_id).await?;
            continue;
        }

        capture(session, request.run_dir, "no-action", &mut artifacts).await;
        return Ok(ApplyReport {
            outcome: ApplyOutcome::Failed {
                reason: "no submit or continue control on form".to_string(),
            },
            artifacts,
            notes: Some(fill_report.summary()),
        });
    }
}
