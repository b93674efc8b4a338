//! The pipeline runner: owns the shared collaborators and exposes one
//! method per stage. All lifecycle writes go through the tracker's patch
//! path, so every stage is safe to re-run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapter::{
    AdapterRegistry, ApplyOutcome, ApplyRequest, DiscoveryCriteria, JobStub,
};
use crate::browser::{BrowserLauncher, SessionOptions};
use crate::config::{ApplyMode, Config};
use crate::db::{job_repo, Database, JobPatch, JobRecord, JobStatus, NewJob};
use crate::docs::DocumentBuilder;

use super::PipelineError;

/// Per-run counters reported by the discovery stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub inserted: u32,
    pub duplicates: u32,
    pub skipped: u32,
}

/// Outcome of one job inside a batch apply run.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub job_id: String,
    pub job_url: String,
    pub outcome: ApplyOutcome,
}

pub struct Pipeline {
    config: Arc<Config>,
    db: Database,
    registry: AdapterRegistry,
    doc_builder: Box<dyn DocumentBuilder>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        db: Database,
        registry: AdapterRegistry,
        doc_builder: Box<dyn DocumentBuilder>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            config,
            db,
            registry,
            doc_builder,
            launcher,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Ingests job URLs from a text file, one per line. Blank lines and
    /// `#` comments are skipped; duplicates (by derived job id) are
    /// counted, not errors.
    pub fn discover_from_file(&self, path: &Path) -> Result<DiscoverySummary, PipelineError> {
        let _span = info_span!("discover", source = "file").entered();

        let content = fs::read_to_string(path).map_err(|e| PipelineError::ReadUrlFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut summary = DiscoverySummary::default();
        for line in content.lines() {
            let url = line.trim();
            if url.is_empty() || url.starts_with('#') {
                summary.skipped += 1;
                continue;
            }
            let platform = self.registry.platform_for_url(url);
            let inserted = job_repo::insert_ignore(
                &self.db,
                &NewJob {
                    job_url: url.to_string(),
                    platform: platform.clone(),
                    ..Default::default()
                },
            )?;
            if inserted {
                info!("Discovered {} job: {}", platform, url);
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }

        info!(
            "Discovery from {}: {} new, {} duplicate, {} skipped",
            path.display(),
            summary.inserted,
            summary.duplicates,
            summary.skipped
        );
        Ok(summary)
    }

    /// Pulls job stubs straight from a platform's listing API and records
    /// them. The source must be registered and support discovery.
    pub async fn discover_from_source(
        &self,
        source_name: &str,
        criteria: &DiscoveryCriteria,
    ) -> Result<DiscoverySummary, PipelineError> {
        let span = info_span!("discover", source = source_name, board = %criteria.board);
        self.discover_from_source_inner(source_name, criteria)
            .instrument(span)
            .await
    }

    async fn discover_from_source_inner(
        &self,
        source_name: &str,
        criteria: &DiscoveryCriteria,
    ) -> Result<DiscoverySummary, PipelineError> {
        let source =
            self.registry
                .source_by_name(source_name)
                .ok_or_else(|| PipelineError::UnknownSource {
                    name: source_name.to_string(),
                })?;

        let stubs = source.discover(criteria).await?;
        let mut summary = DiscoverySummary::default();
        for stub in &stubs {
            if self.record_stub(source.name(), stub)? {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }

        info!(
            "Discovery from {} board '{}': {} new, {} duplicate",
            source_name, criteria.board, summary.inserted, summary.duplicates
        );
        Ok(summary)
    }

    fn record_stub(&self, platform: &str, stub: &JobStub) -> Result<bool, PipelineError> {
        Ok(job_repo::insert_ignore(
            &self.db,
            &NewJob {
                job_url: stub.job_url.clone(),
                platform: platform.to_string(),
                company: stub.company.clone(),
                title: stub.title.clone(),
                location: stub.location.clone(),
                ..Default::default()
            },
        )?)
    }

    /// Fetches platform detail for one job and merges it into the
    /// record. Safe to re-run; never clears previously captured fields.
    pub async fn enrich_job(&self, id_or_url: &str) -> Result<JobRecord, PipelineError> {
        let span = info_span!("enrich", job = id_or_url);
        self.enrich_job_inner(id_or_url).instrument(span).await
    }

    async fn enrich_job_inner(&self, id_or_url: &str) -> Result<JobRecord, PipelineError> {
        let record = self.resolve(id_or_url)?;

        let source = self
            .registry
            .source_for_url(&record.job_url)
            .filter(|s| s.supports_enrichment());
        let Some(source) = source else {
            // Leave the status alone; the job can still be prepared and
            // applied from what discovery captured.
            warn!(
                "No enrichment support for platform '{}' ({})",
                record.platform, record.job_url
            );
            let patched = job_repo::patch(
                &self.db,
                &record.job_id,
                &JobPatch {
                    notes: Some(format!(
                        "enrichment not supported for platform '{}'",
                        record.platform
                    )),
                    ..Default::default()
                },
            )?;
            return patched.ok_or_else(|| PipelineError::JobNotFound {
                id: id_or_url.to_string(),
            });
        };

        match source.enrich(&record.job_url).await {
            Ok(detail) => {
                let mut metadata = serde_json::Map::new();
                if !detail.description.is_empty() {
                    metadata.insert(
                        "description".to_string(),
                        serde_json::Value::String(detail.description.clone()),
                    );
                }
                let patched = job_repo::patch(
                    &self.db,
                    &record.job_id,
                    &JobPatch {
                        status: Some(JobStatus::Enriched),
                        company: Some(detail.company),
                        title: Some(detail.title),
                        location: Some(detail.location),
                        merge_metadata: Some(metadata),
                        ..Default::default()
                    },
                )?;
                info!("Enriched job {}", record.job_id);
                patched.ok_or_else(|| PipelineError::JobNotFound {
                    id: id_or_url.to_string(),
                })
            }
            Err(e) => {
                warn!("Enrichment failed for {}: {}", record.job_id, e);
                job_repo::patch(
                    &self.db,
                    &record.job_id,
                    &JobPatch {
                        status_detail: Some(format!("enrichment failed: {}", e)),
                        failure_category: Some(e.failure_category().to_string()),
                        ..Default::default()
                    },
                )?;
                Err(e.into())
            }
        }
    }

    /// Generates the tailored document set for one job and marks it
    /// prepared. Always freshens enrichment first so documents are never
    /// generated from stale detail; an enrichment failure downgrades to
    /// a warning since documents can be built from discovery data.
    pub async fn prepare_job(&self, id_or_url: &str) -> Result<JobRecord, PipelineError> {
        let span = info_span!("prepare", job = id_or_url);
        self.prepare_job_inner(id_or_url).instrument(span).await
    }

    async fn prepare_job_inner(&self, id_or_url: &str) -> Result<JobRecord, PipelineError> {
        let mut record = self.resolve(id_or_url)?;

        match self.enrich_job_inner(&record.job_id).await {
            Ok(updated) => record = updated,
            Err(PipelineError::Adapter(e)) => {
                warn!("Preparing {} without enrichment: {}", record.job_id, e);
            }
            Err(e) => return Err(e),
        }

        let job_dir = self.job_output_dir(&record.job_id);
        let documents = self
            .doc_builder
            .build(&record, &job_dir, &self.config.profile)?;

        let patched = job_repo::patch(
            &self.db,
            &record.job_id,
            &JobPatch {
                status: Some(JobStatus::Prepared),
                resume_path: Some(documents.resume_path.display().to_string()),
                cover_letter_path: Some(documents.cover_letter_path.display().to_string()),
                ..Default::default()
            },
        )?;
        info!("Prepared job {}", record.job_id);
        patched.ok_or_else(|| PipelineError::JobNotFound {
            id: id_or_url.to_string(),
        })
    }

    /// Runs one apply attempt. Already-submitted jobs are skipped without
    /// touching the browser; every other job is re-prepared so the attempt
    /// never uses stale artifacts. The outcome is always written back to
    /// the tracker before returning.
    pub async fn apply_job(
        &self,
        id_or_url: &str,
        mode_override: Option<ApplyMode>,
        dry_run: bool,
    ) -> Result<BatchItem, PipelineError> {
        let span = info_span!("apply", job = id_or_url);
        self.apply_job_inner(id_or_url, mode_override, dry_run)
            .instrument(span)
            .await
    }

    async fn apply_job_inner(
        &self,
        id_or_url: &str,
        mode_override: Option<ApplyMode>,
        dry_run: bool,
    ) -> Result<BatchItem, PipelineError> {
        let record = self.resolve(id_or_url)?;

        // Idempotent re-entry: a submitted job is never re-applied.
        if record.status == JobStatus::Submitted {
            info!("Job {} already submitted, skipping", record.job_id);
            return Ok(BatchItem {
                job_id: record.job_id,
                job_url: record.job_url,
                outcome: ApplyOutcome::Skipped {
                    reason: "already submitted".to_string(),
                },
            });
        }

        // Re-prepare on every attempt: documents are cheap to rebuild and
        // must reflect the latest enrichment.
        let record = self.prepare_job_inner(&record.job_id).await?;

        let adapter = self
            .registry
            .apply_for_url(&record.job_url)
            .ok_or_else(|| PipelineError::NoApplyAdapter {
                url: record.job_url.clone(),
            })?;

        let run_dir = self
            .job_output_dir(&record.job_id)
            .join("runs")
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&run_dir).map_err(|e| PipelineError::CreateRunDir {
            path: run_dir.clone(),
            source: e,
        })?;

        let settings = &self.config.apply;
        let options = SessionOptions {
            navigation_timeout_ms: settings.navigation_timeout_ms,
            headless: true,
        };
        let session = match self.launcher.launch(&options).await {
            Ok(session) => session,
            Err(e) => {
                let outcome = ApplyOutcome::Failed {
                    reason: format!("browser launch failed: {}", e),
                };
                self.record_outcome(&record, &outcome, &[], None)?;
                return Ok(BatchItem {
                    job_id: record.job_id,
                    job_url: record.job_url,
                    outcome,
                });
            }
        };

        let mode = mode_override.unwrap_or(settings.mode);
        let request = ApplyRequest {
            profile: &self.config.profile,
            resume_path: record.resume_path.as_deref(),
            mode,
            dry_run,
            run_dir: &run_dir,
            settings,
        };

        info!(
            "Applying to {} via {} adapter (mode: {:?}, dry_run: {})",
            record.job_url,
            adapter.name(),
            mode,
            dry_run
        );

        match adapter.apply(&record, &request, session.as_ref()).await {
            Ok(report) => {
                self.record_outcome(
                    &record,
                    &report.outcome,
                    &report.artifacts,
                    report.notes.as_deref(),
                )?;
                Ok(BatchItem {
                    job_id: record.job_id,
                    job_url: record.job_url,
                    outcome: report.outcome,
                })
            }
            Err(e) => {
                let outcome = ApplyOutcome::Failed {
                    reason: e.to_string(),
                };
                job_repo::patch(
                    &self.db,
                    &record.job_id,
                    &JobPatch {
                        status: Some(JobStatus::Failed),
                        status_detail: Some(e.to_string()),
                        failure_category: Some(e.failure_category().to_string()),
                        ..Default::default()
                    },
                )?;
                Ok(BatchItem {
                    job_id: record.job_id,
                    job_url: record.job_url,
                    outcome,
                })
            }
        }
    }

    /// Maps an apply outcome onto the record. `Skipped` leaves the
    /// status untouched.
    fn record_outcome(
        &self,
        record: &JobRecord,
        outcome: &ApplyOutcome,
        artifacts: &[String],
        notes: Option<&str>,
    ) -> Result<(), PipelineError> {
        let mut patch = JobPatch {
            append_artifacts: artifacts.to_vec(),
            notes: notes.map(str::to_string),
            ..Default::default()
        };

        match outcome {
            ApplyOutcome::Submitted => patch.status = Some(JobStatus::Submitted),
            ApplyOutcome::NeedsReview => patch.status = Some(JobStatus::NeedsReview),
            ApplyOutcome::Blocked(friction) => {
                patch.status = Some(JobStatus::Blocked);
                patch.failure_category = friction.category().map(str::to_string);
                patch.status_detail = Some(format!("blocked by {:?}", friction));
            }
            ApplyOutcome::Failed { reason } => {
                patch.status = Some(JobStatus::Failed);
                patch.status_detail = Some(reason.clone());
            }
            ApplyOutcome::Skipped { reason } => {
                patch.notes = Some(reason.clone());
            }
        }

        job_repo::patch(&self.db, &record.job_id, &patch)?;
        Ok(())
    }

    /// Applies to up to `limit` prepared jobs sequentially, with a
    /// randomized pause between attempts. One job's failure never stops
    /// the batch.
    pub async fn apply_batch(
        &self,
        limit: u64,
        mode_override: Option<ApplyMode>,
        dry_run: bool,
    ) -> Result<Vec<BatchItem>, PipelineError> {
        let span = info_span!("apply_batch", limit);
        self.apply_batch_inner(limit, mode_override, dry_run)
            .instrument(span)
            .await
    }

    async fn apply_batch_inner(
        &self,
        limit: u64,
        mode_override: Option<ApplyMode>,
        dry_run: bool,
    ) -> Result<Vec<BatchItem>, PipelineError> {
        let queue = job_repo::by_status(&self.db, JobStatus::Prepared, limit)?;
        info!("Batch apply: {} prepared jobs queued", queue.len());

        let mut items = Vec::with_capacity(queue.len());
        for (i, job) in queue.iter().enumerate() {
            if i > 0 {
                self.apply_delay().await;
            }
            match self
                .apply_job_inner(&job.job_id, mode_override, dry_run)
                .await
            {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!("Batch item {} errored: {}", job.job_id, e);
                    items.push(BatchItem {
                        job_id: job.job_id.clone(),
                        job_url: job.job_url.clone(),
                        outcome: ApplyOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }
        Ok(items)
    }

    /// Randomized inter-application pause, bounded by the configured
    /// min/max window.
    async fn apply_delay(&self) {
        let settings = &self.config.apply;
        let min = settings.min_apply_delay_ms.min(settings.max_apply_delay_ms);
        let max = settings.max_apply_delay_ms.max(settings.min_apply_delay_ms);
        let delay = if max == 0 {
            0
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        if delay > 0 {
            info!("Waiting {}ms before next application", delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn resolve(&self, id_or_url: &str) -> Result<JobRecord, PipelineError> {
        job_repo::resolve(&self.db, id_or_url)?.ok_or_else(|| PipelineError::JobNotFound {
            id: id_or_url.to_string(),
        })
    }

    fn job_output_dir(&self, job_id: &str) -> PathBuf {
        self.config.output_directory.join(job_id)
    }
}
