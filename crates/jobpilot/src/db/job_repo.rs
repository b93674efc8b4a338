//! Job Record repository — the Tracker's read/write surface.
//!
//! Every job discovered by the pipeline gets exactly one row here, keyed
//! by a `job_id` derived deterministically from platform + URL so that
//! re-discovery is idempotent. Rows are never hard-deleted; the record is
//! the audit trail for the whole application lifecycle.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Database, DatabaseError};

/// Lifecycle stage of a Job Record. Single source of truth for the
/// pipeline; transitions are timestamped independently so a failed apply
/// can drop a job back to review without corrupting history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Discovered,
    Enriched,
    Prepared,
    Submitted,
    NeedsReview,
    Blocked,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Discovered => "discovered",
            JobStatus::Enriched => "enriched",
            JobStatus::Prepared => "prepared",
            JobStatus::Submitted => "submitted",
            JobStatus::NeedsReview => "needs_review",
            JobStatus::Blocked => "blocked",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(JobStatus::Discovered),
            "enriched" => Some(JobStatus::Enriched),
            "prepared" => Some(JobStatus::Prepared),
            "submitted" => Some(JobStatus::Submitted),
            "needs_review" => Some(JobStatus::NeedsReview),
            "blocked" => Some(JobStatus::Blocked),
            "failed" => Some(JobStatus::Failed),
        _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the stable `job_id` for a platform + URL pair (UUIDv5 over the
/// URL namespace). Identical inputs always produce the identical id.
pub fn derive_job_id(platform: &str, job_url: &str) -> String {
    let name = format!("{}:{}", platform, job_url);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// A full Job Record as stored in the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub job_url: String,
    pub platform: String,
    pub company: String,
    pub title: String,
    pub location: String,
    pub status: JobStatus,
    pub status_detail: Option<String>,
    pub failure_category: Option<String>,
    pub notes: Option<String>,
    pub discovered_at: String,
    pub enriched_at: Option<String>,
    pub prepared_at: Option<String>,
    pub applied_at: Option<String>,
    pub updated_at: String,
    pub resume_path: Option<String>,
    pub cover_letter_path: Option<String>,
    /// Diagnostic capture paths, appended per attempt, never truncated.
    pub artifact_paths: Vec<String>,
    /// Adapter-specific extra fields (description, salary, ATS ids).
    pub metadata: Map<String, Value>,
}

impl JobRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, DatabaseError> {
        let job_id: String = row.get("job_id")?;
        let status_raw: String = row.get("status")?;
        let status = JobStatus::parse(&status_raw).ok_or_else(|| DatabaseError::Corrupt {
            job_id: job_id.clone(),
            reason: format!("unknown status '{}'", status_raw),
        })?;

        let artifacts_raw: String = row.get("artifact_paths")?;
        let artifact_paths: Vec<String> =
            serde_json::from_str(&artifacts_raw).map_err(|e| DatabaseError::Corrupt {
                job_id: job_id.clone(),
                reason: format!("artifact_paths: {}", e),
            })?;

        let metadata_raw: String = row.get("metadata")?;
        let metadata: Map<String, Value> =
            serde_json::from_str(&metadata_raw).map_err(|e| DatabaseError::Corrupt {
                job_id: job_id.clone(),
                reason: format!("metadata: {}", e),
            })?;

        Ok(Self {
            job_id,
            job_url: row.get("job_url")?,
            platform: row.get("platform")?,
            company: row.get("company")?,
            title: row.get("title")?,
            location: row.get("location")?,
            status,
            status_detail: row.get("status_detail")?,
            failure_category: row.get("failure_category")?,
            notes: row.get("notes")?,
            discovered_at: row.get("discovered_at")?,
            enriched_at: row.get("enriched_at")?,
            prepared_at: row.get("prepared_at")?,
            applied_at: row.get("applied_at")?,
            updated_at: row.get("updated_at")?,
            resume_path: row.get("resume_path")?,
            cover_letter_path: row.get("cover_letter_path")?,
            artifact_paths,
            metadata,
        })
    }
}

/// Fields known at discovery time. Everything else starts empty and is
/// filled in by later stages.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub job_url: String,
    pub platform: String,
    pub company: String,
    pub title: String,
    pub location: String,
    pub metadata: Map<String, Value>,
}

/// Named-field patch applied through [`patch`]. Unset fields are left
/// untouched; `metadata` merges additively and `append_artifacts` only
/// ever grows the stored list.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub status_detail: Option<String>,
    pub failure_category: Option<String>,
    pub notes: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub resume_path: Option<String>,
    pub cover_letter_path: Option<String>,
    pub append_artifacts: Vec<String>,
    pub merge_metadata: Option<Map<String, Value>>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Inserts a job if no record exists for its URL yet. Returns whether a
/// new row was actually inserted, so callers can skip duplicates.
pub fn insert_ignore(db: &Database, job: &NewJob) -> Result<bool, DatabaseError> {
    let job_id = derive_job_id(&job.platform, &job.job_url);
    let now = now_rfc3339();
    let metadata = Value::Object(job.metadata.clone()).to_string();

    db.with_conn(|conn| {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO jobs
             (job_id, job_url, platform, company, title, location, status,
              discovered_at, updated_at, artifact_paths, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'discovered', ?7, ?7, '[]', ?8)",
            params![
                job_id,
                job.job_url,
                job.platform,
                job.company,
                job.title,
                job.location,
                now,
                metadata,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Patches a job in place. Always stamps `updated_at`; stage timestamps
/// (`enriched_at`, `prepared_at`, `applied_at`) are set at most once, on
/// the first transition into the corresponding stage. Identity fields
/// are never overwritten with empty values (merge, not replace).
///
/// Returns the updated record, or `None` if no such job exists.
pub fn patch(db: &Database, job_id: &str, p: &JobPatch) -> Result<Option<JobRecord>, DatabaseError> {
    let Some(mut record) = find(db, job_id)? else {
        return Ok(None);
    };

    let now = now_rfc3339();

    if let Some(status) = p.status {
        record.status = status;
        match status {
            JobStatus::Enriched => {
                record.enriched_at.get_or_insert_with(|| now.clone());
            }
            JobStatus::Prepared => {
                record.prepared_at.get_or_insert_with(|| now.clone());
            }
            JobStatus::Submitted
            | JobStatus::NeedsReview
            | JobStatus::Blocked
            | JobStatus::Failed => {
                record.applied_at.get_or_insert_with(|| now.clone());
            }
            JobStatus::Discovered => {}
        }
    }

    if let Some(ref v) = p.status_detail {
        record.status_detail = Some(v.clone());
    }
    if let Some(ref v) = p.failure_category {
        record.failure_category = Some(v.clone());
    }
    if let Some(ref v) = p.notes {
        record.notes = Some(v.clone());
    }

    // Enrichment merge semantics: an empty value never clobbers a
    // previously captured one.
    if let Some(ref v) = p.company {
        if !v.trim().is_empty() {
            record.company = v.clone();
        }
    }
    if let Some(ref v) = p.title {
        if !v.trim().is_empty() {
            record.title = v.clone();
        }
    }
    if let Some(ref v) = p.location {
        if !v.trim().is_empty() {
            record.location = v.clone();
        }
    }

    if let Some(ref v) = p.resume_path {
        record.resume_path = Some(v.clone());
    }
    if let Some(ref v) = p.cover_letter_path {
        record.cover_letter_path = Some(v.clone());
    }

    record
        .artifact_paths
        .extend(p.append_artifacts.iter().cloned());

    if let Some(ref incoming) = p.merge_metadata {
        for (k, v) in incoming {
            record.metadata.insert(k.clone(), v.clone());
        }
    }

    record.updated_at = now;

    let artifacts = serde_json::to_string(&record.artifact_paths).unwrap_or_else(|_| "[]".into());
    let metadata = Value::Object(record.metadata.clone()).to_string();

    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET
                company=?2, title=?3, location=?4, status=?5, status_detail=?6,
                failure_category=?7, notes=?8, enriched_at=?9, prepared_at=?10,
                applied_at=?11, updated_at=?12, resume_path=?13,
                cover_letter_path=?14, artifact_paths=?15, metadata=?16
             WHERE job_id=?1",
            params![
                record.job_id,
                record.company,
                record.title,
                record.location,
                record.status.as_str(),
                record.status_detail,
                record.failure_category,
                record.notes,
                record.enriched_at,
                record.prepared_at,
                record.applied_at,
                record.updated_at,
                record.resume_path,
                record.cover_letter_path,
                artifacts,
                metadata,
            ],
        )?;
        Ok(())
    })?;

    Ok(Some(record))
}

/// Finds a job by its ID.
pub fn find(db: &Database, job_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM jobs WHERE job_id = ?1",
            params![job_id],
            |row| Ok(JobRecord::from_row(row)),
        )
        .optional()?
        .transpose()
    })
}

/// Finds a job by its URL.
pub fn find_by_url(db: &Database, job_url: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM jobs WHERE job_url = ?1",
            params![job_url],
            |row| Ok(JobRecord::from_row(row)),
        )
        .optional()?
        .transpose()
    })
}

/// Resolves a caller-supplied identifier: tries `job_id` first, then URL.
pub fn resolve(db: &Database, id_or_url: &str) -> Result<Option<JobRecord>, DatabaseError> {
    if let Some(record) = find(db, id_or_url)? {
        return Ok(Some(record));
    }
    find_by_url(db, id_or_url)
}

/// Lists jobs in the given status, oldest first, up to `limit`.
pub fn by_status(
    db: &Database,
    status: JobStatus,
    limit: u64,
) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = ?1 ORDER BY discovered_at ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![status.as_str(), limit as i64], |row| {
            Ok(JobRecord::from_row(row))
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    })
}

/// Lists all jobs, most recently discovered first, up to `limit`.
pub fn list(db: &Database, limit: u64) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs ORDER BY discovered_at DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| Ok(JobRecord::from_row(row)))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    })
}

/// Counts jobs per status for the summary view.
pub fn status_counts(db: &Database) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn stub(url: &str, platform: &str) -> NewJob {
        NewJob {
            job_url: url.to_string(),
            platform: platform.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_job_id_is_deterministic() {
        let a = derive_job_id("lever", "https://jobs.lever.co/acme/123");
        let b = derive_job_id("lever", "https://jobs.lever.co/acme/123");
        let c = derive_job_id("greenhouse", "https://jobs.lever.co/acme/123");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let db = test_db();
        let job = stub("https://example.test/jobs/1", "generic");

        assert!(insert_ignore(&db, &job).unwrap());
        assert!(!insert_ignore(&db, &job).unwrap());

        let all = list(&db, 100).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, JobStatus::Discovered);
    }

    #[test]
    fn test_find_and_resolve() {
        let db = test_db();
        let job = stub("https://example.test/jobs/2", "generic");
        insert_ignore(&db, &job).unwrap();
        let id = derive_job_id("generic", &job.job_url);

        assert!(find(&db, &id).unwrap().is_some());
        assert!(find(&db, "missing").unwrap().is_none());
        assert_eq!(resolve(&db, &job.job_url).unwrap().unwrap().job_id, id);
        assert_eq!(resolve(&db, &id).unwrap().unwrap().job_url, job.job_url);
    }

    #[test]
    fn test_patch_sets_stage_timestamp_once() {
        let db = test_db();
        let job = stub("https://example.test/jobs/3", "generic");
        insert_ignore(&db, &job).unwrap();
        let id = derive_job_id("generic", &job.job_url);

        let first = patch(
            &db,
            &id,
            &JobPatch {
                status: Some(JobStatus::Enriched),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        let stamp = first.enriched_at.clone().unwrap();

        // A second enrichment keeps the original stage timestamp.
        let second = patch(
            &db,
            &id,
            &JobPatch {
                status: Some(JobStatus::Enriched),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(second.enriched_at.unwrap(), stamp);
    }

    #[test]
    fn test_patch_merge_never_clears_identity_fields() {
        let db = test_db();
        let job = stub("https://example.test/jobs/4", "generic");
        insert_ignore(&db, &job).unwrap();
        let id = derive_job_id("generic", &job.job_url);

        patch(
            &db,
            &id,
            &JobPatch {
                title: Some("Staff Engineer".to_string()),
                location: Some("Remote".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        // Second enrichment returns an empty location; the stored value
        // must survive.
        let updated = patch(
            &db,
            &id,
            &JobPatch {
                title: Some("Staff Engineer II".to_string()),
                location: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.title, "Staff Engineer II");
        assert_eq!(updated.location, "Remote");
    }

    #[test]
    fn test_patch_metadata_merges_additively() {
        let db = test_db();
        let job = stub("https://example.test/jobs/5", "generic");
        insert_ignore(&db, &job).unwrap();
        let id = derive_job_id("generic", &job.job_url);

        let mut first = Map::new();
        first.insert("description".into(), Value::String("long text".into()));
        patch(
            &db,
            &id,
            &JobPatch {
                merge_metadata: Some(first),
                ..Default::default()
            },
        )
        .unwrap();

        let mut second = Map::new();
        second.insert("salary".into(), Value::String("$200k".into()));
        let updated = patch(
            &db,
            &id,
            &JobPatch {
                merge_metadata: Some(second),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.metadata.len(), 2);
        assert_eq!(
            updated.metadata.get("description").unwrap(),
            &Value::String("long text".into())
        );
    }

    #[test]
    fn test_artifacts_append_only() {
        let db = test_db();
        let job = stub("https://example.test/jobs/6", "generic");
        insert_ignore(&db, &job).unwrap();
        let id = derive_job_id("generic", &job.job_url);

        patch(
            &db,
            &id,
            &JobPatch {
                append_artifacts: vec!["run1/page.png".into()],
                ..Default::default()
            },
        )
        .unwrap();
        let updated = patch(
            &db,
            &id,
            &JobPatch {
                append_artifacts: vec!["run2/page.png".into(), "run2/page.html".into()],
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            updated.artifact_paths,
            vec!["run1/page.png", "run2/page.png", "run2/page.html"]
        );
    }

    #[test]
    fn test_by_status_and_counts() {
        let db = test_db();
        for i in 0..5 {
            insert_ignore(&db, &stub(&format!("https://example.test/jobs/q{}", i), "generic"))
                .unwrap();
        }
        let id = derive_job_id("generic", "https://example.test/jobs/q0");
        patch(
            &db,
            &id,
            &JobPatch {
                status: Some(JobStatus::Prepared),
                ..Default::default()
            },
        )
        .unwrap();

        let prepared = by_status(&db, JobStatus::Prepared, 10).unwrap();
        assert_eq!(prepared.len(), 1);

        let discovered = by_status(&db, JobStatus::Discovered, 2).unwrap();
        assert_eq!(discovered.len(), 2);

        let counts = status_counts(&db).unwrap();
        assert!(counts.contains(&("discovered".to_string(), 4)));
        assert!(counts.contains(&("prepared".to_string(), 1)));
    }

    #[test]
    fn test_patch_missing_job_returns_none() {
        let db = test_db();
        let result = patch(&db, "missing", &JobPatch::default()).unwrap();
        assert!(result.is_none());
    }
}
