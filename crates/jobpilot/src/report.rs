//! Tracker exports for external review.
//!
//! Both exports are full snapshots of the jobs table, written to
//! timestamped files so successive runs never overwrite each other. The
//! CSV and JSON exports carry the same fields.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::db::{job_repo, Database, DatabaseError, JobRecord};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

const EXPORT_LIMIT: u64 = 100_000;

const CSV_HEADER: &str = "job_id,job_url,platform,company,title,location,status,\
status_detail,failure_category,notes,discovered_at,enriched_at,prepared_at,\
applied_at,updated_at,resume_path,cover_letter_path,artifact_paths,metadata";

fn timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

fn ensure_dir(dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(dir).map_err(|e| ReportError::Io {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Writes all job records as pretty-printed JSON. Returns the file path.
pub fn export_json(db: &Database, dir: &Path) -> Result<PathBuf, ReportError> {
    ensure_dir(dir)?;
    let records = job_repo::list(db, EXPORT_LIMIT)?;
    let path = dir.join(format!("jobs-{}.json", timestamp()));
    let body = serde_json::to_string_pretty(&records)?;
    fs::write(&path, body).map_err(|e| ReportError::Io {
        path: path.clone(),
        source: e,
    })?;
    log::info!("Exported {} jobs to {}", records.len(), path.display());
    Ok(path)
}

/// Writes all job records as CSV with the same field set as the JSON
/// export. Returns the file path.
pub fn export_csv(db: &Database, dir: &Path) -> Result<PathBuf, ReportError> {
    ensure_dir(dir)?;
    let records = job_repo::list(db, EXPORT_LIMIT)?;
    let path = dir.join(format!("jobs-{}.csv", timestamp()));

    let mut body = String::from(CSV_HEADER);
    body.push('\n');
    for record in &records {
        body.push_str(&csv_row(record));
        body.push('\n');
    }

    fs::write(&path, body).map_err(|e| ReportError::Io {
        path: path.clone(),
        source: e,
    })?;
    log::info!("Exported {} jobs to {}", records.len(), path.display());
    Ok(path)
}

fn csv_row(r: &JobRecord) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let fields = [
        r.job_id.clone(),
        r.job_url.clone(),
        r.platform.clone(),
        r.company.clone(),
        r.title.clone(),
        r.location.clone(),
        r.status.to_string(),
        opt(&r.status_detail),
        opt(&r.failure_category),
        opt(&r.notes),
        r.discovered_at.clone(),
        opt(&r.enriched_at),
        opt(&r.prepared_at),
        opt(&r.applied_at),
        r.updated_at.clone(),
        opt(&r.resume_path),
        opt(&r.cover_letter_path),
        r.artifact_paths.join(";"),
        serde_json::Value::Object(r.metadata.clone()).to_string(),
    ];
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// RFC 4180 quoting: fields containing a comma, quote, or newline are
/// wrapped in quotes with embedded quotes doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{JobPatch, JobStatus, NewJob};

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        job_repo::insert_ignore(
            &db,
            &NewJob {
                job_url: "https://example.test/jobs/1".to_string(),
                platform: "generic".to_string(),
                company: "Acme, Inc.".to_string(),
                title: "Engineer \"Systems\"".to_string(),
                location: "Remote".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        db
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn test_export_json_parses_back() {
        let db = seeded_db();
        let tmp = tempfile::tempdir().unwrap();
        let path = export_json(&db, tmp.path()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["company"], "Acme, Inc.");
        assert_eq!(parsed[0]["status"], "discovered");
    }

    #[test]
    fn test_export_csv_quotes_special_fields() {
        let db = seeded_db();
        let id = crate::db::job_repo::derive_job_id("generic", "https://example.test/jobs/1");
        job_repo::patch(
            &db,
            &id,
            &JobPatch {
                status: Some(JobStatus::Failed),
                status_detail: Some("line1\nline2".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = export_csv(&db, tmp.path()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("job_id,job_url,platform"));
        assert!(body.contains("\"Acme, Inc.\""));
        assert!(body.contains("\"Engineer \"\"Systems\"\"\""));
        assert!(body.contains("\"line1\nline2\""));
    }

    #[test]
    fn test_exports_share_field_set() {
        let header_fields = CSV_HEADER.split(',').count();
        // JSON objects serialize every JobRecord field; the CSV header
        // must stay in lockstep.
        let db = seeded_db();
        let record = job_repo::list(&db, 1).unwrap().remove(0);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value.as_object().unwrap().len(), header_fields);
    }

    #[test]
    fn test_timestamped_filenames_do_not_collide_with_content() {
        let db = seeded_db();
        let tmp = tempfile::tempdir().unwrap();
        let json = export_json(&db, tmp.path()).unwrap();
        let csv = export_csv(&db, tmp.path()).unwrap();
        assert_ne!(json, csv);
        assert!(json.extension().unwrap() == "json");
        assert!(csv.extension().unwrap() == "csv");
    }
}
