//! Greenhouse adapter.
//!
//! Discovery and enrichment go through the public boards API
//! (`boards-api.greenhouse.io`), which serves plain JSON and needs no
//! authentication. Apply drives the hosted posting page through the
//! shared form flow; Greenhouse renders the application form on the
//! posting page itself.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::BrowserSession;
use crate::db::JobRecord;

use super::generic::run_apply_flow;
use super::{
    AdapterError, ApplyAdapter, ApplyReport, ApplyRequest, DiscoveryCriteria, JobDetail,
    JobSource, JobStub,
};

const BOARDS_API: &str = "https://boards-api.greenhouse.io/v1/boards";

pub struct Greenhouse {
    client: reqwest::Client,
}

impl Greenhouse {
    pub fn new(timeout_ms: u64) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(AdapterError::ClientBuild)?;
        Ok(Self { client })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, AdapterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AdapterError::Http {
                url: url.to_string(),
                source: e,
            })?;
        response.json().await.map_err(|e| AdapterError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Extracts `(board, job_id)` from a hosted posting URL. Both hosted
/// domains are in the wild: `boards.greenhouse.io/{board}/jobs/{id}`
/// and `job-boards.greenhouse.io/{board}/jobs/{id}`.
fn parse_job_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .split_once("boards.greenhouse.io/")
        .or_else(|| url.split_once("job-boards.greenhouse.io/"))
        .map(|(_, rest)| rest)?;
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let board = segments.next()?;
    if segments.next()? != "jobs" {
        return None;
    }
    let id = segments.next()?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((board.to_string(), id.to_string()))
}

/// Parses the board listing payload. Malformed items are logged and
/// skipped rather than failing the batch.
fn parse_board_listing(board: &str, payload: &Value, limit: usize) -> Result<Vec<JobStub>, String> {
    let jobs = payload
        .get("jobs")
        .and_then(Value::as_array)
        .ok_or("missing 'jobs' array")?;

    let mut stubs = Vec::new();
    for item in jobs {
        if stubs.len() >= limit {
            break;
        }
        let (Some(url), Some(title)) = (
            item.get("absolute_url").and_then(Value::as_str),
            item.get("title").and_then(Value::as_str),
        ) else {
            log::warn!("Skipping malformed listing item on board '{}'", board);
            continue;
        };
        let location = item
            .get("location")
            .and_then(|l| l.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        stubs.push(JobStub {
            job_url: url.to_string(),
            title: title.to_string(),
            company: board.to_string(),
            location: location.to_string(),
        });
    }
    Ok(stubs)
}

fn parse_job_detail(board: &str, payload: &Value) -> Result<JobDetail, String> {
    let title = payload
        .get("title")
        .and_then(Value::as_str)
        .ok_or("missing 'title'")?;
    let location = payload
        .get("location")
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let description = payload
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(JobDetail {
        title: title.to_string(),
        company: board.to_string(),
        location: location.to_string(),
        description: description.to_string(),
    })
}

#[async_trait]
impl JobSource for Greenhouse {
    fn name(&self) -> &'static str {
        "greenhouse"
    }

    fn can_handle_url(&self, url: &str) -> bool {
        url.contains("greenhouse.io")
    }

    fn supports_discovery(&self) -> bool {
        true
    }

    fn supports_enrichment(&self) -> bool {
        true
    }

    async fn discover(&self, criteria: &DiscoveryCriteria) -> Result<Vec<JobStub>, AdapterError> {
        let url = format!("{}/{}/jobs", BOARDS_API, criteria.board);
        let payload = self.fetch_json(&url).await?;
        parse_board_listing(&criteria.board, &payload, criteria.limit).map_err(|reason| {
            AdapterError::UnexpectedPayload {
                url,
                reason: reason.to_string(),
            }
        })
    }

    async fn enrich(&self, job_url: &str) -> Result<JobDetail, AdapterError> {
        let (board, id) = parse_job_url(job_url).ok_or_else(|| AdapterError::UnrecognizedUrl {
            url: job_url.to_string(),
            adapter: "greenhouse",
        })?;
        let url = format!("{}/{}/jobs/{}", BOARDS_API, board, id);
        let payload = self.fetch_json(&url).await?;
        parse_job_detail(&board, &payload).map_err(|reason| AdapterError::UnexpectedPayload {
            url,
            reason: reason.to_string(),
        })
    }
}

#[async_trait]
impl ApplyAdapter for Greenhouse {
    fn name(&self) -> &'static str {
        "greenhouse"
    }

    fn can_handle_url(&self, url: &str) -> bool {
        url.contains("greenhouse.io")
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_job_url_boards_host() {
        let parsed = parse_job_url("https://boards.greenhouse.io/acme/jobs/4021857008");
        assert_eq!(
            parsed,
            Some(("acme".to_string(), "4021857008".to_string()))
        );
    }

    #[test]
    fn test_parse_job_url_job_boards_host_with_query() {
        let parsed =
            parse_job_url("https://job-boards.greenhouse.io/acme/jobs/4021857008?gh_src=abc");
        assert_eq!(
            parsed,
            Some(("acme".to_string(), "4021857008".to_string()))
        );
    }

    #[test]
    fn test_parse_job_url_rejects_foreign_urls() {
        assert_eq!(parse_job_url("https://jobs.lever.co/acme/abc"), None);
        assert_eq!(parse_job_url("https://boards.greenhouse.io/acme"), None);
        assert_eq!(
            parse_job_url("https://boards.greenhouse.io/acme/jobs/not-a-number"),
            None
        );
    }

    #[test]
    fn test_parse_board_listing() {
        let payload = json!({
            "jobs": [
                {
                    "id": 1,
                    "title": "Senior Engineer",
                    "absolute_url": "https://boards.greenhouse.io/acme/jobs/1",
                    "location": { "name": "Remote" }
                },
                {
                    "id": 2,
                    "title": "Staff Engineer",
                    "absolute_url": "https://boards.greenhouse.io/acme/jobs/2",
                    "location": { "name": "Berlin" }
                }
            ]
        });
        let stubs = parse_board_listing("acme", &payload, 10).unwrap();
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].title, "Senior Engineer");
        assert_eq!(stubs[0].company, "acme");
        assert_eq!(stubs[1].location, "Berlin");
    }

    #[test]
    fn test_parse_board_listing_skips_malformed_items() {
        let payload = json!({
            "jobs": [
                { "id": 1, "title": "Missing URL" },
                {
                    "id": 2,
                    "title": "Good",
                    "absolute_url": "https://boards.greenhouse.io/acme/jobs/2"
                }
            ]
        });
        let stubs = parse_board_listing("acme", &payload, 10).unwrap();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "Good");
    }

    #[test]
    fn test_parse_board_listing_respects_limit() {
        let payload = json!({
            "jobs": [
                { "title": "A", "absolute_url": "https://boards.greenhouse.io/acme/jobs/1" },
                { "title": "B", "absolute_url": "https://boards.greenhouse.io/acme/jobs/2" },
                { "title": "C", "absolute_url": "https://boards.greenhouse.io/acme/jobs/3" }
            ]
        });
        let stubs = parse_board_listing("acme", &payload, 2).unwrap();
        assert_eq!(stubs.len(), 2);
    }

    #[test]
    fn test_parse_board_listing_rejects_bad_shape() {
        let payload = json!({ "postings": [] });
        assert!(parse_board_listing("acme", &payload, 10).is_err());
    }

    #[test]
    fn test_parse_job_detail() {
        let payload = json!({
            "title": "Senior Engineer",
            "location": { "name": "Remote" },
            "content": "<p>Build things.</p>"
        });
        let detail = parse_job_detail("acme", &payload).unwrap();
        assert_eq!(detail.title, "Senior Engineer");
        assert_eq!(detail.company, "acme");
        assert_eq!(detail.location, "Remote");
        assert!(detail.description.contains("Build things"));
    }

    #[test]
    fn test_parse_job_detail_requires_title() {
        let payload = json!({ "content": "no title here" });
        assert!(parse_job_detail("acme", &payload).is_err());
    }
}
