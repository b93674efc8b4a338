//! Lever adapter.
//!
//! Discovery and enrichment use the public postings API
//! (`api.lever.co/v0/postings`). Apply navigates to the posting's
//! `/apply` page and hands off to the shared form flow.

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

const POSTINGS_API: &str = "https://api.lever.co/v0/postings";

pub struct Lever {
    client: reqwest::Client,
}

impl Lever {
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

/// Extracts `(company, posting_id)` from a hosted posting URL, with or
/// without a trailing `/apply` segment. Both the US and EU hosted
/// domains are recognized.
fn parse_job_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .split_once("jobs.lever.co/")
        .or_else(|| url.split_once("jobs.eu.lever.co/"))
        .map(|(_, rest)| rest)?;
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let company = segments.next()?;
    let id = segments.next()?;
    match segments.next() {
        None | Some("apply") => Some((company.to_string(), id.to_string())),
        Some(_) => None,
    }
}

fn item_location(item: &Value) -> String {
    item.get("categories")
        .and_then(|c| c.get("location"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parses the postings listing (a bare JSON array). Malformed items are
/// logged and skipped.
fn parse_postings(board: &str, payload: &Value, limit: usize) -> Result<Vec<JobStub>, String> {
    let postings = payload.as_array().ok_or("expected a JSON array")?;

    let mut stubs = Vec::new();
    for item in postings {
        if stubs.len() >= limit {
            break;
        }
        let (Some(url), Some(title)) = (
            item.get("hostedUrl").and_then(Value::as_str),
            item.get("text").and_then(Value::as_str),
        ) else {
            log::warn!("Skipping malformed posting on board '{}'", board);
            continue;
        };
        stubs.push(JobStub {
            job_url: url.to_string(),
            title: title.to_string(),
            company: board.to_string(),
            location: item_location(item),
        });
    }
    Ok(stubs)
}

fn parse_posting_detail(company: &str, payload: &Value) -> Result<JobDetail, String> {
    let title = payload
        .get("text")
        .and_then(Value::as_str)
        .ok_or("missing 'text'")?;
    let description = payload
        .get("descriptionPlain")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(JobDetail {
        title: title.to_string(),
        company: company.to_string(),
        location: item_location(payload),
        description: description.to_string(),
    })
}

#[async_trait]
impl JobSource for Lever {
    fn name(&self) -> &'static str {
        "lever"
    }

    fn can_handle_url(&self, url: &str) -> bool {
        url.contains("jobs.lever.co") || url.contains("jobs.eu.lever.co")
    }

    fn supports_discovery(&self) -> bool {
        true
    }

    fn supports_enrichment(&self) -> bool {
        true
    }

    async fn discover(&self, criteria: &DiscoveryCriteria) -> Result<Vec<JobStub>, AdapterError> {
        let url = format!("{}/{}?mode=json", POSTINGS_API, criteria.board);
        let payload = self.fetch_json(&url).await?;
        parse_postings(&criteria.board, &payload, criteria.limit).map_err(|reason| {
            AdapterError::UnexpectedPayload {
                url,
                reason: reason.to_string(),
            }
        })
    }

    async fn enrich(&self, job_url: &str) -> Result<JobDetail, AdapterError> {
        let (company, id) = parse_job_url(job_url).ok_or_else(|| AdapterError::UnrecognizedUrl {
            url: job_url.to_string(),
            adapter: "lever",
        })?;
        let url = format!("{}/{}/{}", POSTINGS_API, company, id);
        let payload = self.fetch_json(&url).await?;
        parse_posting_detail(&company, &payload).map_err(|reason| {
            AdapterError::UnexpectedPayload {
                url,
                reason: reason.to_string(),
            }
        })
    }
}

#[async_trait]
impl ApplyAdapter for Lever {
    fn name(&self) -> &'static str {
        "lever"
    }

    fn can_handle_url(&self, url: &str) -> bool {
        url.contains("jobs.lever.co") || url.contains("jobs.eu.lever.co")
    }

    async fn apply(
        &self,
        job: &JobRecord,
        request: &ApplyRequest<'_>,
        session: &dyn BrowserSession,
    ) -> Result<ApplyReport, AdapterError> {
        // The application form lives on the /apply page, not the posting.
        let start_url = if job.job_url.trim_end_matches('/').ends_with("/apply") {
            job.job_url.clone()
        } else {
            format!("{}/apply", job.job_url.trim_end_matches('/'))
        };
        run_apply_flow(&start_url, request, session).await
    }
}
