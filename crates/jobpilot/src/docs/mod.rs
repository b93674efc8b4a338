//! Application document generation.
//!
//! Produces a tailored resume and cover letter per job as Markdown.
//! Rendering is pure; the trait seam exists so a richer builder (PDF,
//! templated) can be swapped in without touching the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Profile;
use crate::db::JobRecord;
use crate::error::DocumentError;

/// Paths of the documents generated for one job.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    pub resume_path: PathBuf,
    pub cover_letter_path: PathBuf,
}

pub trait DocumentBuilder: Send + Sync {
    /// Writes the document set for `job` under `output_dir` and returns
    /// the paths. Re-running overwrites the previous set in place.
    fn build(
        &self,
        job: &JobRecord,
        output_dir: &Path,
        profile: &Profile,
    ) -> Result<DocumentSet, DocumentError>;
}

pub struct MarkdownDocumentBuilder;

impl MarkdownDocumentBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder for MarkdownDocumentBuilder {
    fn build(
        &self,
        job: &JobRecord,
        output_dir: &Path,
        profile: &Profile,
    ) -> Result<DocumentSet, DocumentError> {
        fs::create_dir_all(output_dir).map_err(|e| DocumentError::CreateDirectory {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let resume_path = output_dir.join("resume.md");
        let cover_letter_path = output_dir.join("cover_letter.md");

        let description = job
            .metadata
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        fs::write(&resume_path, render_resume(job, profile, description)).map_err(|e| {
            DocumentError::WriteDocument {
                path: resume_path.clone(),
                source: e,
            }
        })?;
        fs::write(
            &cover_letter_path,
            render_cover_letter(job, profile, description),
        )
        .map_err(|e| DocumentError::WriteDocument {
            path: cover_letter_path.clone(),
            source: e,
        })?;

        log::info!(
            "Generated documents for job {} in {}",
            job.job_id,
            output_dir.display()
        );
        Ok(DocumentSet {
            resume_path,
            cover_letter_path,
        })
    }
}

/// Skills mentioned in the job description come first, the rest keep
/// their profile order.
fn relevant_skills(profile: &Profile, description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let (mut matched, rest): (Vec<_>, Vec<_>) = profile
        .skills
        .iter()
        .cloned()
        .partition(|s| lower.contains(&s.to_lowercase()));
    matched.extend(rest);
    matched
}

fn job_title(job: &JobRecord) -> &str {
    if job.title.is_empty() {
        "the open position"
    } else {
        &job.title
    }
}

fn job_company(job: &JobRecord) -> &str {
    if job.company.is_empty() {
        "your company"
    } else {
        &job.company
    }
}

fn render_resume(job: &JobRecord, profile: &Profile, description: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", profile.full_name));

    let mut contact = vec![profile.email.clone()];
    if let Some(phone) = &profile.phone {
        contact.push(phone.clone());
    }
    if let Some(location) = &profile.location {
        contact.push(location.clone());
    }
    out.push_str(&contact.join(" | "));
    out.push_str("\n\n");

    for (label, link) in [
        ("LinkedIn", &profile.linkedin),
        ("GitHub", &profile.github),
        ("Website", &profile.website),
    ] {
        if let Some(url) = link {
            out.push_str(&format!("- {}: {}\n", label, url));
        }
    }
    out.push('\n');

    out.push_str(&format!(
        "## Objective\n\n{} at {}\n\n",
        job_title(job),
        job_company(job)
    ));

    if let Some(summary) = &profile.summary {
        out.push_str(&format!("## Summary\n\n{}\n\n", summary));
    }

    let skills = relevant_skills(profile, description);
    if !skills.is_empty() {
        out.push_str("## Skills\n\n");
        for skill in &skills {
            out.push_str(&format!("- {}\n", skill));
        }
        out.push('\n');
    }

    if let (Some(title), Some(company)) = (&profile.current_title, &profile.current_company) {
        out.push_str(&format!("## Experience\n\n**{}**, {}", title, company));
        if let Some(years) = profile.years_experience {
            out.push_str(&format!(" ({} years of experience)", years));
        }
        out.push_str("\n\n");
    }

    out
}

fn render_cover_letter(job: &JobRecord, profile: &Profile, description: &str) -> String {
    let title = job_title(job);
    let company = job_company(job);
    let mut out = String::new();

    out.push_str(&format!("# Cover Letter: {} at {}\n\n", title, company));
    out.push_str("Dear Hiring Team,\n\n");
    out.push_str(&format!(
        "I am writing to apply for the {} role at {}.",
        title, company
    ));

    if let Some(summary) = &profile.summary {
        out.push_str(&format!(" {}", summary));
    }
    out.push_str("\n\n");

    let skills = relevant_skills(profile, description);
    if !skills.is_empty() {
        let highlighted: Vec<&str> = skills.iter().take(4).map(String::as_str).collect();
        out.push_str(&format!(
            "My background in {} maps directly onto what this role calls for.\n\n",
            highlighted.join(", ")
        ));
    }

    out.push_str(&format!(
        "I would welcome the chance to discuss how I can contribute at {}.\n\n",
        company
    ));
    out.push_str(&format!("Sincerely,\n{}\n", profile.full_name));
    out
}
