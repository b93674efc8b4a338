use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Tracker database location. Defaults to `~/.jobpilot/data/jobpilot.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Root directory for generated application documents (one subdir per job).
    pub output_directory: PathBuf,
    #[serde(default = "default_reports_directory")]
    pub reports_directory: PathBuf,
    pub profile: Profile,
    #[serde(default)]
    pub apply: ApplySettings,
    /// Timeout for discovery/enrichment HTTP requests.
    #[serde(default = "default_enrichment_timeout_ms")]
    pub enrichment_timeout_ms: u64,
}

fn default_reports_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_enrichment_timeout_ms() -> u64 {
    15_000
}

/// Applicant contact and work-history data consumed by form filling
/// and document generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub current_company: Option<String>,
    #[serde(default)]
    pub current_title: Option<String>,
    #[serde(default)]
    pub years_experience: Option<u32>,
    #[serde(default = "default_true")]
    pub work_authorized: bool,
    #[serde(default)]
    pub requires_sponsorship: bool,
    #[serde(default)]
    pub salary_expectation: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Free-form answers for platform-specific questions, keyed by keyword.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Fill the form but stop before final submission (the default).
    #[default]
    Assisted,
    /// Fill and submit.
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySettings {
    #[serde(default)]
    pub mode: ApplyMode,
    /// Hard ceiling on multi-step form iterations.
    #[serde(default = "default_max_form_steps")]
    pub max_form_steps: u32,
    /// Number of identical consecutive steps before the form counts as stuck.
    #[serde(default = "default_step_repeat_threshold")]
    pub step_repeat_threshold: u32,
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,
    #[serde(default = "default_navigation_retry_delay_ms")]
    pub navigation_retry_delay_ms: u64,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    /// Randomized pause bounds between successive batch applies.
    #[serde(default = "default_min_apply_delay_ms")]
    pub min_apply_delay_ms: u64,
    #[serde(default = "default_max_apply_delay_ms")]
    pub max_apply_delay_ms: u64,
}

fn default_max_form_steps() -> u32 {
    8
}

fn default_step_repeat_threshold() -> u32 {
    3
}

fn default_navigation_retries() -> u32 {
    2
}

fn default_navigation_retry_delay_ms() -> u64 {
    2_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_min_apply_delay_ms() -> u64 {
    4_000
}

fn default_max_apply_delay_ms() -> u64 {
    12_000
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            mode: ApplyMode::Assisted,
            max_form_steps: default_max_form_steps(),
            step_repeat_threshold: default_step_repeat_threshold(),
            navigation_retries: default_navigation_retries(),
            navigation_retry_delay_ms: default_navigation_retry_delay_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            min_apply_delay_ms: default_min_apply_delay_ms(),
            max_apply_delay_ms: default_max_apply_delay_ms(),
        }
    }
}

impl Config {
    /// Resolved database path, falling back to the canonical location.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}
