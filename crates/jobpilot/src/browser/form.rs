//! Form model and the shared field-filling heuristic.
//!
//! Used by the generic apply adapter directly and by platform adapters
//! for everything their own flows don't special-case. The heuristic maps
//! normalized control labels to profile fields through an ordered
//! keyword table (first match wins), skips controls that already have a
//! value, and resolves dropdowns through a three-tier matching policy.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Profile;

use super::{BrowserError, BrowserSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    TextArea,
    Select,
    Checkbox,
    File,
    Button,
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// One visible form control, as resolved by the session backend.
#[derive(Debug, Clone)]
pub struct FormControl {
    pub control_id: String,
    /// Label resolved in precedence order: associated label, enclosing
    /// label, aria-label, placeholder, then name/id.
    pub label: String,
    pub kind: ControlKind,
    pub value: String,
    pub required: bool,
    pub visible: bool,
    pub enabled: bool,
    pub options: Vec<SelectOption>,
}

impl FormControl {
    fn fillable(&self) -> bool {
        self.visible && self.enabled && self.kind != ControlKind::Button
    }
}

/// Snapshot of the form on the current page/step.
#[derive(Debug, Clone)]
pub struct FormSnapshot {
    /// Step heading or page title, used for stuck detection.
    pub step_label: String,
    pub controls: Vec<FormControl>,
}

impl FormSnapshot {
    /// Stable identity of this step, fed to the stuck-form guard.
    pub fn fingerprint(&self) -> String {
        let ids: Vec<&str> = self.controls.iter().map(|c| c.control_id.as_str()).collect();
        format!("{}|{}", self.step_label, ids.join(","))
    }

    /// The final-submission button, if this step has one.
    pub fn submit_control(&self) -> Option<&FormControl> {
        self.find_button(&["submit", "apply", "send application", "finish"])
    }

    /// The next/continue button of a multi-step form.
    pub fn next_control(&self) -> Option<&FormControl> {
        self.find_button(&["next", "continue", "save and continue", "review"])
    }

    fn find_button(&self, keywords: &[&str]) -> Option<&FormControl> {
        self.controls
            .iter()
            .filter(|c| c.kind == ControlKind::Button && c.visible && c.enabled)
            .find(|c| {
                let label = normalize_label(&c.label);
                keywords.iter().any(|k| label.contains(k))
            })
    }
}

/// Lowercases, strips punctuation, and collapses whitespace so label
/// variants ("E-mail *", "email_address") land on the same keywords.
pub fn normalize_label(raw: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());
    re.replace_all(&raw.to_lowercase(), " ").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileField {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Location,
    Linkedin,
    Github,
    Website,
    CurrentCompany,
    CurrentTitle,
    YearsExperience,
    Salary,
    Sponsorship,
    WorkAuthorization,
    Summary,
    Resume,
}

/// Ordered keyword table. Order is significant: more specific labels
/// ("first name") must appear before generic ones ("name").
const FILL_RULES: &[(&[&str], ProfileField)] = &[
    (&["first name", "given name"], ProfileField::FirstName),
    (&["last name", "family name", "surname"], ProfileField::LastName),
    (&["full name", "your name", "name"], ProfileField::FullName),
    (&["email", "e mail"], ProfileField::Email),
    (&["phone", "mobile", "telephone"], ProfileField::Phone),
    (&["resume", "cv", "curriculum vitae"], ProfileField::Resume),
    (&["linkedin"], ProfileField::Linkedin),
    (&["github"], ProfileField::Github),
    (&["website", "portfolio", "personal site"], ProfileField::Website),
    (&["current company", "employer", "company"], ProfileField::CurrentCompany),
    (&["current title", "job title", "current role"], ProfileField::CurrentTitle),
    (&["years of experience", "experience"], ProfileField::YearsExperience),
    (&["salary", "compensation", "expected pay"], ProfileField::Salary),
    (&["sponsorship", "visa"], ProfileField::Sponsorship),
    (
        &["authorized to work", "work authorization", "legally authorized", "eligible to work"],
        ProfileField::WorkAuthorization,
    ),
    (&["city", "location", "address"], ProfileField::Location),
    (&["summary", "about you", "tell us about yourself"], ProfileField::Summary),
];

fn match_rule(normalized_label: &str) -> Option<ProfileField> {
    for (keywords, field) in FILL_RULES {
        if keywords.iter().any(|k| normalized_label.contains(k)) {
            return Some(*field);
        }
    }
    None
}

fn profile_value(profile: &Profile, field: ProfileField) -> Option<String> {
    match field {
        ProfileField::FirstName => profile
            .full_name
            .split_whitespace()
            .next()
            .map(str::to_string),
        ProfileField::LastName => {
            let mut parts = profile.full_name.split_whitespace();
            let first = parts.next();
            let last = parts.last();
            last.or(first).map(str::to_string)
        }
        ProfileField::FullName => Some(profile.full_name.clone()),
        ProfileField::Email => Some(profile.email.clone()),
        ProfileField::Phone => profile.phone.clone(),
        ProfileField::Location => profile.location.clone(),
        ProfileField::Linkedin => profile.linkedin.clone(),
        ProfileField::Github => profile.github.clone(),
        ProfileField::Website => profile.website.clone(),
        ProfileField::CurrentCompany => profile.current_company.clone(),
        ProfileField::CurrentTitle => profile.current_title.clone(),
        ProfileField::YearsExperience => profile.years_experience.map(|y| y.to_string()),
        ProfileField::Salary => profile.salary_expectation.clone(),
        ProfileField::Sponsorship => Some(yes_no(profile.requires_sponsorship)),
        ProfileField::WorkAuthorization => Some(yes_no(profile.work_authorized)),
        ProfileField::Summary => profile.summary.clone(),
        ProfileField::Resume => None,
    }
}

fn yes_no(v: bool) -> String {
    if v { "Yes".to_string() } else { "No".to_string() }
}

/// Checks the free-form `extra` answers for a key contained in the label.
fn extra_value(profile: &Profile, normalized_label: &str) -> Option<String> {
    profile
        .extra
        .iter()
        .find(|(k, _)| normalized_label.contains(&normalize_label(k)))
        .map(|(_, v)| v.clone())
}

/// How a dropdown answer was resolved, surfaced so a human reviewer can
/// spot guessed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMatchTier {
    Exact,
    Synonym,
    Substring,
    FallbackFirst,
}

/// Three-tier dropdown matching: exact value/text, keyword-group
/// synonyms, then substring containment. Returns the option value.
pub fn match_select_option<'a>(
    options: &'a [SelectOption],
    desired: &str,
) -> Option<(&'a SelectOption, OptionMatchTier)> {
    let desired_lower = desired.to_lowercase();

    // Tier 1: exact value or text match.
    if let Some(opt) = options.iter().filter(|o| !is_placeholder_option(o)).find(|o| {
        o.value.to_lowercase() == desired_lower || o.text.to_lowercase() == desired_lower
    }) {
        return Some((opt, OptionMatchTier::Exact));
    }

    // Tier 2: keyword-group fuzzy match (yes/authorized/eligible synonyms).
    const SYNONYM_GROUPS: &[&[&str]] = &[
        &["yes", "authorized", "eligible", "i am", "agree"],
        &["no", "not authorized", "not eligible", "none", "decline"],
    ];
    for group in SYNONYM_GROUPS {
        if group.iter().any(|s| desired_lower == *s || desired_lower.contains(s)) {
            if let Some(opt) = options.iter().filter(|o| !is_placeholder_option(o)).find(|o| {
                let text = o.text.to_lowercase();
                group.iter().any(|s| text == *s || text.starts_with(s))
            }) {
                return Some((opt, OptionMatchTier::Synonym));
            }
        }
    }

    // Tier 3: substring containment either way.
    if desired_lower.len() > 2 {
        if let Some(opt) = options.iter().filter(|o| !is_placeholder_option(o)).find(|o| {
            let text = o.text.to_lowercase();
            text.contains(&desired_lower) || desired_lower.contains(&text)
        }) {
            return Some((opt, OptionMatchTier::Substring));
        }
    }

    None
}

/// First real (non-placeholder) option, the last-resort answer for a
/// required dropdown nothing matched.
pub fn first_real_option(options: &[SelectOption]) -> Option<&SelectOption> {
    options.iter().find(|o| !is_placeholder_option(o))
}

fn is_placeholder_option(option: &SelectOption) -> bool {
    if option.value.trim().is_empty() {
        return true;
    }
    let text = option.text.trim().to_lowercase();
    text.is_empty()
        || text.starts_with("select")
        || text.starts_with("choose")
        || text.starts_with("please")
        || text.starts_with('-')
}

/// Outcome of one fill pass over a form step.
#[derive(Debug, Clone, Default)]
pub struct FillReport {
    pub filled: Vec<String>,
    pub attached: Vec<String>,
    /// Labels answered via the required-field fallback; a human reviewer
    /// should double-check these.
    pub guessed: Vec<String>,
    pub skipped_prefilled: Vec<String>,
    pub unmatched: Vec<String>,
}

impl FillReport {
    pub fn merge(&mut self, other: FillReport) {
        self.filled.extend(other.filled);
        self.attached.extend(other.attached);
        self.guessed.extend(other.guessed);
        self.skipped_prefilled.extend(other.skipped_prefilled);
        self.unmatched.extend(other.unmatched);
    }

    /// One-line summary for the Job Record notes field.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "filled {} field(s), attached {} file(s)",
            self.filled.len(),
            self.attached.len()
        );
        if !self.guessed.is_empty() {
            s.push_str(&format!("; guessed answers: {}", self.guessed.join(", ")));
        }
        if !self.unmatched.is_empty() {
            s.push_str(&format!("; unmatched: {}", self.unmatched.join(", ")));
        }
        s
    }
}

/// Fills one form step from the profile. Does not click anything.
pub async fn fill_form(
    session: &dyn BrowserSession,
    snapshot: &FormSnapshot,
    profile: &Profile,
    resume_path: Option<&str>,
) -> Result<FillReport, BrowserError> {
    let mut report = FillReport::default();

    for control in &snapshot.controls {
        if !control.fillable() {
            continue;
        }
        if !control.value.trim().is_empty() {
            report.skipped_prefilled.push(control.label.clone());
            continue;
        }

        let normalized = normalize_label(&control.label);
        let field = match_rule(&normalized);

        if control.kind == ControlKind::File {
            if let (Some(ProfileField::Resume), Some(path)) = (field, resume_path) {
                session.set_control(&control.control_id, path).await?;
                report.attached.push(control.label.clone());
            }
            continue;
        }

        let desired = field
            .and_then(|f| profile_value(profile, f))
            .or_else(|| extra_value(profile, &normalized));

        match control.kind {
            ControlKind::Select => {
                let matched = desired
                    .as_deref()
                    .and_then(|d| match_select_option(&control.options, d));
                if let Some((opt, _tier)) = matched {
                    session
                        .select_option(&control.control_id, &opt.value)
                        .await?;
                    report.filled.push(control.label.clone());
                } else if control.required {
                    if let Some(opt) = first_real_option(&control.options) {
                        session
                            .select_option(&control.control_id, &opt.value)
                            .await?;
                        report.guessed.push(control.label.clone());
                    } else {
                        report.unmatched.push(control.label.clone());
                    }
                } else {
                    report.unmatched.push(control.label.clone());
                }
            }
            ControlKind::Checkbox => {
                // Only tick when we have an affirmative answer.
                if desired.as_deref().is_some_and(|d| d.eq_ignore_ascii_case("yes")) {
                    session.set_control(&control.control_id, "true").await?;
                    report.filled.push(control.label.clone());
                } else {
                    report.unmatched.push(control.label.clone());
                }
            }
            _ => {
                if let Some(value) = desired {
                    session.set_control(&control.control_id, &value).await?;
                    report.filled.push(control.label.clone());
                } else {
                    report.unmatched.push(control.label.clone());
                }
            }
        }
    }

    Ok(report)
}

/// Positive success confirmation after a submit click. Platform UIs
/// change; the phrase table is intentionally centralized here.
pub fn confirm_submission(page_text: &str) -> bool {
    const SUCCESS_PHRASES: &[&str] = &[
        "application sent",
        "application received",
        "application submitted",
        "thank you for applying",
        "successfully submitted",
        "we have received your application",
    ];
    let lower = page_text.to_lowercase();
    SUCCESS_PHRASES.iter().any(|p| lower.contains(p))
}

/// Platform "already applied" marker, used for idempotent re-entry.
pub fn already_applied(page_text: &str) -> bool {
    const MARKERS: &[&str] = &[
        "already applied",
        "you have already applied",
        "application already submitted",
        "you've applied",
    ];
    let lower = page_text.to_lowercase();
    MARKERS.iter().any(|p| lower.contains(p))
}
