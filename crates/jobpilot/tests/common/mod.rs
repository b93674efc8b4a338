//! Shared helpers for pipeline integration tests: a scripted browser
//! session built on the public contracts, plus config and form builders.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use jobpilot::browser::form::{ControlKind, FormControl, FormSnapshot};
use jobpilot::browser::ArtifactPaths;
use jobpilot::{
    BrowserError, BrowserLauncher, BrowserSession, Config, FrictionKind, SessionOptions,
};

/// One scripted page. Any click advances the session to the next page.
#[derive(Clone)]
pub struct Page {
    pub friction: FrictionKind,
    pub text: String,
    pub form: Option<FormSnapshot>,
}

impl Page {
    pub fn with_form(text: &str, form: FormSnapshot) -> Self {
        Self {
            friction: FrictionKind::None,
            text: text.to_string(),
            form: Some(form),
        }
    }

    pub fn terminal(text: &str) -> Self {
        Self {
            friction: FrictionKind::None,
            text: text.to_string(),
            form: None,
        }
    }

    pub fn friction(mut self, kind: FrictionKind) -> Self {
        self.friction = kind;
        self
    }
}

pub struct ScenarioSession {
    pages: Vec<Page>,
    index: Mutex<usize>,
}

impl ScenarioSession {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages,
            index: Mutex::new(0),
        }
    }

    fn page(&self) -> Page {
        let index = *self.index.lock().unwrap();
        self.pages[index.min(self.pages.len() - 1)].clone()
    }
}

#[async_trait]
impl BrowserSession for ScenarioSession {
    async fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok("https://example.test/apply".to_string())
    }

    async fn page_text(&self) -> Result<String, BrowserError> {
        Ok(self.page().text)
    }

    async fn form_snapshot(&self) -> Result<Option<FormSnapshot>, BrowserError> {
        Ok(self.page().form)
    }

    async fn set_control(&self, _control_id: &str, _value: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn select_option(
        &self,
        _control_id: &str,
        _option_value: &str,
    ) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click(&self, _control_id: &str) -> Result<(), BrowserError> {
        let mut index = self.index.lock().unwrap();
        if *index + 1 < self.pages.len() {
            *index += 1;
        }
        Ok(())
    }

    async fn capture_artifacts(
        &self,
        dir: &Path,
        label: &str,
    ) -> Result<ArtifactPaths, BrowserError> {
        std::fs::create_dir_all(dir).map_err(|e| BrowserError::Capture {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let screenshot_path = dir.join(format!("{}.png", label));
        let html_path = dir.join(format!("{}.html", label));
        std::fs::write(&screenshot_path, b"png").map_err(|e| BrowserError::Capture {
            path: screenshot_path.clone(),
            source: e,
        })?;
        std::fs::write(&html_path, b"<html/>").map_err(|e| BrowserError::Capture {
            path: html_path.clone(),
            source: e,
        })?;
        Ok(ArtifactPaths {
            screenshot_path,
            html_path,
        })
    }

    async fn detect_friction(&self) -> Result<FrictionKind, BrowserError> {
        Ok(self.page().friction)
    }
}

/// Launches a fresh [`ScenarioSession`] from a cloned page script on
/// every apply attempt.
pub struct ScenarioLauncher {
    pages: Vec<Page>,
    pub launches: Mutex<u32>,
}

impl ScenarioLauncher {
    pub fn new(pages: Vec<Page>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            launches: Mutex::new(0),
        })
    }
}

#[async_trait]
impl BrowserLauncher for ScenarioLauncher {
    async fn launch(
        &self,
        _options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        *self.launches.lock().unwrap() += 1;
        Ok(Box::new(ScenarioSession::new(self.pages.clone())))
    }
}

pub fn text_field(id: &str, label: &str) -> FormControl {
    FormControl {
        control_id: id.to_string(),
        label: label.to_string(),
        kind: ControlKind::Text,
        value: String::new(),
        required: true,
        visible: true,
        enabled: true,
        options: vec![],
    }
}

pub fn file_field(id: &str, label: &str) -> FormControl {
    FormControl {
        control_id: id.to_string(),
        label: label.to_string(),
        kind: ControlKind::File,
        value: String::new(),
        required: true,
        visible: true,
        enabled: true,
        options: vec![],
    }
}

pub fn button(id: &str, label: &str) -> FormControl {
    FormControl {
        control_id: id.to_string(),
        label: label.to_string(),
        kind: ControlKind::Button,
        value: String::new(),
        required: false,
        visible: true,
        enabled: true,
        options: vec![],
    }
}

pub fn application_step(step: &str, action: FormControl) -> FormSnapshot {
    FormSnapshot {
        step_label: step.to_string(),
        controls: vec![
            text_field(&format!("{}-name", step), "Full Name"),
            text_field(&format!("{}-email", step), "Email Address"),
            file_field(&format!("{}-resume", step), "Resume/CV"),
            action,
        ],
    }
}

pub fn test_config(base_dir: &Path) -> Config {
    let json = format!(
        r#"{{
            "version": "1.0",
            "database_path": "{}",
            "output_directory": "{}",
            "profile": {{
                "full_name": "Ada Lovelace",
                "email": "ada@example.com",
                "phone": "+1 555 0100",
                "skills": ["Rust", "SQL"]
            }},
            "apply": {{
                "min_apply_delay_ms": 0,
                "max_apply_delay_ms": 0,
                "navigation_retries": 0
            }}
        }}"#,
        base_dir.join("jobs.db").display(),
        base_dir.join("out").display()
    );
    jobpilot::config::load_config_from_str(&json).expect("test config must validate")
}

pub fn write_url_file(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}
