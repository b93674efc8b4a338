pub mod adapter;
pub mod browser;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod pipeline;
pub mod report;

pub use adapter::{
    AdapterError, AdapterRegistry, ApplyAdapter, ApplyOutcome, ApplyReport, ApplyRequest,
    DiscoveryCriteria, JobDetail, JobSource, JobStub,
};
pub use browser::{
    BrowserError, BrowserLauncher, BrowserSession, FrictionKind, NullBrowserLauncher,
    SessionOptions,
};
pub use config::{load_config, ApplyMode, ApplySettings, Config, Profile};
pub use db::{Database, DatabaseError, JobPatch, JobRecord, JobStatus, NewJob};
pub use docs::{DocumentBuilder, DocumentSet, MarkdownDocumentBuilder};
pub use error::{ConfigError, DocumentError, JobpilotError, Result};
pub use pipeline::{BatchItem, DiscoverySummary, Pipeline, PipelineError};
pub use report::ReportError;
