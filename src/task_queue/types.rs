//! Task queue data types

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConversionOptions;
use crate::markdown_converter::ConversionResult;

/// What a task converts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// A web page fetched over HTTP
    Url { url: String },
    /// A local markup file
    File { path: PathBuf },
    /// A user selection carried inline
    Selection {
        html: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl TaskPayload {
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    #[must_use]
    pub fn selection(html: impl Into<String>, base_url: Option<String>) -> Self {
        Self::Selection {
            html: html.into(),
            base_url,
        }
    }

    /// Short human readable description used in logs and history
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::File { path } => path.display().to_string(),
            Self::Selection { base_url, html } => match base_url {
                Some(base) => format!("selection from {base}"),
                None => format!("selection ({} bytes)", html.len()),
            },
        }
    }
}

/// Lifecycle status.
///
/// `pending → processing → completed | failed`, and `failed → pending` on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress milestones reported through `TaskObserver::on_progress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Queued,
    Started,
    Finished,
}

/// One conversion request and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionTask {
    pub id: String,
    pub payload: TaskPayload,
    pub options: ConversionOptions,
    pub status: TaskStatus,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Times the task has been started
    #[serde(default)]
    pub attempts: u32,
    /// Pending but held back from dispatch by `cancel_task`
    #[serde(default)]
    pub cancelled: bool,
}

impl ConversionTask {
    #[must_use]
    pub fn new(payload: TaskPayload, options: ConversionOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            options,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            attempts: 0,
            cancelled: false,
        }
    }
}

/// Queue counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: bool,
}

/// Serialized queue state for `export_state` / `import_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub tasks: Vec<ConversionTask>,
    pub paused: bool,
    pub exported_at: DateTime<Utc>,
}
