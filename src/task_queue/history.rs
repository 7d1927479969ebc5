//! Conversion history store
//!
//! Every settled task is appended as a [`HistoryRecord`]. The in-memory store
//! serializes concurrent appends behind its own lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::types::{ConversionTask, TaskStatus};
use crate::error::QueueResult;
use crate::markdown_converter::ConversionResult;

/// Default page size for history queries
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One settled task outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub task_id: String,
    pub source: String,
    pub status: TaskStatus,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub fn from_task(task: &ConversionTask) -> Self {
        Self {
            task_id: task.id.clone(),
            source: task.payload.label(),
            status: task.status,
            result: task.result.clone(),
            error: task.error.clone(),
            recorded_at: task.completed_at.unwrap_or_else(Utc::now),
        }
    }

    fn matches_text(&self, needle: &str) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
        contains(&self.source)
            || self.result.as_ref().is_some_and(|result| {
                contains(&result.title) || contains(&result.markdown)
            })
            || self.error.as_deref().is_some_and(contains)
    }
}

/// Paginated, filtered read. Newest records come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub offset: usize,
    pub limit: usize,
    pub status: Option<TaskStatus>,
    /// Case-insensitive match against source, title, body and error
    pub text: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
            status: None,
            text: None,
        }
    }
}

/// One page of query results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub total: usize,
}

/// Persistence collaborator for conversion outcomes
pub trait ResultStore: Send + Sync {
    fn append(&self, record: HistoryRecord);

    fn query(&self, query: &HistoryQuery) -> HistoryPage;

    /// Delete every record of a task. Returns how many were removed.
    fn delete(&self, task_id: &str) -> usize;

    /// Serialize all records as a JSON array
    fn export_json(&self) -> QueueResult<String>;

    /// Append records from a JSON array. Returns how many were imported.
    fn import_json(&self, json: &str) -> QueueResult<usize>;
}

/// Process-local history kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ResultStore for InMemoryHistory {
    fn append(&self, record: HistoryRecord) {
        log::debug!("History append: {} ({})", record.task_id, record.status);
        self.records.lock().push(record);
    }

    fn query(&self, query: &HistoryQuery) -> HistoryPage {
        let needle = query
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());
        let records = self.records.lock();
        let matching: Vec<&HistoryRecord> = records
            .iter()
            .rev()
            .filter(|record| query.status.is_none_or(|status| record.status == status))
            .filter(|record| needle.as_deref().is_none_or(|needle| record.matches_text(needle)))
            .collect();
        HistoryPage {
            total: matching.len(),
            records: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect(),
        }
    }

    fn delete(&self, task_id: &str) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| record.task_id != task_id);
        before - records.len()
    }

    fn export_json(&self) -> QueueResult<String> {
        let records = self.records.lock();
        Ok(serde_json::to_string(&*records)?)
    }

    fn import_json(&self, json: &str) -> QueueResult<usize> {
        let imported: Vec<HistoryRecord> = serde_json::from_str(json)?;
        let count = imported.len();
        self.records.lock().extend(imported);
        log::info!("Imported {count} history records");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: TaskStatus, error: Option<&str>) -> HistoryRecord {
        HistoryRecord {
            task_id: id.to_string(),
            source: format!("https://example.com/{id}"),
            status,
            result: None,
            error: error.map(str::to_string),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_query_newest_first_with_pagination() {
        let history = InMemoryHistory::new();
        for i in 0..5 {
            history.append(record(&format!("t{i}"), TaskStatus::Completed, None));
        }
        let page = history.query(&HistoryQuery {
            offset: 1,
            limit: 2,
            ..HistoryQuery::default()
        });
        assert_eq!(page.total, 5);
        let ids: Vec<_> = page.records.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2"]);
    }

    #[test]
    fn test_status_and_text_filters() {
        let history = InMemoryHistory::new();
        history.append(record("a", TaskStatus::Completed, None));
        history.append(record("b", TaskStatus::Failed, Some("Connection Refused")));
        history.append(record("c", TaskStatus::Failed, Some("timeout")));

        let failed = history.query(&HistoryQuery {
            status: Some(TaskStatus::Failed),
            ..HistoryQuery::default()
        });
        assert_eq!(failed.total, 2);

        let refused = history.query(&HistoryQuery {
            text: Some("refused".into()),
            ..HistoryQuery::default()
        });
        assert_eq!(refused.total, 1);
        assert_eq!(refused.records[0].task_id, "b");
    }

    #[test]
    fn test_delete_and_json_round_trip() {
        let history = InMemoryHistory::new();
        history.append(record("a", TaskStatus::Completed, None));
        history.append(record("b", TaskStatus::Failed, Some("x")));
        assert_eq!(history.delete("a"), 1);
        assert_eq!(history.delete("missing"), 0);

        let json = history.export_json().expect("exports");
        let restored = InMemoryHistory::new();
        assert_eq!(restored.import_json(&json).expect("imports"), 1);
        assert_eq!(restored.query(&HistoryQuery::default()).records[0].task_id, "b");
        assert!(restored.import_json("not json").is_err());
    }
}
