//! Asynchronous conversion queue with bounded concurrency
//!
//! Tasks are loaded through a [`DocumentLoader`], converted by a
//! [`TaskRunner`] and reported to a [`TaskObserver`]. Settled tasks can be
//! appended to a [`ResultStore`].

pub mod history;
pub mod observer;
pub mod queue;
pub mod runner;
pub mod types;

pub use history::{DEFAULT_PAGE_SIZE, HistoryPage, HistoryQuery, HistoryRecord, InMemoryHistory, ResultStore};
pub use observer::{NoOpObserver, TaskObserver};
pub use queue::TaskQueue;
pub use runner::{DocumentLoader, HttpDocumentLoader, LoadedDocument, PipelineRunner, TaskRunner};
pub use types::{
    ConversionTask, ProgressStage, QueueSnapshot, TaskPayload, TaskStats, TaskStatus,
};
