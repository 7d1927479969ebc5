//! Process-level service wiring
//!
//! [`Clipper::init`] builds the HTTP client, converter, pipeline, document
//! loader, history store and task queue once and hands out shared handles.

use std::sync::Arc;

use reqwest::Client;

use crate::config::ClipperConfig;
use crate::error::ConvertResult;
use crate::markdown_converter::MarkdownConverter;
use crate::pipeline::Pipeline;
use crate::task_queue::{HttpDocumentLoader, InMemoryHistory, PipelineRunner, TaskQueue};

/// All services of one clipper process
#[derive(Debug, Clone)]
pub struct Clipper {
    config: ClipperConfig,
    pipeline: Arc<Pipeline>,
    history: Arc<InMemoryHistory>,
    queue: TaskQueue,
}

impl Clipper {
    /// Construct and wire every service.
    ///
    /// Must be called from within a Tokio runtime so the queue can spawn work.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn init(config: ClipperConfig) -> ConvertResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .build()?;

        let converter = MarkdownConverter::from_config(client.clone(), &config);
        let pipeline = Arc::new(Pipeline::new(converter));
        let loader = Arc::new(HttpDocumentLoader::from_config(client, &config));
        let runner = Arc::new(PipelineRunner::new(loader, Arc::clone(&pipeline)));
        let history = Arc::new(InMemoryHistory::new());
        let queue = TaskQueue::with_store(runner, config.concurrency(), history.clone());

        log::info!(
            "Clipper initialised (concurrency {}, images in {})",
            config.concurrency(),
            config.image_dir().display()
        );

        Ok(Self {
            config,
            pipeline,
            history,
            queue,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClipperConfig {
        &self.config
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    #[must_use]
    pub fn history(&self) -> &Arc<InMemoryHistory> {
        &self.history
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionOptions;
    use crate::task_queue::{HistoryQuery, ResultStore, TaskPayload, TaskStatus};

    #[tokio::test]
    async fn test_init_wires_queue_to_history() {
        let config = ClipperConfig::builder()
            .concurrency(1)
            .build()
            .expect("valid config");
        let clipper = Clipper::init(config).expect("init");
        assert_eq!(clipper.queue().concurrency(), 1);

        let task = clipper.queue().add_task(
            TaskPayload::selection("<p>Saved <strong>clip</strong></p>", None),
            ConversionOptions::default(),
            None,
        );
        clipper.queue().wait_idle().await;

        let page = clipper.history().query(&HistoryQuery::default());
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].task_id, task.id);
        assert_eq!(page.records[0].status, TaskStatus::Completed);
        assert_eq!(
            page.records[0].result.as_ref().map(|r| r.markdown.as_str()),
            Some("Saved **clip**")
        );
    }
}
