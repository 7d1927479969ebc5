//! Task execution seams: document loading and the conversion runner

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;

use super::types::TaskPayload;
use crate::config::{ClipperConfig, ConversionOptions};
use crate::error::{ConvertError, ConvertResult};
use crate::markdown_converter::ConversionResult;
use crate::pipeline::{DocumentScope, Pipeline};

/// Markup delivered by a document source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub markup: String,
    pub base_url: Option<String>,
    pub scope: DocumentScope,
}

/// Document source collaborator: turns a payload into markup.
pub trait DocumentLoader: Send + Sync {
    fn load<'a>(&'a self, payload: &'a TaskPayload) -> BoxFuture<'a, ConvertResult<LoadedDocument>>;
}

/// Loads URLs with reqwest and files with tokio fs. Selections pass through.
#[derive(Debug, Clone)]
pub struct HttpDocumentLoader {
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpDocumentLoader {
    #[must_use]
    pub fn new(client: Client, timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            timeout,
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn from_config(client: Client, config: &ClipperConfig) -> Self {
        Self::new(client, config.load_timeout(), config.user_agent())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn load_url(&self, url: &str) -> ConvertResult<LoadedDocument> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConvertError::LoadFailed {
                source_ref: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        // Redirects change the base for relative links
        let final_url = response.url().to_string();
        let markup = response.text().await?;
        Ok(LoadedDocument {
            markup,
            base_url: Some(final_url),
            scope: DocumentScope::Page,
        })
    }

    async fn load_file(&self, path: &Path) -> ConvertResult<LoadedDocument> {
        let markup = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConvertError::LoadFailed {
                source_ref: path.display().to_string(),
                message: e.to_string(),
            })?;
        let base_url = match tokio::fs::canonicalize(path).await {
            Ok(absolute) => url::Url::from_file_path(absolute).ok().map(String::from),
            Err(_) => None,
        };
        Ok(LoadedDocument {
            markup,
            base_url,
            scope: DocumentScope::Page,
        })
    }
}

impl DocumentLoader for HttpDocumentLoader {
    fn load<'a>(&'a self, payload: &'a TaskPayload) -> BoxFuture<'a, ConvertResult<LoadedDocument>> {
        Box::pin(async move {
            match payload {
                TaskPayload::Url { url } => self.load_url(url).await,
                TaskPayload::File { path } => self.load_file(path).await,
                TaskPayload::Selection { html, base_url } => Ok(LoadedDocument {
                    markup: html.clone(),
                    base_url: base_url.clone(),
                    scope: DocumentScope::Selection,
                }),
            }
        })
    }
}

/// Runs one task's conversion. The queue treats every error as a task failure.
pub trait TaskRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        payload: &'a TaskPayload,
        options: &'a ConversionOptions,
    ) -> BoxFuture<'a, ConvertResult<ConversionResult>>;
}

/// Default runner: load the document, then convert it through the [`Pipeline`].
#[derive(Clone)]
pub struct PipelineRunner {
    loader: Arc<dyn DocumentLoader>,
    pipeline: Arc<Pipeline>,
}

impl PipelineRunner {
    #[must_use]
    pub fn new(loader: Arc<dyn DocumentLoader>, pipeline: Arc<Pipeline>) -> Self {
        Self { loader, pipeline }
    }
}

impl TaskRunner for PipelineRunner {
    fn run<'a>(
        &'a self,
        payload: &'a TaskPayload,
        options: &'a ConversionOptions,
    ) -> BoxFuture<'a, ConvertResult<ConversionResult>> {
        Box::pin(async move {
            let document = self.loader.load(payload).await?;
            self.pipeline
                .convert_markup(
                    &document.markup,
                    document.base_url.as_deref(),
                    document.scope,
                    options,
                )
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> HttpDocumentLoader {
        HttpDocumentLoader::new(Client::new(), Duration::from_secs(5), "clipmark-test")
    }

    #[test]
    fn test_loader_uses_load_timeout() {
        let config = ClipperConfig::builder()
            .load_timeout_secs(7)
            .image_timeout_secs(90)
            .build()
            .expect("valid config");
        let loader = HttpDocumentLoader::from_config(Client::new(), &config);
        assert_eq!(loader.timeout(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_selection_passes_through() {
        let payload = TaskPayload::selection("<p>x</p>", Some("https://example.com/".into()));
        let doc = loader().load(&payload).await.expect("selection loads");
        assert_eq!(doc.scope, DocumentScope::Selection);
        assert_eq!(doc.markup, "<p>x</p>");
        assert_eq!(doc.base_url.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_file_load_and_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<h1>Hi</h1>").expect("write fixture");

        let doc = loader().load(&TaskPayload::file(&path)).await.expect("file loads");
        assert_eq!(doc.markup, "<h1>Hi</h1>");
        assert!(doc.base_url.as_deref().is_some_and(|base| base.starts_with("file://")));

        let missing = loader().load(&TaskPayload::file(dir.path().join("nope.html"))).await;
        assert!(matches!(missing, Err(ConvertError::LoadFailed { .. })));
    }

    #[tokio::test]
    async fn test_url_load_reports_http_status() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>served</p>")
            .create_async()
            .await;
        let gone = server.mock("GET", "/gone").with_status(404).create_async().await;

        let doc = loader()
            .load(&TaskPayload::url(format!("{}/page", server.url())))
            .await
            .expect("page loads");
        assert_eq!(doc.markup, "<p>served</p>");
        assert_eq!(doc.scope, DocumentScope::Page);

        let err = loader()
            .load(&TaskPayload::url(format!("{}/gone", server.url())))
            .await
            .expect_err("404 fails");
        assert!(err.is_transient());

        ok.assert_async().await;
        gone.assert_async().await;
    }

    #[tokio::test]
    async fn test_pipeline_runner_converts_selection() {
        let runner = PipelineRunner::new(Arc::new(loader()), Arc::new(Pipeline::default()));
        let payload = TaskPayload::selection("<h2>Sub</h2>", None);
        let result = runner
            .run(&payload, &ConversionOptions::default())
            .await
            .expect("runs");
        assert_eq!(result.markdown, "## Sub");
    }
}
